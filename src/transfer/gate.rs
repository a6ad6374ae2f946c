//! Account Status Gate
//!
//! Resolves both parties of a transfer from the registry and checks they may
//! transact: existence (404), ownership and status (403), currency (400).

use std::sync::Arc;

use tracing::debug;

use super::error::TransferError;
use super::types::Principal;
use crate::account::{Account, AccountId, AccountRegistry};

/// Both resolved accounts of a transfer
#[derive(Debug, Clone)]
pub struct Parties {
    pub from: Account,
    pub to: Account,
}

#[derive(Clone)]
pub struct AccountStatusGate {
    registry: Arc<dyn AccountRegistry>,
}

impl AccountStatusGate {
    pub fn new(registry: Arc<dyn AccountRegistry>) -> Self {
        Self { registry }
    }

    pub async fn fetch(&self, id: &AccountId) -> Result<Account, TransferError> {
        self.registry
            .get(id)
            .await?
            .ok_or_else(|| TransferError::AccountNotFound(id.to_string()))
    }

    /// Check both parties. System principals skip the ownership check.
    pub async fn check(
        &self,
        principal: &Principal,
        from: &AccountId,
        to: &AccountId,
    ) -> Result<Parties, TransferError> {
        let from = self.fetch(from).await?;
        let to = self.fetch(to).await?;

        if !principal.is_system() && !from.is_owned_by(&principal.id) {
            return Err(TransferError::Forbidden(from.id.to_string()));
        }

        for account in [&from, &to] {
            if !account.is_active() {
                debug!(account = %account.id, status = %account.status, "Account not active");
                return Err(TransferError::AccountInactive {
                    account: account.id.to_string(),
                    status: account.status.to_string(),
                });
            }
        }

        if from.currency != to.currency {
            return Err(TransferError::CurrencyMismatch {
                from: from.currency.clone(),
                to: to.currency.clone(),
            });
        }

        Ok(Parties { from, to })
    }

    /// Ok if the principal owns any of `accounts`, or is a system principal
    pub async fn authorize_any(
        &self,
        principal: &Principal,
        accounts: &[&AccountId],
    ) -> Result<(), TransferError> {
        if principal.is_system() {
            return Ok(());
        }
        for id in accounts {
            if let Some(account) = self.registry.get(id).await?
                && account.is_owned_by(&principal.id)
            {
                return Ok(());
            }
        }
        Err(TransferError::Forbidden(
            accounts.first().map(|a| a.to_string()).unwrap_or_default(),
        ))
    }
}
