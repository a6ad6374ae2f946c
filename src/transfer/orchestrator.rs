//! Transfer Orchestrator
//!
//! The only entry point callers use. Drives a request through
//!
//! ```text
//! RECEIVED → idempotency-resolved → accounts-validated → funds-checked → PENDING → COMPLETED
//!                                                                          ↓
//!                                                                        FAILED
//! ```
//!
//! Everything before PENDING is read-only, so every early exit leaves no trace.
//! Once the PENDING row exists the idempotency key is consumed: the attempt
//! ends COMPLETED or, if the atomic unit cannot commit, FAILED.

use std::sync::Arc;

use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{error, info, warn};

use super::coordinator::{AtomicWriteCoordinator, CommitError, RetryPolicy};
use super::error::TransferError;
use super::gate::AccountStatusGate;
use super::idempotency::{IdempotencyGuard, Resolution};
use super::notify::{Notifier, TransferNotice};
use super::types::{FundingRequest, Principal, TransferOutcome, TransferRequest, ValidTransfer};
use crate::account::{AccountId, AccountRegistry, MemoryAccountRegistry, PgAccountRegistry};
use crate::ledger::{
    AtomicStore, BalanceDeriver, InsertOutcome, LedgerEntry, LedgerRepository, MemoryLedger,
    PgLedger, Transaction, TransactionId, TransactionRepository, TransactionStatus,
};

/// Storage seams the orchestrator is assembled from
#[derive(Clone)]
pub struct LedgerBackends {
    pub accounts: Arc<dyn AccountRegistry>,
    pub transactions: Arc<dyn TransactionRepository>,
    pub entries: Arc<dyn LedgerRepository>,
    pub store: Arc<dyn AtomicStore>,
}

impl LedgerBackends {
    pub fn in_memory(accounts: Arc<MemoryAccountRegistry>, ledger: Arc<MemoryLedger>) -> Self {
        Self {
            accounts,
            transactions: ledger.clone(),
            entries: ledger.clone(),
            store: ledger,
        }
    }

    pub fn postgres(pool: PgPool) -> Self {
        let ledger = Arc::new(PgLedger::new(pool.clone()));
        Self {
            accounts: Arc::new(PgAccountRegistry::new(pool)),
            transactions: ledger.clone(),
            entries: ledger.clone(),
            store: ledger,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransferSettings {
    pub retry: RetryPolicy,
    /// Issuing account; exempt from the funds check
    pub treasury_account: AccountId,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            treasury_account: AccountId::from("treasury"),
        }
    }
}

/// Derived balance of one account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountBalance {
    pub account: AccountId,
    pub currency: String,
    pub balance: Decimal,
}

pub struct TransferOrchestrator {
    guard: IdempotencyGuard,
    gate: AccountStatusGate,
    balances: BalanceDeriver,
    coordinator: AtomicWriteCoordinator,
    transactions: Arc<dyn TransactionRepository>,
    entries: Arc<dyn LedgerRepository>,
    notifier: Arc<dyn Notifier>,
    treasury: AccountId,
}

impl TransferOrchestrator {
    pub fn new(
        backends: LedgerBackends,
        notifier: Arc<dyn Notifier>,
        settings: TransferSettings,
    ) -> Self {
        Self {
            guard: IdempotencyGuard::new(backends.transactions.clone()),
            gate: AccountStatusGate::new(backends.accounts),
            balances: BalanceDeriver::new(backends.entries.clone()),
            coordinator: AtomicWriteCoordinator::new(backends.store, settings.retry),
            transactions: backends.transactions,
            entries: backends.entries,
            notifier,
            treasury: settings.treasury_account,
        }
    }

    pub fn treasury_account(&self) -> &AccountId {
        &self.treasury
    }

    /// Move funds from an account the caller owns.
    ///
    /// The treasury cannot be debited here, whoever owns it; issuance goes
    /// through [`Self::issue_initial_funds`].
    pub async fn transfer(
        &self,
        principal: &Principal,
        req: TransferRequest,
    ) -> Result<TransferOutcome, TransferError> {
        let valid = ValidTransfer::try_from(req)?;
        if valid.from == self.treasury {
            warn!(
                idempotency_key = %valid.idempotency_key,
                principal_id = %principal.id,
                "Treasury debit rejected outside issuance"
            );
            return Err(TransferError::Forbidden(self.treasury.to_string()));
        }
        self.execute(principal, valid, true).await
    }

    /// Issue funds from the treasury. System principals only.
    pub async fn issue_initial_funds(
        &self,
        principal: &Principal,
        req: FundingRequest,
    ) -> Result<TransferOutcome, TransferError> {
        let valid = ValidTransfer::new(
            Some(self.treasury.to_string()),
            req.to_account,
            req.amount,
            req.idempotency_key,
        )?;
        if !principal.is_system() {
            return Err(TransferError::Forbidden(self.treasury.to_string()));
        }
        self.execute(principal, valid, false).await
    }

    async fn execute(
        &self,
        principal: &Principal,
        valid: ValidTransfer,
        check_funds: bool,
    ) -> Result<TransferOutcome, TransferError> {
        info!(
            idempotency_key = %valid.idempotency_key,
            from = %valid.from,
            to = %valid.to,
            amount = %valid.amount,
            principal_id = %principal.id,
            "Transfer received"
        );

        if let Resolution::Prior(prior) = self.guard.resolve(&valid.idempotency_key).await? {
            self.authorize_transaction(principal, &prior).await?;
            return IdempotencyGuard::outcome_of(prior);
        }

        let parties = self.gate.check(principal, &valid.from, &valid.to).await?;

        if check_funds {
            let balance = self.balances.balance(&valid.from).await?;
            if balance < valid.amount {
                info!(
                    idempotency_key = %valid.idempotency_key,
                    account = %valid.from,
                    %balance,
                    amount = %valid.amount,
                    "Transfer rejected: insufficient funds"
                );
                return Err(TransferError::InsufficientFunds);
            }
        }

        let tx = Transaction::pending(
            valid.from,
            valid.to,
            valid.amount,
            parties.from.currency,
            valid.idempotency_key,
        );

        match self.transactions.insert_pending(&tx).await? {
            InsertOutcome::Created => {
                info!(
                    transaction_id = %tx.id,
                    idempotency_key = %tx.idempotency_key,
                    "Transaction PENDING"
                );
            }
            InsertOutcome::DuplicateKey => {
                // Lost the creation race; the winner's outcome is ours
                let prior = self
                    .transactions
                    .get_by_key(&tx.idempotency_key)
                    .await?
                    .ok_or_else(|| {
                        TransferError::Storage(format!(
                            "idempotency key {} conflicted but has no transaction",
                            tx.idempotency_key
                        ))
                    })?;
                info!(
                    idempotency_key = %tx.idempotency_key,
                    transaction_id = %prior.id,
                    "Concurrent request owns idempotency key"
                );
                self.authorize_transaction(principal, &prior).await?;
                return IdempotencyGuard::outcome_of(prior);
            }
        }

        match self.coordinator.apply(&tx, check_funds).await {
            Ok(completed) => {
                info!(
                    transaction_id = %completed.id,
                    idempotency_key = %completed.idempotency_key,
                    "Transaction COMPLETED"
                );
                self.dispatch_notification(principal, &completed);
                Ok(TransferOutcome::Created(completed))
            }
            Err(e) => self.fail(principal, &tx, e).await,
        }
    }

    /// PENDING → FAILED after the atomic unit gave up
    async fn fail(
        &self,
        principal: &Principal,
        tx: &Transaction,
        cause: CommitError,
    ) -> Result<TransferOutcome, TransferError> {
        let reason = cause.to_string();
        let surfaced = match &cause {
            CommitError::InsufficientFunds { .. } => TransferError::InsufficientFunds,
            CommitError::Store { .. } => TransferError::AtomicWriteFailed(reason.clone()),
        };

        match self.transactions.mark_failed(tx.id, &reason).await {
            Ok(true) => {
                warn!(
                    transaction_id = %tx.id,
                    idempotency_key = %tx.idempotency_key,
                    reason = %reason,
                    "Transaction FAILED"
                );
            }
            Ok(false) => {
                // No longer PENDING: the unit may have committed despite the error
                match self.transactions.get(tx.id).await {
                    Ok(Some(current)) if current.status == TransactionStatus::Completed => {
                        info!(
                            transaction_id = %tx.id,
                            "Commit reported an error but the transaction is COMPLETED"
                        );
                        self.dispatch_notification(principal, &current);
                        return Ok(TransferOutcome::Created(current));
                    }
                    Ok(current) => {
                        warn!(
                            transaction_id = %tx.id,
                            status = ?current.map(|t| t.status),
                            "Transaction already left PENDING"
                        );
                    }
                    Err(e) => {
                        error!(
                            transaction_id = %tx.id,
                            error = %e,
                            alert = true,
                            "Failed to re-read transaction after commit failure"
                        );
                    }
                }
            }
            Err(e) => {
                error!(
                    transaction_id = %tx.id,
                    idempotency_key = %tx.idempotency_key,
                    error = %e,
                    cause = %reason,
                    alert = true,
                    "Failed to mark transaction FAILED; left PENDING"
                );
            }
        }

        Err(surfaced)
    }

    fn dispatch_notification(&self, principal: &Principal, tx: &Transaction) {
        let notice = TransferNotice {
            principal_id: principal.id.clone(),
            email: principal.email.clone(),
            transaction_id: tx.id,
            amount: tx.amount,
            currency: tx.currency.clone(),
            counterparty_account: tx.to_account.clone(),
        };
        let notifier = self.notifier.clone();

        tokio::spawn(async move {
            if let Err(e) = notifier.notify(&notice).await {
                warn!(
                    transaction_id = %notice.transaction_id,
                    error = %e,
                    "Transfer notification failed"
                );
            }
        });
    }

    async fn authorize_transaction(
        &self,
        principal: &Principal,
        tx: &Transaction,
    ) -> Result<(), TransferError> {
        self.gate
            .authorize_any(principal, &[&tx.from_account, &tx.to_account])
            .await
    }

    /// Look up a transaction visible to the principal
    pub async fn transaction(
        &self,
        principal: &Principal,
        id: TransactionId,
    ) -> Result<Transaction, TransferError> {
        let tx = self
            .transactions
            .get(id)
            .await?
            .ok_or_else(|| TransferError::TransactionNotFound(id.to_string()))?;
        self.authorize_transaction(principal, &tx).await?;
        Ok(tx)
    }

    pub async fn balance(
        &self,
        principal: &Principal,
        account: &AccountId,
    ) -> Result<AccountBalance, TransferError> {
        let record = self.gate.fetch(account).await?;
        self.gate.authorize_any(principal, &[account]).await?;
        let balance = self.balances.balance(account).await?;

        Ok(AccountBalance {
            account: record.id,
            currency: record.currency,
            balance,
        })
    }

    /// Ledger entries of an account, oldest first
    pub async fn ledger(
        &self,
        principal: &Principal,
        account: &AccountId,
    ) -> Result<Vec<LedgerEntry>, TransferError> {
        self.gate.fetch(account).await?;
        self.gate.authorize_any(principal, &[account]).await?;
        Ok(self.entries.entries_for_account(account).await?)
    }

    /// Storage liveness
    pub async fn ping(&self) -> Result<(), TransferError> {
        Ok(self.entries.ping().await?)
    }
}
