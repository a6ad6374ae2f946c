//! Read access to the account registry

use async_trait::async_trait;
use dashmap::DashMap;
use sqlx::{PgPool, Row};

use super::models::{Account, AccountId, AccountStatus};
use crate::ledger::StoreError;

#[async_trait]
pub trait AccountRegistry: Send + Sync {
    async fn get(&self, id: &AccountId) -> Result<Option<Account>, StoreError>;
}

/// Registry backed by the `accounts` table
#[derive(Clone)]
pub struct PgAccountRegistry {
    pool: PgPool,
}

impl PgAccountRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert or update an account; used for configured seed accounts
    pub async fn upsert(&self, account: &Account) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO accounts (id, owner_id, status, currency)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
            SET owner_id = EXCLUDED.owner_id,
                status = EXCLUDED.status,
                currency = EXCLUDED.currency
            "#,
        )
        .bind(account.id.as_str())
        .bind(&account.owner_id)
        .bind(account.status.id())
        .bind(&account.currency)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl AccountRegistry for PgAccountRegistry {
    async fn get(&self, id: &AccountId) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query("SELECT id, owner_id, status, currency FROM accounts WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let status_id: i16 = row.try_get("status")?;
        let status = AccountStatus::from_id(status_id).ok_or_else(|| {
            StoreError::Corrupt(format!("invalid account status: {}", status_id))
        })?;
        let currency: String = row.try_get("currency")?;

        Ok(Some(Account {
            id: AccountId::new(row.try_get::<String, _>("id")?),
            owner_id: row.try_get("owner_id")?,
            status,
            currency: currency.trim_end().to_string(),
        }))
    }
}

/// In-process registry
#[derive(Default)]
pub struct MemoryAccountRegistry {
    accounts: DashMap<AccountId, Account>,
}

impl MemoryAccountRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, account: Account) {
        self.accounts.insert(account.id.clone(), account);
    }

    /// Returns false if the account is unknown
    pub fn set_status(&self, id: &AccountId, status: AccountStatus) -> bool {
        match self.accounts.get_mut(id) {
            Some(mut account) => {
                account.status = status;
                true
            }
            None => false,
        }
    }
}

impl FromIterator<Account> for MemoryAccountRegistry {
    fn from_iter<I: IntoIterator<Item = Account>>(iter: I) -> Self {
        let registry = Self::new();
        for account in iter {
            registry.insert(account);
        }
        registry
    }
}

#[async_trait]
impl AccountRegistry for MemoryAccountRegistry {
    async fn get(&self, id: &AccountId) -> Result<Option<Account>, StoreError> {
        Ok(self.accounts.get(id).map(|a| a.clone()))
    }
}
