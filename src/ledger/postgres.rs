//! PostgreSQL ledger store
//!
//! Schema lives in [`crate::db::schema`]. The write path:
//! - `insert_pending` relies on the UNIQUE index on `idempotency_key`
//!   (`ON CONFLICT DO NOTHING`, zero rows = duplicate)
//! - a scope is one SQL transaction holding `pg_advisory_xact_lock` for the
//!   source account, released automatically at COMMIT/ROLLBACK
//! - status transitions are CAS updates (`WHERE status = $expected`)

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row};
use tracing::debug;

use super::error::StoreError;
use super::repository::{
    AtomicStore, InsertOutcome, LedgerRepository, StagedWrite, TransactionRepository, WriteScope,
};
use super::state::TransactionStatus;
use super::types::{EntryId, EntryType, LedgerEntry, Transaction, TransactionId, now};
use crate::account::AccountId;

const TX_COLUMNS: &str = "id, from_account, to_account, amount, currency, status, \
                          idempotency_key, error_message, created_at, updated_at";

const ENTRY_COLUMNS: &str = "id, account_id, transaction_id, entry_type, amount, created_at";

const BALANCE_SQL: &str = r#"
    SELECT COALESCE(SUM(CASE WHEN entry_type = $2 THEN amount ELSE -amount END), 0) AS balance
    FROM ledger_entries
    WHERE account_id = $1
"#;

/// Ledger store backed by PostgreSQL
#[derive(Clone)]
pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn parse_id<T: std::str::FromStr>(raw: &str, what: &str) -> Result<T, StoreError> {
    raw.parse()
        .map_err(|_| StoreError::Corrupt(format!("invalid {} id: {}", what, raw)))
}

fn row_to_transaction(row: &PgRow) -> Result<Transaction, StoreError> {
    let id: String = row.try_get("id")?;
    let status_id: i16 = row.try_get("status")?;
    let status = TransactionStatus::from_id(status_id)
        .ok_or_else(|| StoreError::Corrupt(format!("invalid status id: {}", status_id)))?;

    Ok(Transaction {
        id: parse_id(&id, "transaction")?,
        from_account: AccountId::new(row.try_get::<String, _>("from_account")?),
        to_account: AccountId::new(row.try_get::<String, _>("to_account")?),
        // NUMERIC(30, 8) pads to 8 places
        amount: row.try_get::<Decimal, _>("amount")?.normalize(),
        currency: row.try_get("currency")?,
        status,
        idempotency_key: row.try_get("idempotency_key")?,
        error: row.try_get("error_message")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_entry(row: &PgRow) -> Result<LedgerEntry, StoreError> {
    let id: String = row.try_get("id")?;
    let transaction_id: String = row.try_get("transaction_id")?;
    let type_id: i16 = row.try_get("entry_type")?;
    let entry_type = EntryType::from_id(type_id)
        .ok_or_else(|| StoreError::Corrupt(format!("invalid entry type: {}", type_id)))?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;

    Ok(LedgerEntry::from_parts(
        parse_id::<EntryId>(&id, "entry")?,
        AccountId::new(row.try_get::<String, _>("account_id")?),
        parse_id(&transaction_id, "transaction")?,
        entry_type,
        row.try_get::<Decimal, _>("amount")?.normalize(),
        created_at,
    ))
}

#[async_trait]
impl TransactionRepository for PgLedger {
    async fn insert_pending(&self, tx: &Transaction) -> Result<InsertOutcome, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO transactions
                (id, from_account, to_account, amount, currency, status,
                 idempotency_key, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (idempotency_key) DO NOTHING
            "#,
        )
        .bind(tx.id.to_string())
        .bind(tx.from_account.as_str())
        .bind(tx.to_account.as_str())
        .bind(tx.amount)
        .bind(&tx.currency)
        .bind(tx.status.id())
        .bind(&tx.idempotency_key)
        .bind(tx.created_at)
        .bind(tx.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            Ok(InsertOutcome::DuplicateKey)
        } else {
            Ok(InsertOutcome::Created)
        }
    }

    async fn get(&self, id: TransactionId) -> Result<Option<Transaction>, StoreError> {
        let sql = format!("SELECT {} FROM transactions WHERE id = $1", TX_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_transaction).transpose()
    }

    async fn get_by_key(&self, key: &str) -> Result<Option<Transaction>, StoreError> {
        let sql = format!(
            "SELECT {} FROM transactions WHERE idempotency_key = $1",
            TX_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_transaction).transpose()
    }

    async fn mark_failed(&self, id: TransactionId, reason: &str) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE transactions
            SET status = $1, error_message = $2, updated_at = $3
            WHERE id = $4 AND status = $5
            "#,
        )
        .bind(TransactionStatus::Failed.id())
        .bind(reason)
        .bind(now())
        .bind(id.to_string())
        .bind(TransactionStatus::Pending.id())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_stale_pending(
        &self,
        older_than: Duration,
        limit: usize,
    ) -> Result<Vec<Transaction>, StoreError> {
        let sql = format!(
            r#"
            SELECT {}
            FROM transactions
            WHERE status = $1
              AND updated_at < NOW() - INTERVAL '1 second' * $2
            ORDER BY updated_at ASC
            LIMIT $3
            "#,
            TX_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(TransactionStatus::Pending.id())
            .bind(older_than.as_secs_f64())
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_transaction).collect()
    }
}

#[async_trait]
impl LedgerRepository for PgLedger {
    async fn entries_for_account(
        &self,
        account: &AccountId,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        let sql = format!(
            "SELECT {} FROM ledger_entries WHERE account_id = $1 ORDER BY created_at, id",
            ENTRY_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(account.as_str())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_entry).collect()
    }

    async fn entries_for_transaction(
        &self,
        id: TransactionId,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        let sql = format!(
            "SELECT {} FROM ledger_entries WHERE transaction_id = $1 ORDER BY entry_type",
            ENTRY_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_entry).collect()
    }

    async fn balance_of(&self, account: &AccountId) -> Result<Decimal, StoreError> {
        let balance: Decimal = sqlx::query_scalar(BALANCE_SQL)
            .bind(account.as_str())
            .bind(EntryType::Credit.id())
            .fetch_one(&self.pool)
            .await?;
        Ok(balance.normalize())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl AtomicStore for PgLedger {
    async fn begin(&self, lock_account: &AccountId) -> Result<Box<dyn WriteScope>, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Serializes every debit of this account until COMMIT/ROLLBACK
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(lock_account.as_str())
            .execute(&mut *tx)
            .await?;
        debug!(account = %lock_account, "Account advisory lock acquired");

        Ok(Box::new(PgScope {
            tx: Some(tx),
            staged: Vec::new(),
        }))
    }
}

struct PgScope {
    tx: Option<sqlx::Transaction<'static, Postgres>>,
    staged: Vec<StagedWrite>,
}

async fn apply_write(
    conn: &mut sqlx::PgConnection,
    write: &StagedWrite,
) -> Result<(), StoreError> {
    match write {
        StagedWrite::Append(entry) => {
            sqlx::query(
                r#"
                INSERT INTO ledger_entries
                    (id, account_id, transaction_id, entry_type, amount, created_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(entry.id().to_string())
            .bind(entry.account().as_str())
            .bind(entry.transaction_id().to_string())
            .bind(entry.entry_type().id())
            .bind(entry.amount())
            .bind(entry.created_at())
            .execute(&mut *conn)
            .await?;
        }
        StagedWrite::Transition { id, from, to, at } => {
            if !from.can_transition_to(*to) {
                return Err(StoreError::StatusMismatch {
                    id: id.to_string(),
                    expected: *from,
                });
            }
            let result = sqlx::query(
                r#"
                UPDATE transactions
                SET status = $1, updated_at = $2
                WHERE id = $3 AND status = $4
                "#,
            )
            .bind(to.id())
            .bind(*at)
            .bind(id.to_string())
            .bind(from.id())
            .execute(&mut *conn)
            .await?;

            if result.rows_affected() == 0 {
                return Err(StoreError::StatusMismatch {
                    id: id.to_string(),
                    expected: *from,
                });
            }
        }
    }
    Ok(())
}

#[async_trait]
impl WriteScope for PgScope {
    async fn balance(&mut self, account: &AccountId) -> Result<Decimal, StoreError> {
        let tx = self.tx.as_mut().ok_or(StoreError::ScopeClosed)?;
        let balance: Decimal = sqlx::query_scalar(BALANCE_SQL)
            .bind(account.as_str())
            .bind(EntryType::Credit.id())
            .fetch_one(&mut **tx)
            .await?;
        Ok(balance.normalize())
    }

    fn stage(&mut self, write: StagedWrite) {
        self.staged.push(write);
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        let mut tx = self.tx.take().ok_or(StoreError::ScopeClosed)?;
        let staged = std::mem::take(&mut self.staged);

        for write in &staged {
            if let Err(e) = apply_write(&mut tx, write).await {
                // Dropping `tx` without commit rolls the unit back
                let _ = tx.rollback().await;
                return Err(e);
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), StoreError> {
        self.staged.clear();
        if let Some(tx) = self.tx.take() {
            tx.rollback().await?;
        }
        Ok(())
    }
}
