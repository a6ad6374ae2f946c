//! Storage seams for the transfer core
//!
//! Three explicit repositories plus a transactional scope:
//!
//! - [`TransactionRepository`]: transfer attempts, unique on idempotency key
//! - [`LedgerRepository`]: read-only view of ledger entries (append happens
//!   only through a [`WriteScope`]; there is no update or delete anywhere)
//! - [`AtomicStore`] / [`WriteScope`]: `begin / stage / commit / rollback`

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::balance::derive_balance;
use super::error::StoreError;
use super::state::TransactionStatus;
use super::types::{LedgerEntry, Transaction, TransactionId};
use crate::account::AccountId;

/// Result of inserting a PENDING transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Created,
    /// Another transaction already owns this idempotency key
    DuplicateKey,
}

#[async_trait]
pub trait TransactionRepository: Send + Sync {
    /// Insert a PENDING transaction. The idempotency key uniqueness check is
    /// atomic with the insert: of two concurrent callers exactly one sees
    /// `Created`.
    async fn insert_pending(&self, tx: &Transaction) -> Result<InsertOutcome, StoreError>;

    async fn get(&self, id: TransactionId) -> Result<Option<Transaction>, StoreError>;

    async fn get_by_key(&self, key: &str) -> Result<Option<Transaction>, StoreError>;

    /// CAS PENDING → FAILED. Returns false if the transaction was no longer PENDING.
    async fn mark_failed(&self, id: TransactionId, reason: &str) -> Result<bool, StoreError>;

    /// PENDING transactions not updated for at least `older_than`, oldest first
    async fn find_stale_pending(
        &self,
        older_than: Duration,
        limit: usize,
    ) -> Result<Vec<Transaction>, StoreError>;
}

#[async_trait]
pub trait LedgerRepository: Send + Sync {
    async fn entries_for_account(&self, account: &AccountId)
    -> Result<Vec<LedgerEntry>, StoreError>;

    async fn entries_for_transaction(
        &self,
        id: TransactionId,
    ) -> Result<Vec<LedgerEntry>, StoreError>;

    /// Derived balance. Backends may push the fold down to storage.
    async fn balance_of(&self, account: &AccountId) -> Result<Decimal, StoreError> {
        let entries = self.entries_for_account(account).await?;
        derive_balance(account, &entries)
    }

    /// Storage liveness probe
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// A write buffered inside a [`WriteScope`] until commit
#[derive(Debug, Clone)]
pub enum StagedWrite {
    /// Append a new ledger entry
    Append(LedgerEntry),
    /// CAS a transaction's status
    Transition {
        id: TransactionId,
        from: TransactionStatus,
        to: TransactionStatus,
        at: DateTime<Utc>,
    },
}

/// An open all-or-nothing unit of work.
///
/// While the scope is open it holds the write lock of the account it was
/// begun for, so reads of that account's balance stay valid until commit.
#[async_trait]
pub trait WriteScope: Send {
    /// Derived balance as seen inside the scope
    async fn balance(&mut self, account: &AccountId) -> Result<Decimal, StoreError>;

    fn stage(&mut self, write: StagedWrite);

    /// Apply every staged write atomically. On error nothing is applied.
    async fn commit(&mut self) -> Result<(), StoreError>;

    /// Discard staged writes and release the lock
    async fn rollback(&mut self) -> Result<(), StoreError>;
}

#[async_trait]
pub trait AtomicStore: Send + Sync {
    /// Open a scope holding the write lock for `lock_account`
    async fn begin(&self, lock_account: &AccountId) -> Result<Box<dyn WriteScope>, StoreError>;
}
