//! In-memory ledger store
//!
//! Used for local runs without PostgreSQL and as the substitutable fake in
//! tests. Semantics match the PostgreSQL store:
//! - idempotency key uniqueness is checked atomically with the insert
//! - each [`WriteScope`] holds a per-account `tokio` mutex until commit/rollback
//! - commit validates every staged write first and publishes all of them
//!   under one write lock, so readers never see a partial unit

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use tokio::sync::OwnedMutexGuard;
use tracing::debug;

use super::balance::derive_balance;
use super::error::StoreError;
use super::repository::{
    AtomicStore, InsertOutcome, LedgerRepository, StagedWrite, TransactionRepository, WriteScope,
};
use super::state::TransactionStatus;
use super::types::{LedgerEntry, Transaction, TransactionId, now};
use crate::account::AccountId;

type AccountLocks = DashMap<AccountId, Arc<tokio::sync::Mutex<()>>>;

#[derive(Default)]
struct Tables {
    transactions: HashMap<TransactionId, Transaction>,
    by_key: HashMap<String, TransactionId>,
    entries: Vec<LedgerEntry>,
}

/// Failure injected into the next commit, raised when the unit reaches its
/// `after_writes`-th staged write. Nothing of the unit is published.
#[derive(Debug, Clone)]
pub struct CommitFault {
    pub after_writes: usize,
    pub error: StoreError,
}

#[derive(Default)]
struct Faults {
    commits: VecDeque<CommitFault>,
    reject_status_updates: bool,
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Database("in-memory store lock poisoned".to_string())
}

/// In-memory implementation of every ledger storage seam
#[derive(Default)]
pub struct MemoryLedger {
    tables: Arc<RwLock<Tables>>,
    account_locks: Arc<AccountLocks>,
    faults: Arc<Mutex<Faults>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a fault for the next commit (FIFO, one fault per commit)
    pub fn inject_commit_fault(&self, fault: CommitFault) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.commits.push_back(fault);
        }
    }

    /// Make `mark_failed` return a database error
    pub fn reject_status_updates(&self, reject: bool) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.reject_status_updates = reject;
        }
    }

    pub fn transaction_count(&self) -> usize {
        self.tables.read().map(|t| t.transactions.len()).unwrap_or(0)
    }

    pub fn entry_count(&self) -> usize {
        self.tables.read().map(|t| t.entries.len()).unwrap_or(0)
    }

    /// Accounts with a lock entry: held or awaited
    pub fn locked_account_count(&self) -> usize {
        self.account_locks.len()
    }
}

#[async_trait]
impl TransactionRepository for MemoryLedger {
    async fn insert_pending(&self, tx: &Transaction) -> Result<InsertOutcome, StoreError> {
        let mut tables = self.tables.write().map_err(poisoned)?;
        if tables.by_key.contains_key(&tx.idempotency_key) {
            return Ok(InsertOutcome::DuplicateKey);
        }
        tables.by_key.insert(tx.idempotency_key.clone(), tx.id);
        tables.transactions.insert(tx.id, tx.clone());
        Ok(InsertOutcome::Created)
    }

    async fn get(&self, id: TransactionId) -> Result<Option<Transaction>, StoreError> {
        let tables = self.tables.read().map_err(poisoned)?;
        Ok(tables.transactions.get(&id).cloned())
    }

    async fn get_by_key(&self, key: &str) -> Result<Option<Transaction>, StoreError> {
        let tables = self.tables.read().map_err(poisoned)?;
        Ok(tables
            .by_key
            .get(key)
            .and_then(|id| tables.transactions.get(id))
            .cloned())
    }

    async fn mark_failed(&self, id: TransactionId, reason: &str) -> Result<bool, StoreError> {
        if self.faults.lock().map_err(poisoned)?.reject_status_updates {
            return Err(StoreError::Database("status update rejected".to_string()));
        }

        let mut tables = self.tables.write().map_err(poisoned)?;
        match tables.transactions.get_mut(&id) {
            Some(tx) if tx.status == TransactionStatus::Pending => {
                tx.status = TransactionStatus::Failed;
                tx.error = Some(reason.to_string());
                tx.updated_at = now();
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(StoreError::UnknownTransaction(id.to_string())),
        }
    }

    async fn find_stale_pending(
        &self,
        older_than: Duration,
        limit: usize,
    ) -> Result<Vec<Transaction>, StoreError> {
        let threshold = TimeDelta::from_std(older_than)
            .map_err(|e| StoreError::Database(format!("invalid threshold: {}", e)))?;
        let cutoff = Utc::now() - threshold;

        let tables = self.tables.read().map_err(poisoned)?;
        let mut stale: Vec<Transaction> = tables
            .transactions
            .values()
            .filter(|tx| tx.status == TransactionStatus::Pending && tx.updated_at <= cutoff)
            .cloned()
            .collect();
        stale.sort_by_key(|tx| tx.updated_at);
        stale.truncate(limit);
        Ok(stale)
    }
}

#[async_trait]
impl LedgerRepository for MemoryLedger {
    async fn entries_for_account(
        &self,
        account: &AccountId,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        let tables = self.tables.read().map_err(poisoned)?;
        Ok(tables
            .entries
            .iter()
            .filter(|e| e.account() == account)
            .cloned()
            .collect())
    }

    async fn entries_for_transaction(
        &self,
        id: TransactionId,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        let tables = self.tables.read().map_err(poisoned)?;
        Ok(tables
            .entries
            .iter()
            .filter(|e| e.transaction_id() == id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AtomicStore for MemoryLedger {
    async fn begin(&self, lock_account: &AccountId) -> Result<Box<dyn WriteScope>, StoreError> {
        let lock = self
            .account_locks
            .entry(lock_account.clone())
            .or_default()
            .clone();
        let guard = lock.lock_owned().await;
        debug!(account = %lock_account, "Account write lock acquired");

        Ok(Box::new(MemoryScope {
            tables: self.tables.clone(),
            faults: self.faults.clone(),
            staged: Vec::new(),
            guard: Some(guard),
            locks: self.account_locks.clone(),
            account: lock_account.clone(),
        }))
    }
}

struct MemoryScope {
    tables: Arc<RwLock<Tables>>,
    faults: Arc<Mutex<Faults>>,
    staged: Vec<StagedWrite>,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<AccountLocks>,
    account: AccountId,
}

impl MemoryScope {
    /// Drop the account lock, and its map entry once nobody holds or awaits it.
    /// `remove_if` and the clone in `begin` share the shard lock.
    fn release(&mut self) {
        if self.guard.take().is_some() {
            self.locks
                .remove_if(&self.account, |_, lock| Arc::strong_count(lock) == 1);
        }
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.guard.is_none() {
            return Err(StoreError::ScopeClosed);
        }
        Ok(())
    }

    fn publish(&self, staged: Vec<StagedWrite>) -> Result<(), StoreError> {
        let fault = self.faults.lock().map_err(poisoned)?.commits.pop_front();
        let staged_len = staged.len();
        let mut tables = self.tables.write().map_err(poisoned)?;

        let mut appended: Vec<LedgerEntry> = Vec::new();
        let mut transitions: Vec<(TransactionId, TransactionStatus, DateTime<Utc>)> = Vec::new();

        for (i, write) in staged.into_iter().enumerate() {
            if let Some(f) = &fault
                && f.after_writes == i
            {
                return Err(f.error.clone());
            }

            match write {
                StagedWrite::Append(entry) => {
                    if !tables.transactions.contains_key(&entry.transaction_id()) {
                        return Err(StoreError::UnknownTransaction(
                            entry.transaction_id().to_string(),
                        ));
                    }
                    let duplicate = tables.entries.iter().chain(appended.iter()).any(|e| {
                        e.id() == entry.id()
                            || (e.transaction_id() == entry.transaction_id()
                                && e.entry_type() == entry.entry_type())
                    });
                    if duplicate {
                        return Err(StoreError::DuplicateEntry(format!(
                            "{} {}",
                            entry.transaction_id(),
                            entry.entry_type()
                        )));
                    }
                    appended.push(entry);
                }
                StagedWrite::Transition { id, from, to, at } => {
                    let stored = tables
                        .transactions
                        .get(&id)
                        .ok_or_else(|| StoreError::UnknownTransaction(id.to_string()))?;
                    let current = transitions
                        .iter()
                        .rev()
                        .find(|(t, _, _)| *t == id)
                        .map(|(_, s, _)| *s)
                        .unwrap_or(stored.status);
                    if current != from || !from.can_transition_to(to) {
                        return Err(StoreError::StatusMismatch {
                            id: id.to_string(),
                            expected: from,
                        });
                    }
                    transitions.push((id, to, at));
                }
            }
        }

        if let Some(f) = fault
            && f.after_writes >= staged_len
        {
            return Err(f.error);
        }

        tables.entries.extend(appended);
        for (id, status, at) in transitions {
            if let Some(tx) = tables.transactions.get_mut(&id) {
                tx.status = status;
                tx.updated_at = at;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl WriteScope for MemoryScope {
    async fn balance(&mut self, account: &AccountId) -> Result<Decimal, StoreError> {
        self.ensure_open()?;
        let tables = self.tables.read().map_err(poisoned)?;
        derive_balance(account, &tables.entries)
    }

    fn stage(&mut self, write: StagedWrite) {
        self.staged.push(write);
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        self.ensure_open()?;
        let staged = std::mem::take(&mut self.staged);
        let result = self.publish(staged);
        self.release();
        result
    }

    async fn rollback(&mut self) -> Result<(), StoreError> {
        self.staged.clear();
        self.release();
        Ok(())
    }
}

impl Drop for MemoryScope {
    fn drop(&mut self) {
        self.release();
    }
}
