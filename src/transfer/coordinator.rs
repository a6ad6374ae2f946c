//! Atomic Write Coordinator
//!
//! Applies a PENDING transaction as one unit: DEBIT entry, CREDIT entry and
//! the PENDING → COMPLETED transition commit together or not at all.
//!
//! The unit runs under the source account's write lock. When `check_funds`
//! is set the balance is re-derived inside the lock, so two concurrent
//! debits of the same account can never both pass the check.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::ledger::types::now;
use crate::ledger::{
    AtomicStore, LedgerEntry, StagedWrite, StoreError, Transaction, TransactionStatus,
};

/// Bounded retry on transient commit conflicts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Delay before retry `n` is `backoff * n`
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(50),
        }
    }
}

impl RetryPolicy {
    pub fn delay(&self, attempt: u32) -> Duration {
        self.backoff * attempt
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommitError {
    /// In-lock funds re-check failed; nothing was written
    #[error("Insufficient funds: balance {balance}, amount {amount}")]
    InsufficientFunds { balance: Decimal, amount: Decimal },

    #[error("Commit failed after {attempts} attempt(s): {error}")]
    Store { attempts: u32, error: StoreError },
}

pub struct AtomicWriteCoordinator {
    store: Arc<dyn AtomicStore>,
    policy: RetryPolicy,
}

impl AtomicWriteCoordinator {
    pub fn new(store: Arc<dyn AtomicStore>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Commit the transfer unit for `tx`, returning the COMPLETED record.
    pub async fn apply(
        &self,
        tx: &Transaction,
        check_funds: bool,
    ) -> Result<Transaction, CommitError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.try_commit(tx, check_funds).await {
                Ok(completed) => {
                    info!(
                        transaction_id = %tx.id,
                        idempotency_key = %tx.idempotency_key,
                        attempt,
                        "Transfer unit committed"
                    );
                    return Ok(completed);
                }
                Err(Attempt::Funds { balance }) => {
                    return Err(CommitError::InsufficientFunds {
                        balance,
                        amount: tx.amount,
                    });
                }
                Err(Attempt::Store(e)) if e.is_transient() && attempt < max_attempts => {
                    let delay = self.policy.delay(attempt);
                    warn!(
                        transaction_id = %tx.id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient commit conflict, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(Attempt::Store(error)) => {
                    return Err(CommitError::Store {
                        attempts: attempt,
                        error,
                    });
                }
            }
        }
    }

    async fn try_commit(&self, tx: &Transaction, check_funds: bool) -> Result<Transaction, Attempt> {
        let mut scope = self.store.begin(&tx.from_account).await?;

        if check_funds {
            let balance = match scope.balance(&tx.from_account).await {
                Ok(b) => b,
                Err(e) => {
                    let _ = scope.rollback().await;
                    return Err(e.into());
                }
            };
            if balance < tx.amount {
                debug!(transaction_id = %tx.id, %balance, amount = %tx.amount, "In-lock funds check failed");
                let _ = scope.rollback().await;
                return Err(Attempt::Funds { balance });
            }
        }

        let at = now();
        let [debit, credit] = LedgerEntry::legs(tx, at);
        scope.stage(StagedWrite::Append(debit));
        scope.stage(StagedWrite::Append(credit));
        scope.stage(StagedWrite::Transition {
            id: tx.id,
            from: TransactionStatus::Pending,
            to: TransactionStatus::Completed,
            at,
        });
        scope.commit().await?;

        Ok(tx.transitioned(TransactionStatus::Completed, at))
    }
}

enum Attempt {
    Funds { balance: Decimal },
    Store(StoreError),
}

impl From<StoreError> for Attempt {
    fn from(e: StoreError) -> Self {
        Attempt::Store(e)
    }
}
