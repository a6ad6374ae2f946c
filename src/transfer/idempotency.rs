//! Idempotency Guard
//!
//! Maps an idempotency key to at most one transaction outcome. The storage
//! UNIQUE constraint on the key is the only serialization point between
//! concurrent creators; this module only interprets what is stored.

use std::sync::Arc;

use tracing::debug;

use super::error::TransferError;
use super::types::TransferOutcome;
use crate::ledger::{Transaction, TransactionRepository, TransactionStatus};

/// What a key currently resolves to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Key never used: proceed with a new transfer
    Absent,
    /// Key owned by an existing transaction
    Prior(Transaction),
}

#[derive(Clone)]
pub struct IdempotencyGuard {
    transactions: Arc<dyn TransactionRepository>,
}

impl IdempotencyGuard {
    pub fn new(transactions: Arc<dyn TransactionRepository>) -> Self {
        Self { transactions }
    }

    pub async fn resolve(&self, key: &str) -> Result<Resolution, TransferError> {
        Ok(match self.transactions.get_by_key(key).await? {
            Some(tx) => {
                debug!(idempotency_key = %key, transaction_id = %tx.id, status = %tx.status, "Idempotency key hit");
                Resolution::Prior(tx)
            }
            None => Resolution::Absent,
        })
    }

    /// Turn a prior transaction into the caller-visible outcome.
    ///
    /// COMPLETED replays verbatim, PENDING is in progress, FAILED and
    /// REVERSED are a terminal conflict.
    pub fn outcome_of(prior: Transaction) -> Result<TransferOutcome, TransferError> {
        match prior.status {
            TransactionStatus::Completed => Ok(TransferOutcome::Replayed(prior)),
            TransactionStatus::Pending => Ok(TransferOutcome::InProgress(prior)),
            status @ (TransactionStatus::Failed | TransactionStatus::Reversed) => {
                Err(TransferError::KeyConsumed { status })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::AccountId;
    use crate::ledger::{InsertOutcome, MemoryLedger, types::now};
    use rust_decimal::Decimal;

    fn pending(key: &str) -> Transaction {
        Transaction::pending(
            AccountId::from("A"),
            AccountId::from("B"),
            Decimal::from(10),
            "INR",
            key,
        )
    }

    #[tokio::test]
    async fn test_resolve_absent_then_prior() {
        let ledger = Arc::new(MemoryLedger::new());
        let guard = IdempotencyGuard::new(ledger.clone());

        assert_eq!(guard.resolve("K1").await.unwrap(), Resolution::Absent);

        let tx = pending("K1");
        assert_eq!(
            ledger.insert_pending(&tx).await.unwrap(),
            InsertOutcome::Created
        );
        assert_eq!(guard.resolve("K1").await.unwrap(), Resolution::Prior(tx));
    }

    #[test]
    fn test_outcome_per_status() {
        let tx = pending("K");
        assert!(matches!(
            IdempotencyGuard::outcome_of(tx.clone()),
            Ok(TransferOutcome::InProgress(_))
        ));

        let completed = tx.transitioned(TransactionStatus::Completed, now());
        assert_eq!(
            IdempotencyGuard::outcome_of(completed.clone()).unwrap(),
            TransferOutcome::Replayed(completed)
        );

        for status in [TransactionStatus::Failed, TransactionStatus::Reversed] {
            assert_eq!(
                IdempotencyGuard::outcome_of(tx.transitioned(status, now())).unwrap_err(),
                TransferError::KeyConsumed { status }
            );
        }
    }
}
