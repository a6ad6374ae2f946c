//! Storage Error Types

use thiserror::Error;

use super::state::TransactionStatus;

/// Errors raised by ledger, transaction and account storage
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Write-write or serialization conflict; the unit may be retried
    #[error("Transient write conflict: {0}")]
    Transient(String),

    /// Compare-and-swap on transaction status did not match
    #[error("Transaction {id} is not {expected}")]
    StatusMismatch {
        id: String,
        expected: TransactionStatus,
    },

    #[error("Ledger entry already recorded: {0}")]
    DuplicateEntry(String),

    #[error("Unknown transaction: {0}")]
    UnknownTransaction(String),

    /// Scope used after commit or rollback
    #[error("Write scope already closed")]
    ScopeClosed,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    /// Derived balance left the `Decimal` range
    #[error("Balance of account {0} overflows")]
    BalanceOverflow(String),
}

impl StoreError {
    /// Whether retrying the same unit of work may succeed
    #[inline]
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) => match db.code().as_deref() {
                // serialization_failure, deadlock_detected
                Some("40001") | Some("40P01") => StoreError::Transient(db.message().to_string()),
                // unique_violation
                Some("23505") => StoreError::DuplicateEntry(db.message().to_string()),
                _ => StoreError::Database(e.to_string()),
            },
            sqlx::Error::PoolTimedOut => StoreError::Transient(e.to_string()),
            _ => StoreError::Database(e.to_string()),
        }
    }
}
