//! Transfer Error Types

use thiserror::Error;

use crate::ledger::{StoreError, TransactionStatus};

/// Transfer error taxonomy
///
/// Every variant except the system ones is raised before any write.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    // === Validation Errors ===
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("Amount must have at most {max_scale} decimal places and be below {max}")]
    AmountOutOfRange { max_scale: u32, max: String },

    #[error("Source and target account cannot be the same")]
    SameAccount,

    #[error("Currency mismatch: {from} -> {to}")]
    CurrencyMismatch { from: String, to: String },

    #[error("Insufficient funds")]
    InsufficientFunds,

    // === Authorization Errors ===
    #[error("Principal not authenticated")]
    Unauthorized,

    #[error("Principal does not own account {0}")]
    Forbidden(String),

    // === Account Errors ===
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Account {account} is {status}")]
    AccountInactive { account: String, status: String },

    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    // === Idempotency Errors ===
    /// Prior attempt under this key reached a terminal non-success state
    #[error("Idempotency key already used by a {status} transaction")]
    KeyConsumed { status: TransactionStatus },

    // === System Errors ===
    #[error("Atomic write failed: {0}")]
    AtomicWriteFailed(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl TransferError {
    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            TransferError::MissingField(_) => "MISSING_FIELD",
            TransferError::InvalidAmount => "INVALID_AMOUNT",
            TransferError::AmountOutOfRange { .. } => "AMOUNT_OUT_OF_RANGE",
            TransferError::SameAccount => "SAME_ACCOUNT",
            TransferError::CurrencyMismatch { .. } => "CURRENCY_MISMATCH",
            TransferError::InsufficientFunds => "INSUFFICIENT_FUNDS",
            TransferError::Unauthorized => "UNAUTHORIZED",
            TransferError::Forbidden(_) => "FORBIDDEN",
            TransferError::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            TransferError::AccountInactive { .. } => "ACCOUNT_INACTIVE",
            TransferError::TransactionNotFound(_) => "TRANSACTION_NOT_FOUND",
            TransferError::KeyConsumed { .. } => "IDEMPOTENCY_KEY_CONSUMED",
            TransferError::AtomicWriteFailed(_) => "ATOMIC_WRITE_FAILED",
            TransferError::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// HTTP status for the error
    pub fn http_status(&self) -> u16 {
        match self {
            TransferError::MissingField(_)
            | TransferError::InvalidAmount
            | TransferError::AmountOutOfRange { .. }
            | TransferError::SameAccount
            | TransferError::CurrencyMismatch { .. }
            | TransferError::InsufficientFunds => 400,
            TransferError::Unauthorized => 401,
            TransferError::Forbidden(_) | TransferError::AccountInactive { .. } => 403,
            TransferError::AccountNotFound(_) | TransferError::TransactionNotFound(_) => 404,
            TransferError::KeyConsumed { .. } => 409,
            TransferError::AtomicWriteFailed(_) | TransferError::Storage(_) => 500,
        }
    }

    /// Client errors are raised before anything is written
    pub fn is_client_error(&self) -> bool {
        self.http_status() < 500
    }
}

impl From<StoreError> for TransferError {
    fn from(e: StoreError) -> Self {
        TransferError::Storage(e.to_string())
    }
}
