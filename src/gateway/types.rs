//! API Response types and error codes
//!
//! - `ApiResponse<T>`: Unified response wrapper
//! - `ApiError`: error half of every handler result
//! - `error_codes`: Standard error code constants
//! - Response DTOs

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use crate::ledger::{LedgerEntry, Transaction};
use crate::transfer::{AccountBalance, TransferError};

// ============================================================================
// Unified API Response Format
// ============================================================================

/// Unified API response wrapper
///
/// - code: 0 = success, non-zero = error code
/// - msg: short message description
/// - data: actual data (success) or absent (error)
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    /// Response code: 0 for success, non-zero for errors
    #[schema(example = 0)]
    pub code: i32,
    /// Response message
    #[schema(example = "ok")]
    pub msg: String,
    /// Response data (only present when code == 0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Create success response
    pub fn success(data: T) -> Self {
        Self::with_msg(data, "ok")
    }

    /// Success response carrying a status note
    pub fn with_msg(data: T, msg: impl Into<String>) -> Self {
        Self {
            code: error_codes::SUCCESS,
            msg: msg.into(),
            data: Some(data),
        }
    }

    /// Create error response
    pub fn error(code: i32, msg: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            code,
            msg: msg.into(),
            data: None,
        }
    }
}

pub type ApiResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), ApiError>;

/// 200 with the standard envelope
pub fn ok<T>(data: T) -> ApiResult<T> {
    Ok((StatusCode::OK, Json(ApiResponse::success(data))))
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: i32,
    pub msg: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: i32, msg: impl Into<String>) -> Self {
        Self {
            status,
            code,
            msg: msg.into(),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            error_codes::INVALID_PARAMETER,
            msg,
        )
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, error_codes::MISSING_AUTH, msg)
    }

    pub fn service_unavailable(msg: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            error_codes::SERVICE_UNAVAILABLE,
            msg,
        )
    }
}

impl From<TransferError> for ApiError {
    fn from(e: TransferError) -> Self {
        let status = StatusCode::from_u16(e.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let code = match &e {
            TransferError::MissingField(_)
            | TransferError::InvalidAmount
            | TransferError::AmountOutOfRange { .. }
            | TransferError::SameAccount => error_codes::INVALID_PARAMETER,
            TransferError::InsufficientFunds => error_codes::INSUFFICIENT_FUNDS,
            TransferError::CurrencyMismatch { .. } => error_codes::CURRENCY_MISMATCH,
            TransferError::Unauthorized => error_codes::MISSING_AUTH,
            TransferError::Forbidden(_) => error_codes::FORBIDDEN,
            TransferError::AccountInactive { .. } => error_codes::ACCOUNT_INACTIVE,
            TransferError::AccountNotFound(_) => error_codes::ACCOUNT_NOT_FOUND,
            TransferError::TransactionNotFound(_) => error_codes::TRANSACTION_NOT_FOUND,
            TransferError::KeyConsumed { .. } => error_codes::IDEMPOTENCY_KEY_CONSUMED,
            TransferError::AtomicWriteFailed(_) => error_codes::ATOMIC_WRITE_FAILED,
            TransferError::Storage(_) => error_codes::INTERNAL_ERROR,
        };
        let msg = if e.is_client_error() {
            e.to_string()
        } else {
            // Storage details stay in the logs
            tracing::error!(error = %e, "Request failed");
            match e {
                TransferError::AtomicWriteFailed(_) => {
                    "Transfer could not be committed; retry with a new idempotency key".to_string()
                }
                _ => "Internal error".to_string(),
            }
        };
        Self::new(status, code, msg)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ApiResponse::<()>::error(self.code, self.msg)),
        )
            .into_response()
    }
}

// ============================================================================
// Response DTOs
// ============================================================================

/// Transaction as returned by the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransactionView {
    #[schema(example = "01JAZ3K9X8Q4M2N7P5R6S8T0VW")]
    pub id: String,
    pub from_account: String,
    pub to_account: String,
    #[schema(value_type = String, example = "40")]
    pub amount: Decimal,
    #[schema(example = "INR")]
    pub currency: String,
    #[schema(example = "COMPLETED")]
    pub status: String,
    pub idempotency_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Transaction> for TransactionView {
    fn from(tx: Transaction) -> Self {
        Self {
            id: tx.id.to_string(),
            from_account: tx.from_account.to_string(),
            to_account: tx.to_account.to_string(),
            amount: tx.amount,
            currency: tx.currency,
            status: tx.status.as_str().to_string(),
            idempotency_key: tx.idempotency_key,
            error: tx.error,
            created_at: tx.created_at,
            updated_at: tx.updated_at,
        }
    }
}

/// Ledger entry as returned by the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EntryView {
    pub id: String,
    pub account: String,
    pub transaction_id: String,
    #[schema(example = "DEBIT")]
    pub entry_type: String,
    #[schema(value_type = String, example = "40")]
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

impl From<&LedgerEntry> for EntryView {
    fn from(e: &LedgerEntry) -> Self {
        Self {
            id: e.id().to_string(),
            account: e.account().to_string(),
            transaction_id: e.transaction_id().to_string(),
            entry_type: e.entry_type().as_str().to_string(),
            amount: e.amount(),
            created_at: e.created_at(),
        }
    }
}

/// Derived balance of an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BalanceView {
    pub account: String,
    pub currency: String,
    #[schema(value_type = String, example = "60")]
    pub balance: Decimal,
}

impl From<AccountBalance> for BalanceView {
    fn from(b: AccountBalance) -> Self {
        Self {
            account: b.account.to_string(),
            currency: b.currency,
            balance: b.balance,
        }
    }
}

/// Health check response data
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Server timestamp in milliseconds
    #[schema(example = 1703494800000_i64)]
    pub timestamp_ms: i64,
}

// ============================================================================
// Error Codes
// ============================================================================

/// Standard API error codes
pub mod error_codes {
    // Success
    pub const SUCCESS: i32 = 0;

    // Client errors (1xxx)
    pub const INVALID_PARAMETER: i32 = 1001;
    pub const INSUFFICIENT_FUNDS: i32 = 1002;
    pub const CURRENCY_MISMATCH: i32 = 1003;

    // Auth errors (2xxx)
    pub const MISSING_AUTH: i32 = 2001;
    pub const FORBIDDEN: i32 = 2003;
    pub const ACCOUNT_INACTIVE: i32 = 2004;

    // Resource errors (4xxx)
    pub const ACCOUNT_NOT_FOUND: i32 = 4001;
    pub const TRANSACTION_NOT_FOUND: i32 = 4002;
    pub const IDEMPOTENCY_KEY_CONSUMED: i32 = 4091;

    // Server errors (5xxx)
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const ATOMIC_WRITE_FAILED: i32 = 5001;
    pub const SERVICE_UNAVAILABLE: i32 = 5003;
}
