//! HTTP handlers

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use utoipa::OpenApi;

use super::openapi::ApiDoc;
use super::state::AppState;
use super::types::{
    ApiError, ApiResponse, ApiResult, BalanceView, EntryView, HealthResponse, TransactionView, ok,
};
use crate::account::AccountId;
use crate::ledger::TransactionId;
use crate::transfer::{FundingRequest, Principal, TransferOutcome, TransferRequest};

fn outcome_response(outcome: TransferOutcome) -> ApiResult<TransactionView> {
    let (status, msg) = match &outcome {
        TransferOutcome::Created(_) => (StatusCode::CREATED, "ok"),
        TransferOutcome::Replayed(_) => (StatusCode::OK, "replayed"),
        TransferOutcome::InProgress(_) => (
            StatusCode::OK,
            "in progress: a transfer with this idempotency key is still PENDING",
        ),
    };
    let view = TransactionView::from(outcome.into_transaction());
    Ok((status, Json(ApiResponse::with_msg(view, msg))))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(v)| v)
        .map_err(|e| ApiError::bad_request(e.body_text()))
}

/// Create a transfer
///
/// POST /transfers
#[utoipa::path(
    post,
    path = "/transfers",
    request_body = TransferRequest,
    responses(
        (status = 201, description = "Transfer completed", body = TransactionView),
        (status = 200, description = "Replay of a completed transfer, or still in progress", body = TransactionView),
        (status = 400, description = "Validation failure or insufficient funds"),
        (status = 401, description = "No authenticated principal"),
        (status = 403, description = "Account not ACTIVE or not owned by the caller"),
        (status = 404, description = "Account not found"),
        (status = 409, description = "Idempotency key used by a FAILED or REVERSED transfer"),
        (status = 500, description = "Atomic write failed; mint a new idempotency key")
    ),
    security(("principal" = [])),
    tag = "Transfer"
)]
pub async fn create_transfer(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    payload: Result<Json<TransferRequest>, JsonRejection>,
) -> ApiResult<TransactionView> {
    let req = body(payload)?;
    let outcome = state.orchestrator.transfer(&principal, req).await?;
    outcome_response(outcome)
}

/// Issue funds from the treasury account
///
/// POST /transfers/system/initial-funds
#[utoipa::path(
    post,
    path = "/transfers/system/initial-funds",
    request_body = FundingRequest,
    responses(
        (status = 201, description = "Funds issued", body = TransactionView),
        (status = 200, description = "Replay", body = TransactionView),
        (status = 400, description = "Validation failure"),
        (status = 403, description = "Caller is not a system principal"),
        (status = 404, description = "Account not found"),
        (status = 409, description = "Idempotency key consumed")
    ),
    security(("principal" = [])),
    tag = "Transfer"
)]
pub async fn issue_initial_funds(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    payload: Result<Json<FundingRequest>, JsonRejection>,
) -> ApiResult<TransactionView> {
    let req = body(payload)?;
    let outcome = state
        .orchestrator
        .issue_initial_funds(&principal, req)
        .await?;
    outcome_response(outcome)
}

/// Get a transaction
///
/// GET /transfers/{id}
#[utoipa::path(
    get,
    path = "/transfers/{id}",
    params(("id" = String, Path, description = "Transaction ID (ULID)")),
    responses(
        (status = 200, description = "Transaction", body = TransactionView),
        (status = 400, description = "Invalid transaction ID"),
        (status = 403, description = "Not a party to the transaction"),
        (status = 404, description = "Transaction not found")
    ),
    security(("principal" = [])),
    tag = "Transfer"
)]
pub async fn get_transfer(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<TransactionView> {
    let id: TransactionId = id
        .parse()
        .map_err(|_| ApiError::bad_request(format!("Invalid transaction ID: {}", id)))?;
    let tx = state.orchestrator.transaction(&principal, id).await?;
    ok(tx.into())
}

/// Derived balance of an account
///
/// GET /accounts/{id}/balance
#[utoipa::path(
    get,
    path = "/accounts/{id}/balance",
    params(("id" = String, Path, description = "Account ID")),
    responses(
        (status = 200, description = "Balance", body = BalanceView),
        (status = 403, description = "Not the account owner"),
        (status = 404, description = "Account not found")
    ),
    security(("principal" = [])),
    tag = "Account"
)]
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<BalanceView> {
    let balance = state
        .orchestrator
        .balance(&principal, &AccountId::new(id))
        .await?;
    ok(balance.into())
}

/// Ledger history of an account, oldest first
///
/// GET /accounts/{id}/ledger
#[utoipa::path(
    get,
    path = "/accounts/{id}/ledger",
    params(("id" = String, Path, description = "Account ID")),
    responses(
        (status = 200, description = "Ledger entries", body = [EntryView]),
        (status = 403, description = "Not the account owner"),
        (status = 404, description = "Account not found")
    ),
    security(("principal" = [])),
    tag = "Account"
)]
pub async fn get_ledger(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<Vec<EntryView>> {
    let entries = state
        .orchestrator
        .ledger(&principal, &AccountId::new(id))
        .await?;
    ok(entries.iter().map(EntryView::from).collect())
}

/// Health check endpoint
///
/// - Healthy: 200 OK + {code: 0, data: {timestamp_ms}}
/// - Unhealthy: 503 Service Unavailable
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service healthy", body = HealthResponse),
        (status = 503, description = "Storage unavailable")
    ),
    tag = "System"
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> ApiResult<HealthResponse> {
    if let Err(e) = state.orchestrator.ping().await {
        tracing::warn!(error = %e, "Health check failed");
        return Err(ApiError::service_unavailable("unavailable"));
    }
    ok(HealthResponse {
        timestamp_ms: chrono::Utc::now().timestamp_millis(),
    })
}

/// OpenAPI document
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
