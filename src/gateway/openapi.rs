//! OpenAPI Documentation
//!
//! - OpenAPI JSON: `http://localhost:8080/api-docs/openapi.json`

use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::gateway::types::{BalanceView, EntryView, HealthResponse, TransactionView};
use crate::transfer::{FundingRequest, TransferRequest};

/// Trusted-proxy principal headers
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "principal",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                    "x-principal-id",
                    "Authenticated principal ID, set by the upstream auth proxy. \
                     Optional companions: x-principal-email, x-principal-name, \
                     x-principal-role (SYSTEM for treasury operations).",
                ))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Ledger Transfer API",
        version = "1.0.0",
        description = "Double-entry ledger transfers with idempotent, atomic execution."
    ),
    servers(
        (url = "http://localhost:8080", description = "Development"),
    ),
    paths(
        crate::gateway::handlers::health_check,
        crate::gateway::handlers::create_transfer,
        crate::gateway::handlers::issue_initial_funds,
        crate::gateway::handlers::get_transfer,
        crate::gateway::handlers::get_balance,
        crate::gateway::handlers::get_ledger,
    ),
    components(
        schemas(
            TransferRequest,
            FundingRequest,
            TransactionView,
            EntryView,
            BalanceView,
            HealthResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Transfer", description = "Transfers and treasury issuance (principal required)"),
        (name = "Account", description = "Balance and ledger queries (principal required)"),
        (name = "System", description = "Health checks")
    )
)]
pub struct ApiDoc;
