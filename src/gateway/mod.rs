//! HTTP gateway
//!
//! ```text
//! GET  /health                              (public)
//! GET  /api-docs/openapi.json               (public)
//! POST /transfers                           (principal)
//! POST /transfers/system/initial-funds      (system principal)
//! GET  /transfers/{id}                      (principal)
//! GET  /accounts/{id}/balance               (principal)
//! GET  /accounts/{id}/ledger                (principal)
//! ```

pub mod auth;
pub mod handlers;
pub mod openapi;
pub mod state;
pub mod types;

use std::sync::Arc;

use axum::{
    Router,
    middleware::from_fn,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tracing::info;

use crate::config::GatewayConfig;
use state::AppState;

/// Build the application router
pub fn router(state: Arc<AppState>) -> Router {
    let private_routes = Router::new()
        .route("/transfers", post(handlers::create_transfer))
        .route(
            "/transfers/system/initial-funds",
            post(handlers::issue_initial_funds),
        )
        .route("/transfers/{id}", get(handlers::get_transfer))
        .route("/accounts/{id}/balance", get(handlers::get_balance))
        .route("/accounts/{id}/ledger", get(handlers::get_ledger))
        .layer(from_fn(auth::principal_middleware));

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/api-docs/openapi.json", get(handlers::openapi_json))
        .merge(private_routes)
        .with_state(state)
}

/// Bind and serve until the server fails
pub async fn run_server(config: &GatewayConfig, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", addr, e))?;

    info!(%addr, "Gateway listening");
    info!("API Docs: http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;
    Ok(())
}
