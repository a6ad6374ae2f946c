//! Ledger transfer service
//!
//! ```text
//! HTTP ──▶ principal middleware ──▶ TransferOrchestrator
//!                                     ├─ IdempotencyGuard
//!                                     ├─ AccountStatusGate ──▶ AccountRegistry
//!                                     ├─ BalanceDeriver ─────▶ LedgerRepository
//!                                     └─ AtomicWriteCoordinator ─▶ AtomicStore
//! RecoveryWorker ──▶ TransactionRepository (stale PENDING → FAILED)
//! ```
//!
//! Usage: `ledger_transfer [--env|-e <name>] [--port <n>]`

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use ledger_transfer::account::{MemoryAccountRegistry, PgAccountRegistry};
use ledger_transfer::config::AppConfig;
use ledger_transfer::db;
use ledger_transfer::gateway::{self, state::AppState};
use ledger_transfer::ledger::MemoryLedger;
use ledger_transfer::transfer::{
    LedgerBackends, LogNotifier, Notifier, RecoveryWorker, TransferOrchestrator, WebhookNotifier,
};

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

/// Get port override from command line (--port argument)
fn get_port_override() -> Option<u16> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--port" && i + 1 < args.len() {
            return args[i + 1].parse().ok();
        }
    }
    None
}

async fn build_backends(config: &AppConfig) -> anyhow::Result<LedgerBackends> {
    match &config.postgres_url {
        Some(url) => {
            let pool = db::open_pool(url, config.postgres_max_connections).await?;

            let registry = PgAccountRegistry::new(pool.clone());
            for account in &config.seed_accounts {
                registry
                    .upsert(account)
                    .await
                    .with_context(|| format!("Failed to seed account {}", account.id))?;
            }
            tracing::info!(
                seeded = config.seed_accounts.len(),
                "Using PostgreSQL ledger store"
            );
            Ok(LedgerBackends::postgres(pool))
        }
        None => {
            let registry: MemoryAccountRegistry =
                config.seed_accounts.iter().cloned().collect();
            tracing::warn!(
                seeded = config.seed_accounts.len(),
                "No postgres_url configured; using in-memory ledger store (not durable)"
            );
            Ok(LedgerBackends::in_memory(
                Arc::new(registry),
                Arc::new(MemoryLedger::new()),
            ))
        }
    }
}

fn build_notifier(config: &AppConfig) -> anyhow::Result<Arc<dyn Notifier>> {
    Ok(match &config.notification.webhook_url {
        Some(url) => {
            tracing::info!(%url, "Transfer notifications via webhook");
            Arc::new(WebhookNotifier::new(
                url.clone(),
                Duration::from_millis(config.notification.timeout_ms),
            )?)
        }
        None => Arc::new(LogNotifier),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let mut config = AppConfig::load(&env)?;
    if let Some(port) = get_port_override() {
        config.gateway.port = port;
    }
    let _log_guard = ledger_transfer::logging::init_logging(&config)?;

    tracing::info!("Starting ledger transfer service in {} mode", env);

    let backends = build_backends(&config).await?;
    let notifier = build_notifier(&config)?;

    if config.recovery.enabled {
        let worker = RecoveryWorker::new(
            backends.transactions.clone(),
            config.recovery.worker_config(),
        );
        tokio::spawn(async move { worker.run().await });
    }

    let orchestrator = Arc::new(TransferOrchestrator::new(
        backends,
        notifier,
        config.transfer.settings(),
    ));
    tracing::info!(
        treasury = %orchestrator.treasury_account(),
        "Transfer orchestrator ready"
    );

    gateway::run_server(&config.gateway, Arc::new(AppState::new(orchestrator))).await
}
