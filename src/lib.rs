//! Ledger Transfer - double-entry ledger transfer service
//!
//! Moves value between accounts through an append-only double-entry ledger.
//! Every transfer fully applies or leaves no trace, retried requests never
//! double-apply, and balances are always derived from ledger history.
//!
//! # Modules
//!
//! - [`account`] - Account records and the read-only account registry
//! - [`ledger`] - Ledger store, transaction records, balance derivation
//! - [`transfer`] - Idempotency, account gate, atomic writes, orchestration
//! - [`gateway`] - HTTP surface (axum)
//! - [`db`] - PostgreSQL pool and schema
//! - [`config`] / [`logging`] - YAML configuration and tracing setup

pub mod account;
pub mod config;
pub mod db;
pub mod gateway;
pub mod ledger;
pub mod logging;
pub mod transfer;

// Convenient re-exports at crate root
pub use account::{Account, AccountId, AccountStatus};
pub use ledger::{LedgerEntry, Transaction, TransactionId, TransactionStatus};
pub use transfer::{Principal, TransferError, TransferOrchestrator, TransferOutcome};
