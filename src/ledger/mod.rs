//! Ledger Store
//!
//! Append-only double-entry ledger plus the transaction records that own
//! its entries. Balances are derived, never stored.
//!
//! Backends:
//! - [`PgLedger`]: PostgreSQL, advisory lock per source account
//! - [`MemoryLedger`]: in-process, used by tests and `--memory` runs

pub mod balance;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod repository;
pub mod state;
pub mod types;

pub use balance::{BalanceDeriver, derive_balance};
pub use error::StoreError;
pub use memory::{CommitFault, MemoryLedger};
pub use postgres::PgLedger;
pub use repository::{
    AtomicStore, InsertOutcome, LedgerRepository, StagedWrite, TransactionRepository, WriteScope,
};
pub use state::TransactionStatus;
pub use types::{EntryId, EntryType, LedgerEntry, Transaction, TransactionId};
