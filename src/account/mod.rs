//! Account registry
//!
//! Accounts are owned by an external registry; the transfer core only reads
//! them (existence, owner, status, currency).

pub mod models;
pub mod registry;

pub use models::{Account, AccountId, AccountStatus};
pub use registry::{AccountRegistry, MemoryAccountRegistry, PgAccountRegistry};
