//! Transfer core
//!
//! # Components
//!
//! - [`IdempotencyGuard`]: key → at most one transaction outcome
//! - [`AccountStatusGate`]: both parties exist, are ACTIVE and share a currency
//! - [`AtomicWriteCoordinator`]: DEBIT + CREDIT + COMPLETED as one unit
//! - [`TransferOrchestrator`]: composes the above; the only caller-facing API
//! - [`RecoveryWorker`]: fails transactions stranded in PENDING
//!
//! # Safety Invariants
//!
//! 1. **Validate-Before-Write**: every client error is raised before the PENDING row exists
//! 2. **One Key, One Outcome**: the storage UNIQUE constraint decides concurrent creators
//! 3. **Lock-Then-Recheck**: funds are re-derived under the source account lock before commit
//! 4. **Explicit Fail**: a unit that cannot commit moves its transaction to FAILED

pub mod coordinator;
pub mod error;
pub mod gate;
pub mod idempotency;
pub mod notify;
pub mod orchestrator;
pub mod types;
pub mod worker;


pub use coordinator::{AtomicWriteCoordinator, CommitError, RetryPolicy};
pub use error::TransferError;
pub use gate::{AccountStatusGate, Parties};
pub use idempotency::{IdempotencyGuard, Resolution};
pub use notify::{LogNotifier, Notifier, TransferNotice, WebhookNotifier};
pub use orchestrator::{AccountBalance, LedgerBackends, TransferOrchestrator, TransferSettings};
pub use types::{
    FundingRequest, Principal, Role, TransferOutcome, TransferRequest, ValidTransfer,
};
pub use worker::{RecoveryWorker, WorkerConfig};
