//! Recovery Worker
//!
//! A process that dies between the PENDING insert and the atomic unit leaves
//! the transaction PENDING forever, and its key answers "in progress" to
//! every replay. This worker moves such transactions to FAILED.
//!
//! Safe against a unit still in flight: the unit's COMPLETED transition is a
//! CAS on PENDING, so once the worker wins the transaction can never gain
//! entries.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::ledger::{StoreError, TransactionRepository};

const STALE_REASON: &str = "abandoned: PENDING past recovery threshold";

/// Configuration for the recovery worker
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// How often to scan for stale transactions
    pub scan_interval: Duration,
    /// How long a transaction must stay PENDING to be considered abandoned
    pub stale_threshold: Duration,
    /// Maximum transactions to process per scan
    pub batch_size: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_secs(30),
            stale_threshold: Duration::from_secs(60),
            batch_size: 100,
        }
    }
}

pub struct RecoveryWorker {
    transactions: Arc<dyn TransactionRepository>,
    config: WorkerConfig,
}

impl RecoveryWorker {
    pub fn new(transactions: Arc<dyn TransactionRepository>, config: WorkerConfig) -> Self {
        Self {
            transactions,
            config,
        }
    }

    /// Run the recovery loop; never returns
    pub async fn run(&self) {
        info!(
            scan_interval_secs = self.config.scan_interval.as_secs(),
            stale_threshold_secs = self.config.stale_threshold.as_secs(),
            "Starting recovery worker"
        );

        loop {
            if let Err(e) = self.scan_and_recover().await {
                error!(error = %e, "Recovery scan failed");
            }

            tokio::time::sleep(self.config.scan_interval).await;
        }
    }

    /// Run a single scan; returns how many transactions were moved to FAILED
    pub async fn scan_and_recover(&self) -> Result<usize, StoreError> {
        let stale = self
            .transactions
            .find_stale_pending(self.config.stale_threshold, self.config.batch_size)
            .await?;

        if stale.is_empty() {
            debug!("No stale transactions found");
            return Ok(0);
        }

        info!(count = stale.len(), "Found stale PENDING transactions");

        let mut recovered = 0;
        for tx in &stale {
            match self.transactions.mark_failed(tx.id, STALE_REASON).await {
                Ok(true) => {
                    info!(
                        transaction_id = %tx.id,
                        idempotency_key = %tx.idempotency_key,
                        "Stale transaction FAILED"
                    );
                    recovered += 1;
                }
                Ok(false) => {
                    debug!(transaction_id = %tx.id, "Transaction left PENDING during scan");
                }
                Err(e) => {
                    error!(
                        transaction_id = %tx.id,
                        error = %e,
                        alert = true,
                        "Failed to mark stale transaction FAILED"
                    );
                }
            }
        }

        Ok(recovered)
    }
}
