//! Notification collaborator
//!
//! Called once per executed transfer, after commit. Delivery is best-effort:
//! the orchestrator logs a failed notification and moves on.

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

use crate::account::AccountId;
use crate::ledger::TransactionId;

/// Message sent to the principal who initiated a transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferNotice {
    pub principal_id: String,
    pub email: Option<String>,
    pub transaction_id: TransactionId,
    pub amount: Decimal,
    pub currency: String,
    pub counterparty_account: AccountId,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notice: &TransferNotice) -> anyhow::Result<()>;
}

/// Writes notices to the log only
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notice: &TransferNotice) -> anyhow::Result<()> {
        info!(
            principal_id = %notice.principal_id,
            transaction_id = %notice.transaction_id,
            amount = %notice.amount,
            currency = %notice.currency,
            counterparty = %notice.counterparty_account,
            "Transfer notification"
        );
        Ok(())
    }
}

/// POSTs each notice as JSON to a webhook
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, notice: &TransferNotice) -> anyhow::Result<()> {
        self.client
            .post(&self.url)
            .json(notice)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Mock notifier for testing
#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    pub struct MockNotifier {
        sent: Mutex<Vec<TransferNotice>>,
        fail: AtomicBool,
    }

    impl MockNotifier {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_fail(&self, fail: bool) {
            self.fail.store(fail, Ordering::SeqCst);
        }

        pub fn sent(&self) -> Vec<TransferNotice> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Notifier for MockNotifier {
        async fn notify(&self, notice: &TransferNotice) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push(notice.clone());
            if self.fail.load(Ordering::SeqCst) {
                anyhow::bail!("notification channel down");
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notice() -> TransferNotice {
        TransferNotice {
            principal_id: "alice".into(),
            email: Some("alice@example.com".into()),
            transaction_id: TransactionId::new(),
            amount: Decimal::from(40),
            currency: "INR".into(),
            counterparty_account: AccountId::from("B"),
        }
    }

    #[test]
    fn test_notice_json_shape() {
        let json = serde_json::to_value(notice()).unwrap();
        assert_eq!(json["principalId"], "alice");
        assert_eq!(json["counterpartyAccount"], "B");
        assert_eq!(json["amount"], "40");
    }

    #[tokio::test]
    async fn test_log_notifier_never_fails() {
        assert!(LogNotifier.notify(&notice()).await.is_ok());
    }

    #[tokio::test]
    async fn test_webhook_unreachable_is_error() {
        let notifier =
            WebhookNotifier::new("http://127.0.0.1:1/hooks/transfer", Duration::from_millis(500))
                .unwrap();
        assert!(notifier.notify(&notice()).await.is_err());
    }
}
