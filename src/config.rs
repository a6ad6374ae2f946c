use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

use anyhow::Context;

use crate::account::{Account, AccountId};
use crate::transfer::{RetryPolicy, TransferSettings, WorkerConfig};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub gateway: GatewayConfig,
    /// PostgreSQL connection URL; the in-memory store is used when absent
    #[serde(default)]
    pub postgres_url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub postgres_max_connections: u32,
    #[serde(default)]
    pub transfer: TransferConfig,
    #[serde(default)]
    pub recovery: RecoveryConfig,
    #[serde(default)]
    pub notification: NotificationConfig,
    /// Accounts registered at startup
    #[serde(default)]
    pub seed_accounts: Vec<Account>,
}

fn default_max_connections() -> u32 {
    20
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TransferConfig {
    pub max_commit_attempts: u32,
    pub retry_backoff_ms: u64,
    pub treasury_account: String,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            max_commit_attempts: 3,
            retry_backoff_ms: 50,
            treasury_account: "treasury".to_string(),
        }
    }
}

impl TransferConfig {
    pub fn settings(&self) -> TransferSettings {
        TransferSettings {
            retry: RetryPolicy {
                max_attempts: self.max_commit_attempts,
                backoff: Duration::from_millis(self.retry_backoff_ms),
            },
            treasury_account: AccountId::new(self.treasury_account.clone()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RecoveryConfig {
    pub enabled: bool,
    pub scan_interval_secs: u64,
    pub stale_threshold_secs: u64,
    pub batch_size: usize,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            scan_interval_secs: 30,
            stale_threshold_secs: 60,
            batch_size: 100,
        }
    }
}

impl RecoveryConfig {
    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            scan_interval: Duration::from_secs(self.scan_interval_secs),
            stale_threshold: Duration::from_secs(self.stale_threshold_secs),
            batch_size: self.batch_size,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NotificationConfig {
    /// Webhook receiving transfer notices; log-only when absent
    #[serde(default)]
    pub webhook_url: Option<String>,
    pub timeout_ms: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_ms: 2000,
        }
    }
}

impl AppConfig {
    pub fn load(env: &str) -> anyhow::Result<Self> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path))?;
        Self::from_yaml(&content).with_context(|| format!("Failed to parse {}", config_path))
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::AccountStatus;

    const MINIMAL: &str = r#"
log_level: info
log_dir: ./logs
log_file: ledger.log
use_json: false
rotation: daily
gateway:
  host: 127.0.0.1
  port: 8080
"#;

    #[test]
    fn test_defaults_applied() {
        let config = AppConfig::from_yaml(MINIMAL).unwrap();
        assert!(config.postgres_url.is_none());
        assert_eq!(config.transfer.max_commit_attempts, 3);
        assert_eq!(config.transfer.treasury_account, "treasury");
        assert!(config.recovery.enabled);
        assert!(config.notification.webhook_url.is_none());
        assert!(config.seed_accounts.is_empty());

        let settings = config.transfer.settings();
        assert_eq!(settings.retry.backoff, Duration::from_millis(50));
        assert_eq!(
            config.recovery.worker_config().stale_threshold,
            Duration::from_secs(60)
        );
    }

    #[test]
    fn test_seed_accounts() {
        let yaml = format!(
            "{}{}",
            MINIMAL,
            r#"
seed_accounts:
  - { id: treasury, owner_id: system, status: ACTIVE, currency: INR }
  - { id: acc-alice, owner_id: alice, status: FROZEN, currency: INR }
"#
        );
        let config = AppConfig::from_yaml(&yaml).unwrap();
        assert_eq!(config.seed_accounts.len(), 2);
        assert_eq!(config.seed_accounts[1].status, AccountStatus::Frozen);
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(AppConfig::load("does-not-exist").is_err());
    }

    #[test]
    fn test_dev_config_parses() {
        let content = fs::read_to_string("config/dev.yaml").unwrap();
        let config = AppConfig::from_yaml(&content).unwrap();
        assert_eq!(config.gateway.port, 8080);
        assert!(!config.seed_accounts.is_empty());
    }
}
