//! Pipeline configuration.
//!
//! Read from environment variables with working fallbacks so the pipeline
//! can start in any deployment without a config file.

use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration for one pipeline instance.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// SQLite database file for the audit trail.
    pub database_path: PathBuf,
    /// JSON file holding the compliance rule set.
    pub rules_path: PathBuf,
    /// Hex-encoded 32-byte AES-256 key. No key means sensitive payloads
    /// are stored redacted but unencrypted.
    pub encryption_key: Option<String>,
    /// Alert channel endpoints.
    pub channels: ChannelConfig,
    /// Interval between retention sweeps.
    pub sweep_interval: Duration,
    /// Subscriber queue capacity; oldest entries are dropped beyond this.
    pub bus_capacity: usize,
}

/// Endpoints for the configured alert channels. A channel with no endpoint
/// is treated as unconfigured and counts as a delivery failure when a rule
/// names it.
#[derive(Debug, Clone, Default)]
pub struct ChannelConfig {
    pub email_gateway_url: Option<String>,
    pub email_recipients: Vec<String>,
    pub slack_webhook_url: Option<String>,
    pub webhook_url: Option<String>,
    pub sms_gateway_url: Option<String>,
    pub sms_recipients: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let data_dir = std::env::var("AUDIT_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::data_local_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("compliance-audit")
            });

        Self {
            database_path: std::env::var("AUDIT_DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| data_dir.join("audit_trail.db")),
            rules_path: std::env::var("AUDIT_RULES_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| data_dir.join("compliance_rules.json")),
            encryption_key: std::env::var("AUDIT_ENCRYPTION_KEY").ok(),
            channels: ChannelConfig {
                email_gateway_url: std::env::var("AUDIT_EMAIL_GATEWAY_URL").ok(),
                email_recipients: split_list(std::env::var("AUDIT_EMAIL_RECIPIENTS").ok()),
                slack_webhook_url: std::env::var("AUDIT_SLACK_WEBHOOK_URL").ok(),
                webhook_url: std::env::var("AUDIT_WEBHOOK_URL").ok(),
                sms_gateway_url: std::env::var("AUDIT_SMS_GATEWAY_URL").ok(),
                sms_recipients: split_list(std::env::var("AUDIT_SMS_RECIPIENTS").ok()),
            },
            sweep_interval: Duration::from_secs(
                std::env::var("AUDIT_SWEEP_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(24 * 60 * 60),
            ),
            bus_capacity: std::env::var("AUDIT_BUS_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1024),
        }
    }
}

fn split_list(raw: Option<String>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_list() {
        let list = split_list(Some("a@x.mx, b@x.mx ,,".to_string()));
        assert_eq!(list, vec!["a@x.mx".to_string(), "b@x.mx".to_string()]);
        assert!(split_list(None).is_empty());
    }

    #[test]
    fn test_default_config_has_paths() {
        let config = PipelineConfig::default();
        assert!(config.database_path.to_string_lossy().ends_with(".db"));
        assert!(config.sweep_interval >= Duration::from_secs(1));
        assert!(config.bus_capacity > 0);
    }
}
