//! Alert Channels
//!
//! Each external channel exposes a single deliver(payload) operation over
//! HTTP. Formatting is per platform; failures are reported per channel and
//! never abort delivery to the others.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::ChannelConfig;
use crate::error::{AuditError, AuditResult};
use crate::event::{AuditEvent, EventCategory, Severity};
use crate::rules::{AlertChannelKind, ComplianceRule};

// ============================================================================
// PAYLOAD
// ============================================================================

/// What every channel receives about a violation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertPayload {
    pub title: String,
    pub message: String,
    pub severity: Severity,
    pub rule_id: String,
    pub rule_name: String,
    pub event_type: String,
    pub event_category: EventCategory,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub detected_at: DateTime<Utc>,
}

impl AlertPayload {
    pub fn for_violation(rule: &ComplianceRule, event: &AuditEvent) -> Self {
        Self {
            title: format!("Compliance rule triggered: {}", rule.name),
            message: format!(
                "Event {} ({}) matched rule '{}'",
                event.event_type,
                event.event_category.as_str(),
                rule.name
            ),
            severity: rule.severity,
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            event_type: event.event_type.clone(),
            event_category: event.event_category,
            request_id: event.request_id.clone(),
            user_id: event.user_id.clone(),
            detected_at: Utc::now(),
        }
    }
}

// ============================================================================
// CHANNEL TRAIT
// ============================================================================

pub trait AlertChannel: Send + Sync {
    fn kind(&self) -> AlertChannelKind;
    fn deliver(&self, alert: &AlertPayload) -> AuditResult<()>;
}

fn post_json(kind: AlertChannelKind, url: &str, body: &str) -> AuditResult<()> {
    ureq::post(url)
        .set("Content-Type", "application/json")
        .send_string(body)
        .map_err(|e| AuditError::ChannelDelivery {
            channel: kind.as_str().to_string(),
            message: e.to_string(),
        })?;
    Ok(())
}

// ============================================================================
// CHANNEL IMPLEMENTATIONS
// ============================================================================

/// Generic webhook: the payload as-is.
pub struct WebhookChannel {
    url: String,
}

impl WebhookChannel {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
        }
    }
}

impl AlertChannel for WebhookChannel {
    fn kind(&self) -> AlertChannelKind {
        AlertChannelKind::Webhook
    }

    fn deliver(&self, alert: &AlertPayload) -> AuditResult<()> {
        let body = serde_json::to_string(alert).unwrap_or_else(|_| "{}".to_string());
        post_json(self.kind(), &self.url, &body)
    }
}

/// Slack incoming webhook, block layout.
pub struct SlackChannel {
    webhook_url: String,
}

impl SlackChannel {
    pub fn new(webhook_url: &str) -> Self {
        Self {
            webhook_url: webhook_url.to_string(),
        }
    }

    fn format(&self, alert: &AlertPayload) -> String {
        let mut fields = vec![
            serde_json::json!({
                "type": "mrkdwn",
                "text": format!("*Severity:* {}", alert.severity.as_str())
            }),
            serde_json::json!({
                "type": "mrkdwn",
                "text": format!("*Event:* {} ({})", alert.event_type, alert.event_category.as_str())
            }),
            serde_json::json!({
                "type": "mrkdwn",
                "text": format!("*Request:* {}", alert.request_id)
            }),
        ];
        if let Some(user_id) = &alert.user_id {
            fields.push(serde_json::json!({
                "type": "mrkdwn",
                "text": format!("*User:* {}", user_id)
            }));
        }

        serde_json::json!({
            "blocks": [
                {
                    "type": "header",
                    "text": {
                        "type": "plain_text",
                        "text": format!("{} {}", alert.severity.emoji(), alert.title),
                        "emoji": true
                    }
                },
                {
                    "type": "section",
                    "text": { "type": "mrkdwn", "text": alert.message }
                },
                { "type": "section", "fields": fields }
            ],
            "attachments": [{ "color": alert.severity.color() }]
        })
        .to_string()
    }
}

impl AlertChannel for SlackChannel {
    fn kind(&self) -> AlertChannelKind {
        AlertChannelKind::Slack
    }

    fn deliver(&self, alert: &AlertPayload) -> AuditResult<()> {
        post_json(self.kind(), &self.webhook_url, &self.format(alert))
    }
}

/// Mail gateway: subject/body plus recipient list.
pub struct EmailChannel {
    gateway_url: String,
    recipients: Vec<String>,
}

impl EmailChannel {
    pub fn new(gateway_url: &str, recipients: Vec<String>) -> Self {
        Self {
            gateway_url: gateway_url.to_string(),
            recipients,
        }
    }
}

impl AlertChannel for EmailChannel {
    fn kind(&self) -> AlertChannelKind {
        AlertChannelKind::Email
    }

    fn deliver(&self, alert: &AlertPayload) -> AuditResult<()> {
        let body = serde_json::json!({
            "to": self.recipients,
            "subject": format!("[{}] {}", alert.severity.as_str().to_uppercase(), alert.title),
            "body": format!(
                "{}\n\nRule: {} ({})\nEvent: {}\nRequest: {}\nDetected: {}",
                alert.message,
                alert.rule_name,
                alert.rule_id,
                alert.event_type,
                alert.request_id,
                alert.detected_at.to_rfc3339()
            ),
        })
        .to_string();
        post_json(self.kind(), &self.gateway_url, &body)
    }
}

/// SMS gateway: short text to a recipient list.
pub struct SmsChannel {
    gateway_url: String,
    recipients: Vec<String>,
}

impl SmsChannel {
    pub fn new(gateway_url: &str, recipients: Vec<String>) -> Self {
        Self {
            gateway_url: gateway_url.to_string(),
            recipients,
        }
    }
}

impl AlertChannel for SmsChannel {
    fn kind(&self) -> AlertChannelKind {
        AlertChannelKind::Sms
    }

    fn deliver(&self, alert: &AlertPayload) -> AuditResult<()> {
        let text: String = format!("{} {}", alert.severity.as_str().to_uppercase(), alert.title)
            .chars()
            .take(160)
            .collect();
        let body = serde_json::json!({
            "to": self.recipients,
            "message": text,
        })
        .to_string();
        post_json(self.kind(), &self.gateway_url, &body)
    }
}

// ============================================================================
// CHANNEL SET
// ============================================================================

/// The configured channels, looked up per rule at dispatch time.
#[derive(Default)]
pub struct ChannelSet {
    channels: HashMap<AlertChannelKind, Box<dyn AlertChannel>>,
}

impl ChannelSet {
    pub fn from_config(config: &ChannelConfig) -> Self {
        let mut set = Self::default();
        if let Some(url) = &config.webhook_url {
            set.insert(Box::new(WebhookChannel::new(url)));
        }
        if let Some(url) = &config.slack_webhook_url {
            set.insert(Box::new(SlackChannel::new(url)));
        }
        if let Some(url) = &config.email_gateway_url {
            set.insert(Box::new(EmailChannel::new(url, config.email_recipients.clone())));
        }
        if let Some(url) = &config.sms_gateway_url {
            set.insert(Box::new(SmsChannel::new(url, config.sms_recipients.clone())));
        }
        set
    }

    pub fn insert(&mut self, channel: Box<dyn AlertChannel>) {
        self.channels.insert(channel.kind(), channel);
    }

    pub fn get(&self, kind: AlertChannelKind) -> Option<&dyn AlertChannel> {
        self.channels.get(&kind).map(|c| c.as_ref())
    }

    pub fn configured(&self) -> Vec<AlertChannelKind> {
        self.channels.keys().copied().collect()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{enrich, RawAuditEvent};

    fn payload() -> AlertPayload {
        let rule = ComplianceRule::new("r-1", "Large transfer", &["TRANSFER"])
            .with_severity(Severity::High);
        let event = enrich(
            RawAuditEvent::new("TRANSFER", EventCategory::FinancialTransaction, "wire out")
                .with_user_id("u-9"),
        )
        .unwrap();
        AlertPayload::for_violation(&rule, &event)
    }

    #[test]
    fn test_payload_carries_rule_and_event_identity() {
        let p = payload();
        assert_eq!(p.rule_name, "Large transfer");
        assert_eq!(p.event_type, "TRANSFER");
        assert_eq!(p.severity, Severity::High);
        assert_eq!(p.user_id.as_deref(), Some("u-9"));
    }

    #[test]
    fn test_slack_format_contains_blocks() {
        let slack = SlackChannel::new("https://hooks.slack.invalid/T000");
        let formatted = slack.format(&payload());
        assert!(formatted.contains("blocks"));
        assert!(formatted.contains("Large transfer"));
        assert!(formatted.contains(Severity::High.color()));
    }

    #[test]
    fn test_channel_set_from_config() {
        let config = ChannelConfig {
            slack_webhook_url: Some("https://hooks.slack.invalid/T000".to_string()),
            webhook_url: Some("https://alerts.invalid/hook".to_string()),
            ..Default::default()
        };
        let set = ChannelSet::from_config(&config);
        assert!(set.get(AlertChannelKind::Slack).is_some());
        assert!(set.get(AlertChannelKind::Webhook).is_some());
        assert!(set.get(AlertChannelKind::Email).is_none());
        assert!(set.get(AlertChannelKind::Sms).is_none());
    }
}
