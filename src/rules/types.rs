//! Compliance Rule Types

use serde::{Deserialize, Serialize};

use crate::event::Severity;

/// A named predicate over audit event fields.
///
/// A rule matches an event iff the event's type is in `event_types` and
/// every condition evaluates true (logical AND; conditions are pure).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceRule {
    pub id: String,
    pub name: String,
    pub event_types: Vec<String>,
    #[serde(default)]
    pub conditions: Vec<RuleCondition>,
    pub severity: Severity,
    #[serde(default)]
    pub alert_channels: Vec<AlertChannelKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_response: Option<AutoResponse>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl ComplianceRule {
    /// Minimal rule applying to the given event types; everything else via
    /// struct update or the helpers below.
    pub fn new(id: &str, name: &str, event_types: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            event_types: event_types.iter().map(|t| t.to_string()).collect(),
            conditions: Vec::new(),
            severity: Severity::Medium,
            alert_channels: Vec::new(),
            auto_response: None,
            is_active: true,
        }
    }

    pub fn with_condition(mut self, field: &str, operator: ConditionOperator, value: serde_json::Value) -> Self {
        self.conditions.push(RuleCondition {
            field: field.to_string(),
            operator,
            value,
        });
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_channels(mut self, channels: &[AlertChannelKind]) -> Self {
        self.alert_channels = channels.to_vec();
        self
    }

    pub fn with_auto_response(mut self, action: AutoResponseAction) -> Self {
        self.auto_response = Some(AutoResponse {
            action,
            parameters: serde_json::Value::Null,
        });
        self
    }
}

/// One `{field, operator, value}` predicate. `field` is a dotted path into
/// the event's wire form (camelCase), e.g. `"severity"` or
/// `"requestData.amount"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleCondition {
    pub field: String,
    pub operator: ConditionOperator,
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    Contains,
    GreaterThan,
    LessThan,
    Regex,
}

impl ConditionOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionOperator::Equals => "equals",
            ConditionOperator::Contains => "contains",
            ConditionOperator::GreaterThan => "greater_than",
            ConditionOperator::LessThan => "less_than",
            ConditionOperator::Regex => "regex",
        }
    }
}

/// Alert delivery channels a rule may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertChannelKind {
    Email,
    Slack,
    Webhook,
    Sms,
}

impl AlertChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertChannelKind::Email => "email",
            AlertChannelKind::Slack => "slack",
            AlertChannelKind::Webhook => "webhook",
            AlertChannelKind::Sms => "sms",
        }
    }
}

/// Automated response attached to a rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoResponse {
    pub action: AutoResponseAction,
    #[serde(default)]
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoResponseAction {
    BlockUser,
    FlagAccount,
    NotifyCompliance,
    CreateTicket,
}

impl AutoResponseAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AutoResponseAction::BlockUser => "block_user",
            AutoResponseAction::FlagAccount => "flag_account",
            AutoResponseAction::NotifyCompliance => "notify_compliance",
            AutoResponseAction::CreateTicket => "create_ticket",
        }
    }

    /// Actions that act on a specific account and are skipped when the
    /// triggering event carries no `user_id`.
    pub fn needs_user(&self) -> bool {
        matches!(self, AutoResponseAction::BlockUser | AutoResponseAction::FlagAccount)
    }
}
