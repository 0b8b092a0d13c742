//! Audit Event Types
//!
//! Immutable, timestamped audit events for the compliance trail.
//! Once persisted an event is never modified; corrections are new events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// EVENT NAMES (pipeline-generated)
// ============================================================================

/// Event types the pipeline itself emits. Reserved; callers should not use
/// these for business events.
pub mod event_types {
    /// Internal pipeline failure. Never re-logged through the pipeline when
    /// its own persistence fails (loop guard).
    pub const PIPELINE_ERROR: &str = "AUDIT_PIPELINE_ERROR";
    /// Account blocked by an auto-response.
    pub const AUTO_ACCOUNT_BLOCK: &str = "AUTO_ACCOUNT_BLOCK";
    /// Account risk score raised by an auto-response.
    pub const AUTO_ACCOUNT_FLAG: &str = "AUTO_ACCOUNT_FLAG";
    /// Retention sweep completed with deletions.
    pub const RETENTION_SWEEP: &str = "RETENTION_SWEEP_COMPLETED";
}

// ============================================================================
// CATEGORIES & SEVERITY
// ============================================================================

/// Closed set of audit event categories.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Authentication,
    Authorization,
    DataAccess,
    DataModification,
    FinancialTransaction,
    CreditInquiry,
    Kyc,
    Compliance,
    Security,
    ExternalApi,
    SystemOperation,
    BusinessOperation,
    Privacy,
    FraudDetection,
    Performance,
    Error,
}

impl EventCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventCategory::Authentication => "authentication",
            EventCategory::Authorization => "authorization",
            EventCategory::DataAccess => "data_access",
            EventCategory::DataModification => "data_modification",
            EventCategory::FinancialTransaction => "financial_transaction",
            EventCategory::CreditInquiry => "credit_inquiry",
            EventCategory::Kyc => "kyc",
            EventCategory::Compliance => "compliance",
            EventCategory::Security => "security",
            EventCategory::ExternalApi => "external_api",
            EventCategory::SystemOperation => "system_operation",
            EventCategory::BusinessOperation => "business_operation",
            EventCategory::Privacy => "privacy",
            EventCategory::FraudDetection => "fraud_detection",
            EventCategory::Performance => "performance",
            EventCategory::Error => "error",
        }
    }

    /// Regulatory default for how many years records of this category are
    /// kept when the caller does not specify a value.
    pub fn default_retention_years(&self) -> u16 {
        match self {
            EventCategory::FinancialTransaction => 10,
            EventCategory::CreditInquiry => 6,
            EventCategory::Kyc => 7,
            EventCategory::Compliance => 10,
            EventCategory::Security => 7,
            EventCategory::Authentication => 3,
            EventCategory::DataAccess => 7,
            EventCategory::Privacy => 7,
            EventCategory::FraudDetection => 10,
            _ => 5,
        }
    }
}

/// Severity of an audit event or a matched rule.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    pub fn is_high(&self) -> bool {
        matches!(self, Severity::High | Severity::Critical)
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Severity::Low => "🟢",
            Severity::Medium => "🟡",
            Severity::High => "🟠",
            Severity::Critical => "🔴",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Severity::Low => "#36a64f",
            Severity::Medium => "#f2c744",
            Severity::High => "#f2740d",
            Severity::Critical => "#d00000",
        }
    }
}

// ============================================================================
// AUDIT EVENT (Main struct)
// ============================================================================

/// One fully enriched unit of record.
///
/// `compliance_flags`, `personal_data_included`, `sensitive_data_included`
/// and the retention defaulting are always set by the pipeline, never taken
/// from caller input.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub event_category: EventCategory,
    pub description: String,
    pub severity: Severity,
    pub risk_score: u8,
    #[serde(default)]
    pub compliance_flags: Vec<String>,

    // Actor / request context
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_method: Option<String>,

    // Resource / business context
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub institution_id: Option<String>,

    // Payloads
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_status: Option<u16>,

    // Error context
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,

    // Retention
    pub requires_retention: bool,
    pub retention_years: u16,
    pub personal_data_included: bool,
    pub sensitive_data_included: bool,
}

impl AuditEvent {
    /// Single-line JSON form, mainly for subscribers and diagnostics.
    pub fn to_jsonl(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn is_flagged(&self) -> bool {
        !self.compliance_flags.is_empty()
    }
}

// ============================================================================
// RAW EVENT (caller input)
// ============================================================================

/// What upstream callers hand to `log_event`. Only `event_type`,
/// `event_category` and `description` are required; everything else is
/// optional. Pipeline-owned fields do not exist here at all.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawAuditEvent {
    pub event_type: Option<String>,
    pub event_category: Option<EventCategory>,
    pub description: Option<String>,

    pub request_id: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub severity: Option<Severity>,
    pub risk_score: Option<u8>,

    pub user_id: Option<String>,
    pub user_email: Option<String>,
    pub session_id: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub endpoint: Option<String>,
    pub http_method: Option<String>,

    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub amount: Option<f64>,
    pub currency: Option<String>,
    pub product_id: Option<String>,
    pub institution_id: Option<String>,

    pub request_data: Option<serde_json::Value>,
    pub response_data: Option<serde_json::Value>,
    pub response_status: Option<u16>,

    pub error: Option<String>,
    pub error_code: Option<String>,

    pub requires_retention: Option<bool>,
    pub retention_years: Option<u16>,
}

impl RawAuditEvent {
    /// Create a raw event with the three required fields.
    pub fn new(event_type: &str, category: EventCategory, description: &str) -> Self {
        Self {
            event_type: Some(event_type.to_string()),
            event_category: Some(category),
            description: Some(description.to_string()),
            ..Default::default()
        }
    }

    // Builder pattern methods
    pub fn with_user_id(mut self, user_id: &str) -> Self {
        self.user_id = Some(user_id.to_string());
        self
    }

    pub fn with_user_email(mut self, email: &str) -> Self {
        self.user_email = Some(email.to_string());
        self
    }

    pub fn with_session(mut self, session_id: &str) -> Self {
        self.session_id = Some(session_id.to_string());
        self
    }

    pub fn with_ip_address(mut self, ip: &str) -> Self {
        self.ip_address = Some(ip.to_string());
        self
    }

    pub fn with_endpoint(mut self, endpoint: &str, http_method: &str) -> Self {
        self.endpoint = Some(endpoint.to_string());
        self.http_method = Some(http_method.to_string());
        self
    }

    pub fn with_resource(mut self, resource_type: &str, resource_id: &str) -> Self {
        self.resource_type = Some(resource_type.to_string());
        self.resource_id = Some(resource_id.to_string());
        self
    }

    pub fn with_amount(mut self, amount: f64, currency: &str) -> Self {
        self.amount = Some(amount);
        self.currency = Some(currency.to_string());
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn with_risk_score(mut self, risk_score: u8) -> Self {
        self.risk_score = Some(risk_score);
        self
    }

    pub fn with_request_data(mut self, data: serde_json::Value) -> Self {
        self.request_data = Some(data);
        self
    }

    pub fn with_response(mut self, status: u16, data: serde_json::Value) -> Self {
        self.response_status = Some(status);
        self.response_data = Some(data);
        self
    }

    pub fn with_error(mut self, error: &str, error_code: Option<&str>) -> Self {
        self.error = Some(error.to_string());
        self.error_code = error_code.map(|c| c.to_string());
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_retention(mut self, requires_retention: bool, retention_years: Option<u16>) -> Self {
        self.requires_retention = Some(requires_retention);
        self.retention_years = retention_years;
        self
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_retention_defaults() {
        assert_eq!(EventCategory::FinancialTransaction.default_retention_years(), 10);
        assert_eq!(EventCategory::CreditInquiry.default_retention_years(), 6);
        assert_eq!(EventCategory::Kyc.default_retention_years(), 7);
        assert_eq!(EventCategory::Authentication.default_retention_years(), 3);
        assert_eq!(EventCategory::BusinessOperation.default_retention_years(), 5);
    }

    #[test]
    fn test_category_serde_names() {
        let json = serde_json::to_string(&EventCategory::CreditInquiry).unwrap();
        assert_eq!(json, "\"credit_inquiry\"");
        let back: EventCategory = serde_json::from_str("\"fraud_detection\"").unwrap();
        assert_eq!(back, EventCategory::FraudDetection);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Critical.is_high());
        assert!(!Severity::Medium.is_high());
    }

    #[test]
    fn test_raw_event_builder() {
        let raw = RawAuditEvent::new("LOGIN_ATTEMPT", EventCategory::Authentication, "User login")
            .with_user_id("u-42")
            .with_ip_address("10.1.2.3")
            .with_severity(Severity::Medium);

        assert_eq!(raw.event_type.as_deref(), Some("LOGIN_ATTEMPT"));
        assert_eq!(raw.user_id.as_deref(), Some("u-42"));
        assert_eq!(raw.severity, Some(Severity::Medium));
        assert!(raw.request_id.is_none());
    }

    #[test]
    fn test_raw_event_camel_case_wire_form() {
        let raw = RawAuditEvent::new("X", EventCategory::Security, "d").with_user_id("u1");
        let json = serde_json::to_string(&raw).unwrap();
        assert!(json.contains("\"eventType\""));
        assert!(json.contains("\"eventCategory\""));
        assert!(json.contains("\"userId\""));
    }
}
