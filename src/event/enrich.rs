//! Event Enricher
//!
//! Stamps a raw event with identity, timestamp, retention class and data
//! sensitivity flags. Pure aside from reading the clock; no I/O.

use chrono::Utc;
use once_cell::sync::Lazy;
use uuid::Uuid;

use crate::error::{AuditError, AuditResult};
use super::types::{AuditEvent, RawAuditEvent};

/// Keywords whose presence marks an event as carrying personal data.
/// The exact lists are a compliance decision; they live here in one place.
static PERSONAL_DATA_KEYWORDS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "curp", "rfc", "email", "phone", "address", "name", "birth", "passport",
        "license", "beneficiary",
    ]
});

/// Keywords whose presence marks an event as carrying sensitive financial data.
static SENSITIVE_DATA_KEYWORDS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "account", "card", "balance", "transaction", "payment", "credit", "loan",
        "score", "income", "salary", "clabe",
    ]
});

/// Enrich a raw caller event into a full `AuditEvent`.
///
/// Fails only on malformed input (missing `event_type`, `event_category`
/// or `description`).
pub fn enrich(raw: RawAuditEvent) -> AuditResult<AuditEvent> {
    let event_type = match raw.event_type {
        Some(t) if !t.trim().is_empty() => t,
        _ => return Err(AuditError::Validation("eventType is required".to_string())),
    };
    let event_category = raw
        .event_category
        .ok_or_else(|| AuditError::Validation("eventCategory is required".to_string()))?;
    let description = match raw.description {
        Some(d) if !d.trim().is_empty() => d,
        _ => return Err(AuditError::Validation("description is required".to_string())),
    };

    let mut event = AuditEvent {
        request_id: raw
            .request_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string()),
        timestamp: raw.timestamp.unwrap_or_else(Utc::now),
        event_type,
        event_category,
        description,
        severity: raw.severity.unwrap_or_default(),
        risk_score: raw.risk_score.unwrap_or(0).min(100),
        // Populated by the rule engine, never by the caller.
        compliance_flags: Vec::new(),
        user_id: raw.user_id,
        user_email: raw.user_email,
        session_id: raw.session_id,
        ip_address: raw.ip_address,
        user_agent: raw.user_agent,
        endpoint: raw.endpoint,
        http_method: raw.http_method,
        resource_type: raw.resource_type,
        resource_id: raw.resource_id,
        amount: raw.amount,
        currency: raw.currency,
        product_id: raw.product_id,
        institution_id: raw.institution_id,
        request_data: raw.request_data,
        response_data: raw.response_data,
        response_status: raw.response_status,
        error: raw.error,
        error_code: raw.error_code,
        requires_retention: raw.requires_retention.unwrap_or(true),
        retention_years: raw
            .retention_years
            .unwrap_or_else(|| event_category.default_retention_years()),
        personal_data_included: false,
        sensitive_data_included: false,
    };

    let corpus = collect_scan_text(&event);
    event.personal_data_included = contains_any(&corpus, &PERSONAL_DATA_KEYWORDS);
    event.sensitive_data_included = contains_any(&corpus, &SENSITIVE_DATA_KEYWORDS);

    Ok(event)
}

/// Gather the free-text surface of an event for keyword scanning.
/// Structural traversal of the known fields, not a blind stringify of the
/// whole record.
fn collect_scan_text(event: &AuditEvent) -> Vec<String> {
    let mut texts = Vec::new();
    texts.push(event.description.to_lowercase());
    if let Some(email) = &event.user_email {
        texts.push(email.to_lowercase());
    }
    if let Some(endpoint) = &event.endpoint {
        texts.push(endpoint.to_lowercase());
    }
    if let Some(error) = &event.error {
        texts.push(error.to_lowercase());
    }
    if let Some(data) = &event.request_data {
        collect_value_text(data, &mut texts);
    }
    if let Some(data) = &event.response_data {
        collect_value_text(data, &mut texts);
    }
    texts
}

fn collect_value_text(value: &serde_json::Value, texts: &mut Vec<String>) {
    match value {
        serde_json::Value::String(s) => texts.push(s.to_lowercase()),
        serde_json::Value::Array(items) => {
            for item in items {
                collect_value_text(item, texts);
            }
        }
        serde_json::Value::Object(map) => {
            for (key, item) in map {
                texts.push(key.to_lowercase());
                collect_value_text(item, texts);
            }
        }
        _ => {}
    }
}

fn contains_any(texts: &[String], keywords: &[&str]) -> bool {
    texts
        .iter()
        .any(|text| keywords.iter().any(|kw| text.contains(kw)))
}

// ============================================================================
// TESTS
// ============================================================================
