//! Secure Persistence
//!
//! Append-only storage boundary for audit events and violation records.
//! The store contract is exactly three operations: append, range read,
//! conditional delete. Redaction, hashing and encryption happen before the
//! record reaches a store.

pub mod crypto;
pub mod memory;
pub mod redact;
pub mod sqlite;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AuditResult;
use crate::event::{AuditEvent, EventCategory, Severity};
use crate::rules::ComplianceRule;

pub use crypto::FieldCipher;
pub use memory::MemoryStore;
pub use redact::{hash_ip, redact_payload, REDACTION_MARKER};
pub use sqlite::SqliteStore;

// ============================================================================
// VIOLATION RECORD
// ============================================================================

/// One rule matching one event, with a snapshot of the triggering event so
/// the rule engine's decisions can be audited independently. Never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    pub id: String,
    pub rule_id: String,
    pub rule_name: String,
    pub severity: Severity,
    pub detected_at: DateTime<Utc>,
    pub event: AuditEvent,
}

impl Violation {
    pub fn new(rule: &ComplianceRule, event: &AuditEvent) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            severity: rule.severity,
            detected_at: Utc::now(),
            event: event.clone(),
        }
    }
}

// ============================================================================
// TRAIL FILTER
// ============================================================================

/// Filters for trail queries. All fields combine with AND.
#[derive(Debug, Clone, Default)]
pub struct TrailFilter {
    pub user_id: Option<String>,
    pub event_category: Option<EventCategory>,
    pub event_type: Option<String>,
    pub min_severity: Option<Severity>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

// ============================================================================
// STORE CONTRACT
// ============================================================================

/// Durable store boundary. Any store offering these operations satisfies the
/// pipeline: a relational table, a log-structured store, or the in-memory
/// implementation used in tests.
pub trait AuditStore: Send + Sync {
    /// Durably append one event. Must reject duplicate `request_id`s.
    fn append(&self, event: &AuditEvent) -> AuditResult<()>;

    /// Durably append one violation record.
    fn append_violation(&self, violation: &Violation) -> AuditResult<()>;

    /// Filtered trail read, newest first.
    fn query(&self, filter: &TrailFilter) -> AuditResult<Vec<AuditEvent>>;

    /// Range read for reporting: `start <= timestamp < end`, oldest first.
    fn fetch_window(&self, start: DateTime<Utc>, end: DateTime<Utc>)
        -> AuditResult<Vec<AuditEvent>>;

    /// Delete records not marked for retention whose age exceeds their
    /// `retention_years`. Returns the count deleted. Records with
    /// `requires_retention` are never touched regardless of age.
    fn delete_expired(&self, now: DateTime<Utc>) -> AuditResult<u64>;

    /// Most recent violation records, newest first.
    fn recent_violations(&self, limit: usize) -> AuditResult<Vec<Violation>>;
}

/// Shared post-fetch filtering used by store implementations.
pub(crate) fn passes_filter(event: &AuditEvent, filter: &TrailFilter) -> bool {
    if let Some(user_id) = &filter.user_id {
        if event.user_id.as_deref() != Some(user_id.as_str()) {
            return false;
        }
    }
    if let Some(category) = filter.event_category {
        if event.event_category != category {
            return false;
        }
    }
    if let Some(event_type) = &filter.event_type {
        if &event.event_type != event_type {
            return false;
        }
    }
    if let Some(min) = filter.min_severity {
        if event.severity < min {
            return false;
        }
    }
    if let Some(start) = filter.start {
        if event.timestamp < start {
            return false;
        }
    }
    if let Some(end) = filter.end {
        if event.timestamp >= end {
            return false;
        }
    }
    true
}

/// Whether a record is past its retention horizon.
pub(crate) fn is_expired(event: &AuditEvent, now: DateTime<Utc>) -> bool {
    let horizon = event.timestamp + chrono::Months::new(u32::from(event.retention_years) * 12);
    horizon < now
}
