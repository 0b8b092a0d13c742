//! Reporting Aggregator
//!
//! Read-only time-window summaries over the persisted trail, grouped by
//! (category, event type). An empty window yields a zero-filled summary.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::event::{AuditEvent, EventCategory, Severity};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub report_type: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub total_events: u64,
    pub critical_events: u64,
    pub high_severity_events: u64,
    pub flagged_events: u64,
    pub groups: Vec<ReportGroup>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportGroup {
    pub event_category: EventCategory,
    pub event_type: String,
    pub total: u64,
    pub critical: u64,
    pub high: u64,
    pub flagged: u64,
}

/// Roll up a fetched window into a summary.
pub fn build_summary(
    report_type: &str,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    events: &[AuditEvent],
) -> ReportSummary {
    let mut groups: BTreeMap<(EventCategory, String), ReportGroup> = BTreeMap::new();

    for event in events {
        let key = (event.event_category, event.event_type.clone());
        let group = groups.entry(key).or_insert_with(|| ReportGroup {
            event_category: event.event_category,
            event_type: event.event_type.clone(),
            total: 0,
            critical: 0,
            high: 0,
            flagged: 0,
        });

        group.total += 1;
        match event.severity {
            Severity::Critical => group.critical += 1,
            Severity::High => group.high += 1,
            _ => {}
        }
        if event.is_flagged() {
            group.flagged += 1;
        }
    }

    let groups: Vec<ReportGroup> = groups.into_values().collect();
    ReportSummary {
        report_type: report_type.to_string(),
        window_start,
        window_end,
        total_events: groups.iter().map(|g| g.total).sum(),
        critical_events: groups.iter().map(|g| g.critical).sum(),
        high_severity_events: groups.iter().map(|g| g.high).sum(),
        flagged_events: groups.iter().map(|g| g.flagged).sum(),
        groups,
    }
}

// ============================================================================
// TESTS
// ============================================================================
