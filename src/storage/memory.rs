//! In-memory audit store for tests and embedded use.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::error::{AuditError, AuditResult};
use crate::event::AuditEvent;
use super::{is_expired, passes_filter, AuditStore, TrailFilter, Violation};

#[derive(Default)]
pub struct MemoryStore {
    events: RwLock<Vec<AuditEvent>>,
    violations: RwLock<Vec<Violation>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Snapshot of everything stored, oldest first.
    pub fn all_events(&self) -> Vec<AuditEvent> {
        self.events.read().clone()
    }
}

impl AuditStore for MemoryStore {
    fn append(&self, event: &AuditEvent) -> AuditResult<()> {
        let mut events = self.events.write();
        if events.iter().any(|e| e.request_id == event.request_id) {
            return Err(AuditError::Storage(format!(
                "duplicate request id {}",
                event.request_id
            )));
        }
        events.push(event.clone());
        Ok(())
    }

    fn append_violation(&self, violation: &Violation) -> AuditResult<()> {
        self.violations.write().push(violation.clone());
        Ok(())
    }

    fn query(&self, filter: &TrailFilter) -> AuditResult<Vec<AuditEvent>> {
        let events = self.events.read();
        let mut matched: Vec<AuditEvent> = events
            .iter()
            .filter(|e| passes_filter(e, filter))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        if let Some(limit) = filter.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }

    fn fetch_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AuditResult<Vec<AuditEvent>> {
        let events = self.events.read();
        let mut matched: Vec<AuditEvent> = events
            .iter()
            .filter(|e| e.timestamp >= start && e.timestamp < end)
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(matched)
    }

    fn delete_expired(&self, now: DateTime<Utc>) -> AuditResult<u64> {
        let mut events = self.events.write();
        let before = events.len();
        events.retain(|e| e.requires_retention || !is_expired(e, now));
        Ok((before - events.len()) as u64)
    }

    fn recent_violations(&self, limit: usize) -> AuditResult<Vec<Violation>> {
        let violations = self.violations.read();
        let mut recent: Vec<Violation> = violations.clone();
        recent.sort_by(|a, b| b.detected_at.cmp(&a.detected_at));
        recent.truncate(limit);
        Ok(recent)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{enrich, EventCategory, RawAuditEvent};
    use chrono::Duration;

    fn event() -> AuditEvent {
        enrich(RawAuditEvent::new("X", EventCategory::Security, "d").with_user_id("u1")).unwrap()
    }

    #[test]
    fn test_append_rejects_duplicates() {
        let store = MemoryStore::new();
        let e = event();
        store.append(&e).unwrap();
        assert!(store.append(&e).is_err());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_delete_expired_matches_sqlite_semantics() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let expired = enrich(
            RawAuditEvent::new("X", EventCategory::Performance, "gone")
                .with_timestamp(now - Duration::days(800))
                .with_retention(false, Some(1)),
        )
        .unwrap();
        let held = enrich(
            RawAuditEvent::new("X", EventCategory::Performance, "kept")
                .with_timestamp(now - Duration::days(8000))
                .with_retention(true, Some(1)),
        )
        .unwrap();
        store.append(&expired).unwrap();
        store.append(&held).unwrap();

        assert_eq!(store.delete_expired(now).unwrap(), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.all_events()[0].description, "kept");
    }

    #[test]
    fn test_query_newest_first() {
        let store = MemoryStore::new();
        let now = Utc::now();
        for i in 0..3u32 {
            let e = enrich(
                RawAuditEvent::new("X", EventCategory::Security, &format!("e{}", i))
                    .with_timestamp(now - Duration::minutes(i64::from(i))),
            )
            .unwrap();
            store.append(&e).unwrap();
        }
        let trail = store.query(&TrailFilter::default()).unwrap();
        assert_eq!(trail[0].description, "e0");
        assert_eq!(trail[2].description, "e2");
    }
}
