//! SQLite-backed audit store.
//!
//! One connection guarded by a mutex: a single physical connection handles
//! one write at a time, many events in flight across workers queue on the
//! lock. Schema is applied on open.

use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::Connection;

use crate::error::{AuditError, AuditResult};
use crate::event::AuditEvent;
use super::{passes_filter, AuditStore, TrailFilter, Violation};

/// Database schema SQL
const SCHEMA_SQL: &str = r#"
-- Audit trail (append-only; deletions only via the retention sweeper)
CREATE TABLE IF NOT EXISTS audit_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    request_id TEXT NOT NULL UNIQUE,
    occurred_at TEXT NOT NULL,
    event_type TEXT NOT NULL,
    event_category TEXT NOT NULL,
    severity TEXT NOT NULL,
    user_id TEXT,
    requires_retention INTEGER NOT NULL DEFAULT 1,
    retention_years INTEGER NOT NULL,
    body TEXT NOT NULL
);

-- Violations (rule matches, with event snapshot)
CREATE TABLE IF NOT EXISTS violations (
    id TEXT PRIMARY KEY,
    rule_id TEXT NOT NULL,
    severity TEXT NOT NULL,
    detected_at TEXT NOT NULL,
    body TEXT NOT NULL
);

-- Indexes
CREATE INDEX IF NOT EXISTS idx_audit_events_time ON audit_events(occurred_at);
CREATE INDEX IF NOT EXISTS idx_audit_events_user ON audit_events(user_id, occurred_at);
CREATE INDEX IF NOT EXISTS idx_audit_events_category ON audit_events(event_category, occurred_at);
CREATE INDEX IF NOT EXISTS idx_violations_time ON violations(detected_at);
"#;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the store at the given path and apply the schema.
    pub fn open(path: &Path) -> AuditResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AuditError::Storage(format!("cannot create data dir: {}", e)))?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA_SQL)?;
        log::info!("Audit store opened at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Private in-memory database, mainly for tests.
    pub fn open_in_memory() -> AuditResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn format_ts(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

impl AuditStore for SqliteStore {
    fn append(&self, event: &AuditEvent) -> AuditResult<()> {
        let body = serde_json::to_string(event)?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO audit_events
                (request_id, occurred_at, event_type, event_category, severity,
                 user_id, requires_retention, retention_years, body)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            rusqlite::params![
                event.request_id,
                format_ts(event.timestamp),
                event.event_type,
                event.event_category.as_str(),
                event.severity.as_str(),
                event.user_id,
                event.requires_retention,
                event.retention_years,
                body,
            ],
        )?;
        Ok(())
    }

    fn append_violation(&self, violation: &Violation) -> AuditResult<()> {
        let body = serde_json::to_string(violation)?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO violations (id, rule_id, severity, detected_at, body)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                violation.id,
                violation.rule_id,
                violation.severity.as_str(),
                format_ts(violation.detected_at),
                body,
            ],
        )?;
        Ok(())
    }

    fn query(&self, filter: &TrailFilter) -> AuditResult<Vec<AuditEvent>> {
        // Narrow by the indexed columns in SQL; the remaining filter fields
        // apply after deserialization.
        let mut sql = String::from("SELECT body FROM audit_events");
        let mut clauses: Vec<&str> = Vec::new();
        let mut params: Vec<String> = Vec::new();

        if let Some(user_id) = &filter.user_id {
            clauses.push("user_id = ?");
            params.push(user_id.clone());
        }
        if let Some(start) = filter.start {
            clauses.push("occurred_at >= ?");
            params.push(format_ts(start));
        }
        if let Some(end) = filter.end {
            clauses.push("occurred_at < ?");
            params.push(format_ts(end));
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY occurred_at DESC, id DESC");

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(params.iter()), |row| {
            row.get::<_, String>(0)
        })?;

        let mut events = Vec::new();
        for body in rows {
            let event: AuditEvent = serde_json::from_str(&body?)?;
            if passes_filter(&event, filter) {
                events.push(event);
                if filter.limit.is_some_and(|limit| events.len() >= limit) {
                    break;
                }
            }
        }
        Ok(events)
    }

    fn fetch_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AuditResult<Vec<AuditEvent>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT body FROM audit_events
             WHERE occurred_at >= ?1 AND occurred_at < ?2
             ORDER BY occurred_at ASC, id ASC",
        )?;
        let rows = stmt.query_map(
            rusqlite::params![format_ts(start), format_ts(end)],
            |row| row.get::<_, String>(0),
        )?;

        let mut events = Vec::new();
        for body in rows {
            events.push(serde_json::from_str(&body?)?);
        }
        Ok(events)
    }

    fn delete_expired(&self, now: DateTime<Utc>) -> AuditResult<u64> {
        let conn = self.conn.lock();
        let deleted = conn.execute(
            "DELETE FROM audit_events
             WHERE requires_retention = 0
               AND datetime(occurred_at, '+' || retention_years || ' years') < datetime(?1)",
            rusqlite::params![format_ts(now)],
        )?;
        Ok(deleted as u64)
    }

    fn recent_violations(&self, limit: usize) -> AuditResult<Vec<Violation>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT body FROM violations ORDER BY detected_at DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(rusqlite::params![limit as i64], |row| {
            row.get::<_, String>(0)
        })?;

        let mut violations = Vec::new();
        for body in rows {
            violations.push(serde_json::from_str(&body?)?);
        }
        Ok(violations)
    }
}

// ============================================================================
// TESTS
// ============================================================================
