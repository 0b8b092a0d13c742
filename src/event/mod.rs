//! Audit event model and enrichment.

pub mod enrich;
pub mod types;

pub use enrich::enrich;
pub use types::{event_types, AuditEvent, EventCategory, RawAuditEvent, Severity};
