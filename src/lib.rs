//! Compliance audit-event pipeline.
//!
//! Ingests business events, enriches them with identity, retention and
//! data-sensitivity metadata, evaluates them against a configurable rule
//! registry, dispatches alerts and automated responses on violations,
//! persists everything immutably with redaction/hashing/encryption of
//! sensitive fields, and sweeps expired records in the background.
//!
//! ```no_run
//! use std::sync::Arc;
//! use compliance_audit_core::config::PipelineConfig;
//! use compliance_audit_core::dispatch::{MemoryAccountDirectory, MemoryComplianceDesk};
//! use compliance_audit_core::event::{EventCategory, RawAuditEvent};
//! use compliance_audit_core::pipeline::AuditPipeline;
//!
//! let config = PipelineConfig::default();
//! let pipeline = Arc::new(AuditPipeline::open(
//!     &config,
//!     Arc::new(MemoryAccountDirectory::new()),
//!     Arc::new(MemoryComplianceDesk::new()),
//! ).unwrap());
//!
//! let sweeper = pipeline.start_sweeper(config.sweep_interval);
//!
//! pipeline.log_event(RawAuditEvent::new(
//!     "BURO_CREDIT_SCORE_REQUEST",
//!     EventCategory::CreditInquiry,
//!     "Credit score requested",
//! ).with_user_id("u1")).unwrap();
//!
//! sweeper.stop();
//! ```

pub mod bus;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod metrics;
pub mod pipeline;
pub mod report;
pub mod retention;
pub mod rules;
pub mod storage;

pub use config::PipelineConfig;
pub use error::{AuditError, AuditResult};
pub use event::{AuditEvent, EventCategory, RawAuditEvent, Severity};
pub use pipeline::AuditPipeline;
pub use report::ReportSummary;
pub use retention::RetentionSweeper;
pub use rules::{ComplianceRule, ConditionOperator};
pub use storage::{AuditStore, TrailFilter, Violation};
