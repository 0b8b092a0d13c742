//! Audit Pipeline service.
//!
//! One instance per process, constructed at start and passed by reference
//! to all call sites. `log_event` is the single blocking entry point:
//! enrich, evaluate rules, dispatch violations, persist securely, publish.
//!
//! The pipeline logs its own failures by calling itself through a system
//! path that skips rule evaluation. An event whose type denotes an internal
//! pipeline error never triggers another self-logging attempt on failure;
//! that failure goes to the process log only.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::json;

use crate::bus::{BusStats, EventBus};
use crate::config::PipelineConfig;
use crate::dispatch::{AccountDirectory, AlertChannel, ChannelSet, ComplianceDesk, ViolationDispatcher};
use crate::error::{AuditError, AuditResult};
use crate::event::{enrich, event_types, AuditEvent, EventCategory, RawAuditEvent, Severity};
use crate::metrics::{MetricsSnapshot, PipelineMetrics};
use crate::report::{build_summary, ReportSummary};
use crate::retention::RetentionSweeper;
use crate::rules::{JsonFileRuleStore, RuleEngine, RuleStore};
use crate::storage::{
    hash_ip, redact_payload, AuditStore, FieldCipher, SqliteStore, TrailFilter, Violation,
};

pub struct AuditPipeline {
    store: Arc<dyn AuditStore>,
    engine: RuleEngine,
    dispatcher: ViolationDispatcher,
    cipher: Option<FieldCipher>,
    bus: EventBus,
    metrics: PipelineMetrics,
    sweep_in_flight: AtomicBool,
}

impl AuditPipeline {
    /// Assemble a pipeline from explicit collaborators. Attempts an initial
    /// rule load; a failing rule store leaves the registry empty and the
    /// pipeline running.
    pub fn new(
        config: &PipelineConfig,
        store: Arc<dyn AuditStore>,
        rule_store: Arc<dyn RuleStore>,
        accounts: Arc<dyn AccountDirectory>,
        desk: Arc<dyn ComplianceDesk>,
    ) -> AuditResult<Self> {
        let cipher = match &config.encryption_key {
            Some(key) => Some(FieldCipher::from_hex(key)?),
            None => {
                log::warn!("No encryption key configured; sensitive payloads stored unencrypted");
                None
            }
        };

        let pipeline = Self {
            store,
            engine: RuleEngine::new(rule_store),
            dispatcher: ViolationDispatcher::new(
                ChannelSet::from_config(&config.channels),
                accounts,
                desk,
            ),
            cipher,
            bus: EventBus::new(config.bus_capacity),
            metrics: PipelineMetrics::new(),
            sweep_in_flight: AtomicBool::new(false),
        };

        pipeline.reload_rules();
        Ok(pipeline)
    }

    /// Convenience wiring: SQLite store and JSON rule file at the configured
    /// paths.
    pub fn open(
        config: &PipelineConfig,
        accounts: Arc<dyn AccountDirectory>,
        desk: Arc<dyn ComplianceDesk>,
    ) -> AuditResult<Self> {
        let store = Arc::new(SqliteStore::open(&config.database_path)?);
        let rule_store = Arc::new(JsonFileRuleStore::new(&config.rules_path));
        Self::new(config, store, rule_store, accounts, desk)
    }

    /// Additional alert channel beyond the configured set.
    pub fn register_channel(&mut self, channel: Box<dyn AlertChannel>) {
        self.dispatcher.register_channel(channel);
    }

    // ========================================================================
    // LOGGING ENTRY POINT
    // ========================================================================

    /// Log one business event. Returns the enriched event once persistence
    /// succeeded. Callers only ever see success, a validation error, or a
    /// storage error; every other internal fault is absorbed.
    pub fn log_event(&self, raw: RawAuditEvent) -> AuditResult<AuditEvent> {
        let mut event = enrich(raw)?;

        let matched = self.engine.evaluate(&event);
        let mut followups = Vec::new();

        if !matched.is_empty() {
            // The stored event itself carries the evidence of the match.
            for rule in &matched {
                if !event.compliance_flags.contains(&rule.name) {
                    event.compliance_flags.push(rule.name.clone());
                }
            }

            let result = self.dispatcher.dispatch(&event, &matched, self.store.as_ref());
            self.metrics.record_violations(matched.len());
            self.metrics.record_alert_failures(result.outcome.alerts_failed);
            self.metrics
                .record_auto_responses(result.outcome.responses_executed);
            if result.outcome.violations_failed > 0 {
                self.metrics.record_internal_error();
            }
            followups = result.followups;
        }

        let stored = self.store_secure(&event);
        match &stored {
            Ok(()) => {
                self.metrics.record_event();
                self.bus.publish(event.clone());
            }
            Err(e) => {
                self.metrics.record_storage_failure();
                log::error!("Audit event {} could not be persisted: {}", event.request_id, e);
            }
        }

        // Whatever happened to the main write, actions already taken must
        // leave their own trace.
        for followup in followups {
            self.log_system_event(followup);
        }

        stored.map(|()| event)
    }

    /// Pipeline-generated events: auto-response traces, sweep reports,
    /// internal errors. Persist and publish only, with no rule evaluation,
    /// so the pipeline can never feed back into itself.
    pub fn log_system_event(&self, raw: RawAuditEvent) {
        let is_pipeline_error =
            raw.event_type.as_deref() == Some(event_types::PIPELINE_ERROR);

        let event = match enrich(raw) {
            Ok(event) => event,
            Err(e) => {
                log::error!("Malformed internal audit event dropped: {}", e);
                return;
            }
        };

        match self.store_secure(&event) {
            Ok(()) => {
                self.metrics.record_event();
                self.bus.publish(event);
            }
            Err(e) => {
                self.metrics.record_storage_failure();
                if is_pipeline_error {
                    // Loop guard: a failing error-event write ends here.
                    log::error!(
                        "Audit pipeline error event could not be persisted: {}",
                        e
                    );
                } else {
                    self.report_internal_failure("system event persistence failed", &e);
                }
            }
        }
    }

    fn report_internal_failure(&self, context: &str, error: &AuditError) {
        self.metrics.record_internal_error();
        log::warn!("{}: {}", context, error);
        self.log_system_event(
            RawAuditEvent::new(
                event_types::PIPELINE_ERROR,
                EventCategory::Error,
                &format!("{}: {}", context, error),
            )
            .with_severity(Severity::Low),
        );
    }

    // ========================================================================
    // SECURE PERSISTENCE
    // ========================================================================

    /// Redact, hash, encrypt, then append. The caller's copy stays intact;
    /// only the stored record is transformed.
    fn store_secure(&self, event: &AuditEvent) -> AuditResult<()> {
        let mut record = event.clone();

        if record.personal_data_included {
            if let Some(payload) = record.request_data.as_mut() {
                redact_payload(payload);
            }
            if let Some(payload) = record.response_data.as_mut() {
                redact_payload(payload);
            }
        }

        if let Some(ip) = record.ip_address.take() {
            record.ip_address = Some(hash_ip(&ip));
        }

        if record.sensitive_data_included {
            if let Some(cipher) = &self.cipher {
                if let Some(payload) = record.request_data.take() {
                    record.request_data =
                        Some(serde_json::Value::String(cipher.seal(&payload.to_string())?));
                }
                if let Some(payload) = record.response_data.take() {
                    record.response_data =
                        Some(serde_json::Value::String(cipher.seal(&payload.to_string())?));
                }
            }
        }

        self.store.append(&record)
    }

    // ========================================================================
    // READ PATHS
    // ========================================================================

    /// Audit trail for one user, newest first.
    pub fn query_trail(&self, user_id: &str, filter: TrailFilter) -> AuditResult<Vec<AuditEvent>> {
        let filter = TrailFilter {
            user_id: Some(user_id.to_string()),
            ..filter
        };
        self.store.query(&filter)
    }

    /// Window summary for compliance reporting.
    pub fn report(
        &self,
        report_type: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AuditResult<ReportSummary> {
        let events = self.store.fetch_window(start, end)?;
        Ok(build_summary(report_type, start, end, &events))
    }

    pub fn recent_violations(&self, limit: usize) -> AuditResult<Vec<Violation>> {
        self.store.recent_violations(limit)
    }

    /// Everything published since the last drain, oldest first.
    pub fn drain_published(&self) -> Vec<AuditEvent> {
        self.bus.drain()
    }

    pub fn bus_stats(&self) -> BusStats {
        self.bus.stats()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn cipher(&self) -> Option<&FieldCipher> {
        self.cipher.as_ref()
    }

    // ========================================================================
    // RULE REGISTRY
    // ========================================================================

    /// Hot-reload the rule registry as a full-replacement snapshot. On
    /// failure the last-known-good set (possibly empty) stays in effect and
    /// the failure is logged through the pipeline itself.
    pub fn reload_rules(&self) -> usize {
        match self.engine.reload() {
            Ok(count) => {
                log::info!("Rule registry reloaded: {} active rules", count);
                count
            }
            Err(e) => {
                self.report_internal_failure("rule reload failed", &e);
                self.engine.active_count()
            }
        }
    }

    pub fn active_rule_count(&self) -> usize {
        self.engine.active_count()
    }

    // ========================================================================
    // RETENTION
    // ========================================================================

    /// One retention sweep, guarded so overlapping invocations never run
    /// concurrently against the same store.
    pub fn run_retention_sweep(&self) -> AuditResult<u64> {
        if self.sweep_in_flight.swap(true, Ordering::SeqCst) {
            log::debug!("Retention sweep already in flight, tick skipped");
            return Ok(0);
        }
        let result = self.sweep_once();
        self.sweep_in_flight.store(false, Ordering::SeqCst);
        result
    }

    fn sweep_once(&self) -> AuditResult<u64> {
        let deleted = match self.store.delete_expired(Utc::now()) {
            Ok(deleted) => deleted,
            Err(e) => {
                self.report_internal_failure("retention sweep failed", &e);
                return Err(e);
            }
        };

        if deleted > 0 {
            log::info!("Retention sweep deleted {} expired records", deleted);
            self.log_system_event(
                RawAuditEvent::new(
                    event_types::RETENTION_SWEEP,
                    EventCategory::SystemOperation,
                    &format!("Retention sweep deleted {} expired records", deleted),
                )
                .with_request_data(json!({ "deletedRecords": deleted })),
            );
        }
        Ok(deleted)
    }

    /// Start the background retention sweeper for this pipeline.
    pub fn start_sweeper(self: &Arc<Self>, interval: Duration) -> RetentionSweeper {
        RetentionSweeper::start(Arc::clone(self), interval)
    }
}

// ============================================================================
// TESTS
// ============================================================================
