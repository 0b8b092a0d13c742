//! Running pipeline counters.
//!
//! Atomic increments only; approximate totals are acceptable and need not
//! be linearizable with individual log calls.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Default)]
pub struct PipelineMetrics {
    events_logged: AtomicU64,
    violations_detected: AtomicU64,
    alerts_failed: AtomicU64,
    auto_responses_executed: AtomicU64,
    storage_failures: AtomicU64,
    internal_errors: AtomicU64,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub events_logged: u64,
    pub violations_detected: u64,
    pub alerts_failed: u64,
    pub auto_responses_executed: u64,
    pub storage_failures: u64,
    pub internal_errors: u64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_event(&self) {
        self.events_logged.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_violations(&self, count: usize) {
        self.violations_detected
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_alert_failures(&self, count: usize) {
        self.alerts_failed.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_auto_responses(&self, count: usize) {
        self.auto_responses_executed
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_storage_failure(&self) {
        self.storage_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_internal_error(&self) {
        self.internal_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            events_logged: self.events_logged.load(Ordering::Relaxed),
            violations_detected: self.violations_detected.load(Ordering::Relaxed),
            alerts_failed: self.alerts_failed.load(Ordering::Relaxed),
            auto_responses_executed: self.auto_responses_executed.load(Ordering::Relaxed),
            storage_failures: self.storage_failures.load(Ordering::Relaxed),
            internal_errors: self.internal_errors.load(Ordering::Relaxed),
        }
    }
}
