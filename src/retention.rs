//! Retention Sweeper
//!
//! Periodic background deletion of expired, non-retained records. Runs on
//! its own thread so it never blocks the request path; ticks are skipped
//! while a sweep is still running, and shutdown takes effect at the next
//! tick.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::pipeline::AuditPipeline;

/// Cancellation poll granularity.
const TICK: Duration = Duration::from_secs(1);

pub struct RetentionSweeper {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl RetentionSweeper {
    /// Start sweeping the pipeline's store every `interval`.
    pub fn start(pipeline: Arc<AuditPipeline>, interval: Duration) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();

        let handle = std::thread::Builder::new()
            .name("retention-sweeper".to_string())
            .spawn(move || {
                log::info!("Retention sweeper started (interval {:?})", interval);
                let mut next_due = Instant::now() + interval;

                loop {
                    if stop_flag.load(Ordering::SeqCst) {
                        break;
                    }
                    std::thread::sleep(TICK.min(interval));
                    if Instant::now() < next_due {
                        continue;
                    }
                    next_due = Instant::now() + interval;

                    // Failures are logged and the loop keeps going; a sweep
                    // must never take the process down.
                    if let Err(e) = pipeline.run_retention_sweep() {
                        log::error!("Retention sweep failed: {}", e);
                    }
                }
                log::info!("Retention sweeper stopped");
            })
            .expect("failed to spawn retention sweeper thread");

        Self {
            stop,
            handle: Some(handle),
        }
    }

    /// Request shutdown and wait for the next tick.
    pub fn stop(mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for RetentionSweeper {
    fn drop(&mut self) {
        // Signal only; the thread exits at its next tick.
        self.stop.store(true, Ordering::SeqCst);
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChannelConfig, PipelineConfig};
    use crate::dispatch::{MemoryAccountDirectory, MemoryComplianceDesk};
    use crate::event::{EventCategory, RawAuditEvent};
    use crate::rules::MemoryRuleStore;
    use crate::storage::MemoryStore;
    use chrono::{Duration as ChronoDuration, Utc};

    fn pipeline(store: Arc<MemoryStore>) -> Arc<AuditPipeline> {
        let config = PipelineConfig {
            database_path: std::path::PathBuf::from(":memory:"),
            rules_path: std::path::PathBuf::from("unused.json"),
            encryption_key: None,
            channels: ChannelConfig::default(),
            sweep_interval: Duration::from_millis(50),
            bus_capacity: 16,
        };
        Arc::new(
            AuditPipeline::new(
                &config,
                store,
                Arc::new(MemoryRuleStore::default()),
                Arc::new(MemoryAccountDirectory::new()),
                Arc::new(MemoryComplianceDesk::new()),
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_sweeper_deletes_in_background() {
        let store = Arc::new(MemoryStore::new());
        let pipeline = pipeline(store.clone());

        pipeline
            .log_event(
                RawAuditEvent::new("OLD", EventCategory::Performance, "stale")
                    .with_timestamp(Utc::now() - ChronoDuration::days(800))
                    .with_retention(false, Some(1)),
            )
            .unwrap();
        assert_eq!(store.len(), 1);

        let sweeper = RetentionSweeper::start(pipeline.clone(), Duration::from_millis(50));
        assert!(sweeper.is_running());

        // wait a few intervals for the sweep to land
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            let stale_gone = store
                .all_events()
                .iter()
                .all(|e| e.event_type != "OLD");
            if stale_gone {
                break;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        assert!(store.all_events().iter().all(|e| e.event_type != "OLD"));

        sweeper.stop();
    }

    #[test]
    fn test_stop_joins_at_next_tick() {
        let pipeline = pipeline(Arc::new(MemoryStore::new()));
        let sweeper = RetentionSweeper::start(pipeline, Duration::from_secs(3600));
        assert!(sweeper.is_running());
        // returns promptly even though the interval is an hour
        let started = Instant::now();
        sweeper.stop();
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
