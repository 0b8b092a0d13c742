//! Subscriber queue.
//!
//! Bounded publish step for downstream consumers (dashboards, exporters).
//! Publishing never blocks persistence: when the queue is full the oldest
//! entry is dropped and counted.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::Serialize;

use crate::event::AuditEvent;

pub struct EventBus {
    queue: Mutex<VecDeque<AuditEvent>>,
    capacity: usize,
    published: AtomicU64,
    dropped: AtomicU64,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BusStats {
    pub published: u64,
    pub dropped: u64,
    pub depth: usize,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::with_capacity(capacity.min(256))),
            capacity: capacity.max(1),
            published: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn publish(&self, event: AuditEvent) {
        let mut queue = self.queue.lock();
        if queue.len() >= self.capacity {
            queue.pop_front();
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        queue.push_back(event);
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    /// Take everything currently queued, oldest first.
    pub fn drain(&self) -> Vec<AuditEvent> {
        let mut queue = self.queue.lock();
        queue.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    pub fn stats(&self) -> BusStats {
        BusStats {
            published: self.published.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            depth: self.len(),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{enrich, EventCategory, RawAuditEvent};

    fn event(tag: &str) -> AuditEvent {
        enrich(RawAuditEvent::new("X", EventCategory::Security, tag)).unwrap()
    }

    #[test]
    fn test_publish_and_drain() {
        let bus = EventBus::new(8);
        bus.publish(event("first"));
        bus.publish(event("second"));

        let drained = bus.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].description, "first");
        assert!(bus.is_empty());
    }

    #[test]
    fn test_bounded_drops_oldest() {
        let bus = EventBus::new(2);
        bus.publish(event("a"));
        bus.publish(event("b"));
        bus.publish(event("c"));

        let drained = bus.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].description, "b");
        assert_eq!(drained[1].description, "c");

        let stats = bus.stats();
        assert_eq!(stats.published, 3);
        assert_eq!(stats.dropped, 1);
    }
}
