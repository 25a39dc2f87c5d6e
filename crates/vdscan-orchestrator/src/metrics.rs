//! Process-wide counters.
//!
//! Dropped events have no user-facing error channel; the counters are the
//! only place that records them.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct ScanMetrics {
    events_processed: AtomicU64,
    events_dropped: AtomicU64,
    elements_indexed: AtomicU64,
    alerts_emitted: AtomicU64,
}

/// Point-in-time snapshot of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub events_processed: u64,
    pub events_dropped: u64,
    pub elements_indexed: u64,
    pub alerts_emitted: u64,
}

impl ScanMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn event_processed(&self) {
        self.events_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn event_dropped(&self) {
        self.events_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn elements_indexed(&self, count: u64) {
        self.elements_indexed.fetch_add(count, Ordering::Relaxed);
    }

    pub fn alerts_emitted(&self, count: u64) {
        self.alerts_emitted.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            events_processed: self.events_processed.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
            elements_indexed: self.elements_indexed.load(Ordering::Relaxed),
            alerts_emitted: self.alerts_emitted.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = ScanMetrics::new();
        metrics.event_processed();
        metrics.event_processed();
        metrics.event_dropped();
        metrics.elements_indexed(3);
        metrics.alerts_emitted(2);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.events_processed, 2);
        assert_eq!(snapshot.events_dropped, 1);
        assert_eq!(snapshot.elements_indexed, 3);
        assert_eq!(snapshot.alerts_emitted, 2);
    }
}
