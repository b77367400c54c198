//! Per-subscription metrics

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::registry::Subscription;

/// Metrics for a single subscription
#[derive(Debug, Default)]
pub struct ListenerMetrics {
    /// Current queue length
    queue_len: AtomicUsize,
    /// Listener calls that returned Ok
    delivered: AtomicU64,
    /// Listener calls that returned Err or panicked
    faults: AtomicU64,
    /// Envelopes evicted under DropOldest
    dropped: AtomicU64,
}

impl ListenerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_len(&self) -> usize {
        self.queue_len.load(Ordering::Relaxed)
    }

    pub fn set_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn inc_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn faults(&self) -> u64 {
        self.faults.load(Ordering::Relaxed)
    }

    pub fn inc_faults(&self) {
        self.faults.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn inc_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queue_len: self.queue_len(),
            delivered: self.delivered(),
            faults: self.faults(),
            dropped: self.dropped(),
        }
    }
}

/// Snapshot of listener metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub queue_len: usize,
    pub delivered: u64,
    pub faults: u64,
    pub dropped: u64,
}

/// Metrics of one live subscription, as returned by `EventBus::metrics`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerMetricsReport {
    pub subscription: Subscription,
    pub listener: String,
    pub metrics: MetricsSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot() {
        let metrics = ListenerMetrics::new();
        metrics.inc_delivered();
        metrics.inc_delivered();
        metrics.inc_faults();
        metrics.inc_dropped();
        metrics.set_queue_len(4);

        assert_eq!(
            metrics.snapshot(),
            MetricsSnapshot {
                queue_len: 4,
                delivered: 2,
                faults: 1,
                dropped: 1,
            }
        );
    }
}
