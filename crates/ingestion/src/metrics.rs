//! Per-source emission counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Source metrics
#[derive(Debug, Default)]
pub struct SourceMetrics {
    /// Envelopes handed to the emitter
    emitted: AtomicU64,

    /// Samples refused (invalid, after termination, bad transition)
    rejected: AtomicU64,

    /// Device polls that produced nothing
    idle_polls: AtomicU64,
}

impl SourceMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_emitted(&self) {
        self.emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_idle_poll(&self) {
        self.idle_polls.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> SourceMetricsSnapshot {
        SourceMetricsSnapshot {
            emitted: self.emitted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            idle_polls: self.idle_polls.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceMetricsSnapshot {
    pub emitted: u64,
    pub rejected: u64,
    pub idle_polls: u64,
}
