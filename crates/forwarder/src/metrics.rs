//! Forwarder metrics for observability

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one forwarder
#[derive(Debug, Default)]
pub struct ForwarderMetrics {
    /// Batches fully published
    batches_sent: AtomicU64,
    /// Batches published with some items rejected by transform
    batches_partial: AtomicU64,
    /// Batches the publisher refused
    batches_failed: AtomicU64,
    /// Readings handed to a successful publish
    readings_forwarded: AtomicU64,
    /// Readings lost with a failed batch
    readings_dropped: AtomicU64,
    /// Items rejected by transform
    items_rejected: AtomicU64,
    /// Drain cycles that panicked
    cycle_panics: AtomicU64,
}

impl ForwarderMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_sent(&self, readings: usize, rejected: usize) {
        if rejected == 0 {
            self.batches_sent.fetch_add(1, Ordering::Relaxed);
        } else {
            self.batches_partial.fetch_add(1, Ordering::Relaxed);
        }
        self.readings_forwarded
            .fetch_add(readings as u64, Ordering::Relaxed);
    }

    pub fn record_failed(&self, readings: usize) {
        self.batches_failed.fetch_add(1, Ordering::Relaxed);
        self.readings_dropped
            .fetch_add(readings as u64, Ordering::Relaxed);
    }

    pub fn record_rejected(&self, count: usize) {
        self.items_rejected
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_cycle_panic(&self) {
        self.cycle_panics.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            batches_sent: self.batches_sent.load(Ordering::Relaxed),
            batches_partial: self.batches_partial.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            readings_forwarded: self.readings_forwarded.load(Ordering::Relaxed),
            readings_dropped: self.readings_dropped.load(Ordering::Relaxed),
            items_rejected: self.items_rejected.load(Ordering::Relaxed),
            cycle_panics: self.cycle_panics.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of forwarder metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub batches_sent: u64,
    pub batches_partial: u64,
    pub batches_failed: u64,
    pub readings_forwarded: u64,
    pub readings_dropped: u64,
    pub items_rejected: u64,
    pub cycle_panics: u64,
}

impl MetricsSnapshot {
    /// Batches that reached the publisher successfully
    pub fn batches_published(&self) -> u64 {
        self.batches_sent + self.batches_partial
    }
}
