//! Ingestion metrics shared by all adapters

use std::sync::atomic::{AtomicU64, Ordering};

/// Ingestion metrics
#[derive(Debug, Default)]
pub struct IngestionMetrics {
    /// Records framed and handed to the enqueue callback
    pub records_received: AtomicU64,

    /// Records dropped by framing
    pub records_malformed: AtomicU64,

    /// Records refused by queue admission control
    pub records_rejected: AtomicU64,

    /// Reconnect / reopen attempts
    pub adapter_restarts: AtomicU64,
}

impl IngestionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self) {
        self.records_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed(&self) {
        self.records_malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.records_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_restart(&self, adapter: &str) {
        self.adapter_restarts.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("gateway_adapter_restarts_total", "adapter" => adapter.to_string())
            .increment(1);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            records_received: self.records_received.load(Ordering::Relaxed),
            records_malformed: self.records_malformed.load(Ordering::Relaxed),
            records_rejected: self.records_rejected.load(Ordering::Relaxed),
            adapter_restarts: self.adapter_restarts.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub records_received: u64,
    pub records_malformed: u64,
    pub records_rejected: u64,
    pub adapter_restarts: u64,
}
