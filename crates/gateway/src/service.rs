//! GatewayService - the single ingestion entry point
//!
//! Adapters and any front door call [`GatewayService::enqueue`]; the
//! forwarder pops from the same queue.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use contracts::{EnqueueCallback, QueuedItem};
use observability::{record_enqueue_rejected, record_enqueued};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::notifier::QueueNotifier;
use crate::queue::BoundedQueue;
use crate::throughput::{ThroughputCounter, DEFAULT_THRESHOLD};

/// Point-in-time service counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceStats {
    pub enqueued: u64,
    pub rejected: u64,
    pub ignored: u64,
    pub depth: usize,
    pub notifications_dropped: u64,
}

/// Owns the producer side of the queue
pub struct GatewayService {
    queue: Arc<BoundedQueue<QueuedItem>>,
    notifier: Option<QueueNotifier>,
    throughput: ThroughputCounter,
    rejected: AtomicU64,
    ignored: AtomicU64,
}

impl GatewayService {
    pub fn new(queue: Arc<BoundedQueue<QueuedItem>>) -> Self {
        Self {
            queue,
            notifier: None,
            throughput: ThroughputCounter::new(DEFAULT_THRESHOLD),
            rejected: AtomicU64::new(0),
            ignored: AtomicU64::new(0),
        }
    }

    /// Events per throughput log line
    pub fn with_throughput_threshold(mut self, threshold: u64) -> Self {
        self.throughput = ThroughputCounter::new(threshold);
        self
    }

    /// Attach OnDataInQueue delivery
    pub fn with_notifier(mut self, notifier: QueueNotifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Push one raw record and return the queue depth.
    ///
    /// Empty payloads are ignored. Observers are notified without blocking.
    ///
    /// # Errors
    /// `QueueFull` when admission control rejects the record.
    pub fn enqueue(&self, raw: impl Into<Bytes>) -> Result<usize> {
        let raw = raw.into();
        if raw.is_empty() {
            self.ignored.fetch_add(1, Ordering::Relaxed);
            return Ok(self.queue.len());
        }

        let item = QueuedItem::new(raw);
        let notice = self.notifier.as_ref().map(|_| item.clone());

        let depth = match self.queue.push(item) {
            Ok(depth) => depth,
            Err(e) => {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                record_enqueue_rejected();
                warn!(error = %e, "Enqueue rejected");
                return Err(e);
            }
        };

        if let (Some(notifier), Some(item)) = (&self.notifier, notice) {
            notifier.notify(&item);
        }

        if let Some(report) = self.throughput.record() {
            info!(
                events = report.events,
                elapsed_ms = report.elapsed.as_millis() as u64,
                events_per_ms = format!("{:.3}", report.events_per_ms()),
                "Gateway received {} events in {} ms",
                report.events,
                report.elapsed.as_millis()
            );
        }

        record_enqueued(depth);
        Ok(depth)
    }

    /// Shared ingestion path for adapters
    pub fn enqueue_callback(self: &Arc<Self>) -> EnqueueCallback {
        let service = Arc::clone(self);
        Arc::new(move |raw: Bytes| service.enqueue(raw).map_err(Into::into))
    }

    pub fn queue(&self) -> &Arc<BoundedQueue<QueuedItem>> {
        &self.queue
    }

    pub fn depth(&self) -> usize {
        self.queue.len()
    }

    pub fn stats(&self) -> ServiceStats {
        ServiceStats {
            enqueued: self.throughput.total(),
            rejected: self.rejected.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
            depth: self.queue.len(),
            notifications_dropped: self.notifier.as_ref().map_or(0, |n| n.dropped()),
        }
    }

    /// Stop notification delivery
    pub fn shutdown(&self) {
        if let Some(notifier) = &self.notifier {
            notifier.shutdown();
        }
        debug!(depth = self.queue.len(), "Gateway service shut down");
    }
}
