//! BatchForwarder - drains the gateway queue and publishes batches
//!
//! One background loop wakes on `process()` or on the flush timer, claims
//! up to `max_batch_size` items, transforms them and hands the batch to the
//! publisher exactly once. A failed publish is logged and the batch is
//! dropped; items are never pushed back onto the queue.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use contracts::{Batch, ForwarderSettings, MessagePublisher, QueuedItem};
use gateway::BoundedQueue;
use observability::{record_batch_published, record_items_rejected, record_publish_latency_ms};
use tokio::sync::{broadcast, watch, Notify};
use tokio::task::{AbortHandle, JoinError, JoinHandle};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{ForwarderError, Result};
use crate::metrics::ForwarderMetrics;
use crate::report::{BatchOutcome, BatchReport};
use crate::transform::Transform;

const REPORT_CAPACITY: usize = 256;
const MIN_FLUSH_INTERVAL: Duration = Duration::from_millis(1);

/// Forwarder configuration
#[derive(Debug, Clone)]
pub struct ForwarderConfig {
    /// Items claimed per cycle
    pub max_batch_size: usize,
    /// Timer trigger for the drain loop
    pub flush_interval: Duration,
    /// Appended to every reading's location
    pub gateway_location: Option<String>,
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 500,
            flush_interval: Duration::from_millis(50),
            gateway_location: None,
        }
    }
}

impl ForwarderConfig {
    pub fn from_settings(settings: &ForwarderSettings, gateway_location: Option<String>) -> Self {
        Self {
            max_batch_size: settings.max_batch_size.max(1),
            flush_interval: settings.flush_interval().max(MIN_FLUSH_INTERVAL),
            gateway_location,
        }
    }
}

/// Result of `BatchForwarder::stop`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Loop exited within the timeout
    Graceful,
    /// Loop did not exit in time; it and any in-flight publish were aborted
    Abandoned,
    /// Loop panicked before or while stopping
    Crashed,
    /// Nothing was running
    NotRunning,
}

struct Runner {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

struct Inner<P> {
    queue: Arc<BoundedQueue<QueuedItem>>,
    publisher: Arc<P>,
    config: ForwarderConfig,
    transform: Transform,
    next_batch_id: AtomicU64,
    wake: Notify,
    reports: broadcast::Sender<BatchReport>,
    metrics: Arc<ForwarderMetrics>,
    runner: Mutex<Option<Runner>>,
    /// Cycle currently spawned by the drain loop
    cycle: Mutex<Option<AbortHandle>>,
}

/// Batch Forwarder
///
/// Cheap to clone; clones share the same loop, queue and publisher.
pub struct BatchForwarder<P> {
    inner: Arc<Inner<P>>,
}

impl<P> Clone for BatchForwarder<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P> BatchForwarder<P>
where
    P: MessagePublisher + Sync + 'static,
{
    pub fn new(
        queue: Arc<BoundedQueue<QueuedItem>>,
        publisher: Arc<P>,
        config: ForwarderConfig,
    ) -> Self {
        let (reports, _) = broadcast::channel(REPORT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                queue,
                publisher,
                transform: Transform::new(config.gateway_location.clone()),
                config,
                next_batch_id: AtomicU64::new(1),
                wake: Notify::new(),
                reports,
                metrics: Arc::new(ForwarderMetrics::new()),
                runner: Mutex::new(None),
                cycle: Mutex::new(None),
            }),
        }
    }

    /// Spawn the drain loop
    ///
    /// # Errors
    /// `AlreadyRunning` if a loop is active, `NoRuntime` outside Tokio.
    pub fn start(&self) -> Result<()> {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(ForwarderError::NoRuntime);
        }
        let mut runner = lock(&self.inner.runner);
        if runner.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            return Err(ForwarderError::AlreadyRunning);
        }

        let (shutdown, rx) = watch::channel(false);
        let handle = tokio::spawn(drain_loop(Arc::clone(&self.inner), rx));
        *runner = Some(Runner { shutdown, handle });

        info!(
            publisher = %self.inner.publisher.name(),
            max_batch_size = self.inner.config.max_batch_size,
            flush_interval_ms = self.inner.config.flush_interval.as_millis() as u64,
            "Forwarder started"
        );
        Ok(())
    }

    /// Wake the drain loop (OnDataInQueue). Never blocks.
    pub fn process(&self) {
        self.inner.wake.notify_one();
    }

    /// Run one drain cycle on the caller's task.
    ///
    /// Safe to call concurrently with the loop and with itself; every
    /// queued item ends up in at most one batch.
    pub async fn process_once(&self) -> BatchReport {
        self.inner.process_once().await
    }

    /// Signal the loop, wait up to `timeout`, then abandon it
    #[instrument(name = "forwarder_stop", skip(self), fields(timeout_ms = timeout.as_millis() as u64))]
    pub async fn stop(&self, timeout: Duration) -> StopOutcome {
        let runner = lock(&self.inner.runner).take();
        let Some(Runner {
            shutdown,
            mut handle,
        }) = runner
        else {
            debug!("Forwarder stop requested but not running");
            return StopOutcome::NotRunning;
        };

        let _ = shutdown.send(true);
        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(joined) => joined_outcome(joined),
            Err(_) => {
                warn!("Forwarder did not stop within timeout, abandoning drain loop");
                handle.abort();
                if let Some(cycle) = lock(&self.inner.cycle).take() {
                    cycle.abort();
                }
                StopOutcome::Abandoned
            }
        }
    }

    pub fn is_running(&self) -> bool {
        lock(&self.inner.runner)
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }

    /// Receive a `BatchReport` for every non-empty cycle
    pub fn subscribe(&self) -> broadcast::Receiver<BatchReport> {
        self.inner.reports.subscribe()
    }

    pub fn metrics(&self) -> Arc<ForwarderMetrics> {
        Arc::clone(&self.inner.metrics)
    }

    pub fn publisher(&self) -> &Arc<P> {
        &self.inner.publisher
    }

    pub fn config(&self) -> &ForwarderConfig {
        &self.inner.config
    }
}

impl<P> Inner<P>
where
    P: MessagePublisher + Sync + 'static,
{
    async fn process_once(&self) -> BatchReport {
        let items = self.queue.drain(self.config.max_batch_size);
        if items.is_empty() {
            return BatchReport::empty();
        }
        let drained = items.len();

        let mut readings = Vec::with_capacity(drained);
        let mut rejected = 0;
        for item in &items {
            match self.transform.apply(item) {
                Ok(reading) => readings.push(reading),
                Err(e) => {
                    rejected += 1;
                    error!(
                        error = %e,
                        payload = item.as_str().unwrap_or("<binary>"),
                        "Dropping item that failed transform"
                    );
                }
            }
        }
        if rejected > 0 {
            self.metrics.record_rejected(rejected);
            record_items_rejected(rejected);
        }

        let report = if readings.is_empty() {
            BatchReport {
                batch_id: None,
                drained,
                published: 0,
                rejected,
                outcome: BatchOutcome::Empty,
            }
        } else {
            let id = self.next_batch_id.fetch_add(1, Ordering::Relaxed);
            self.publish(Batch::new(id, readings), drained, rejected)
                .await
        };

        let _ = self.reports.send(report.clone());
        report
    }

    #[instrument(
        name = "forwarder_publish",
        skip_all,
        fields(publisher = %self.publisher.name(), batch_id = batch.id, size = batch.len())
    )]
    async fn publish(&self, batch: Batch, drained: usize, rejected: usize) -> BatchReport {
        let name = self.publisher.name();
        let size = batch.len();
        let started = Instant::now();
        let result = self.publisher.send(&batch).await;
        record_publish_latency_ms(name, started.elapsed().as_secs_f64() * 1000.0);

        let outcome = match result {
            Ok(()) => {
                self.metrics.record_sent(size, rejected);
                record_batch_published(name, size, true);
                debug!(size, rejected, "Batch published");
                if rejected == 0 {
                    BatchOutcome::Sent
                } else {
                    BatchOutcome::PartiallySent { rejected }
                }
            }
            Err(e) => {
                self.metrics.record_failed(size);
                record_batch_published(name, size, false);
                error!(size, error = %e, "Batch publish failed, readings dropped");
                BatchOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };

        BatchReport {
            batch_id: Some(batch.id),
            drained,
            published: size,
            rejected,
            outcome,
        }
    }
}

async fn drain_loop<P>(inner: Arc<Inner<P>>, mut shutdown: watch::Receiver<bool>)
where
    P: MessagePublisher + Sync + 'static,
{
    let mut ticker = tokio::time::interval(inner.config.flush_interval.max(MIN_FLUSH_INTERVAL));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    debug!("Forwarder drain loop started");

    loop {
        tokio::select! {
            biased;
            _ = stopped(&mut shutdown) => break,
            _ = inner.wake.notified() => {}
            _ = ticker.tick() => {}
        }

        // a full batch means more is probably waiting
        while run_cycle(&inner)
            .await
            .is_some_and(|r| r.drained >= inner.config.max_batch_size)
        {
            if *shutdown.borrow() {
                break;
            }
        }
    }

    // flush what producers left behind before they were stopped
    while run_cycle(&inner).await.is_some_and(|r| r.drained > 0) {}
    debug!("Forwarder drain loop exited");
}

/// One cycle on its own task so a panic is contained
async fn run_cycle<P>(inner: &Arc<Inner<P>>) -> Option<BatchReport>
where
    P: MessagePublisher + Sync + 'static,
{
    let cycle = Arc::clone(inner);
    let handle = tokio::spawn(async move { cycle.process_once().await });
    *lock(&inner.cycle) = Some(handle.abort_handle());
    let joined = handle.await;
    lock(&inner.cycle).take();

    match joined {
        Ok(report) => Some(report),
        Err(e) => {
            inner.metrics.record_cycle_panic();
            error!(error = %e, "Forwarder cycle panicked");
            None
        }
    }
}

fn joined_outcome(joined: std::result::Result<(), JoinError>) -> StopOutcome {
    match joined {
        Ok(()) => {
            info!("Forwarder stopped");
            StopOutcome::Graceful
        }
        Err(e) => {
            error!(error = %e, "Forwarder loop ended abnormally");
            StopOutcome::Crashed
        }
    }
}

async fn stopped(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
