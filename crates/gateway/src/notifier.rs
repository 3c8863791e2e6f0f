//! OnDataInQueue notifications
//!
//! `notify` pushes into a bounded channel with `try_send`; a single task
//! drains it and calls every registered observer. A full channel drops the
//! notification rather than blocking the producer.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use contracts::QueuedItem;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Observer called for every item that entered the queue
pub type QueueObserver = Arc<dyn Fn(&QueuedItem) + Send + Sync>;

/// Default notification channel depth
pub const DEFAULT_NOTIFY_CAPACITY: usize = 1024;

/// Fan-out of queue notifications to observers on a dedicated task
pub struct QueueNotifier {
    tx: mpsc::Sender<QueuedItem>,
    dropped: Arc<AtomicU64>,
    observer_panics: Arc<AtomicU64>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl QueueNotifier {
    /// Spawn the delivery task. Must be called within a Tokio runtime.
    pub fn spawn(observers: Vec<QueueObserver>, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<QueuedItem>(capacity.max(1));
        let observer_panics = Arc::new(AtomicU64::new(0));
        let panics = Arc::clone(&observer_panics);

        let task = tokio::spawn(async move {
            while let Some(item) = rx.recv().await {
                for (idx, observer) in observers.iter().enumerate() {
                    if catch_unwind(AssertUnwindSafe(|| observer(&item))).is_err() {
                        panics.fetch_add(1, Ordering::Relaxed);
                        error!(observer = idx, "Queue observer panicked");
                    }
                }
            }
            debug!("Queue notifier finished");
        });

        Self {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
            observer_panics,
            task: Mutex::new(Some(task)),
        }
    }

    /// Fire-and-forget
    pub fn notify(&self, item: &QueuedItem) {
        if self.tx.try_send(item.clone()).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Notifications lost to a full or closed channel
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn observer_panics(&self) -> u64 {
        self.observer_panics.load(Ordering::Relaxed)
    }

    /// Stop delivering. Pending notifications are discarded.
    pub fn shutdown(&self) {
        let task = self
            .task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(task) = task {
            task.abort();
            debug!("Queue notifier stopped");
        }
    }
}

impl Drop for QueueNotifier {
    fn drop(&mut self) {
        self.shutdown();
    }
}
