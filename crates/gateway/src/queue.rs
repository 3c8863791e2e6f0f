//! BoundedQueue - the hand-off point between adapters and the forwarder
//!
//! Backed by an unbounded lock-free MPMC channel. The soft capacity only
//! warns; the optional hard capacity rejects pushes. Under concurrent
//! producers the hard limit is approximate by the number of racing pushes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_channel::{Receiver, Sender, TryRecvError};
use contracts::QueueSettings;
use tracing::{debug, warn};

use crate::error::{GatewayError, Result};

/// Thread-safe FIFO with non-blocking push and blocking/non-blocking pop.
///
/// Each item is claimed by exactly one `try_pop`/`drain` caller.
#[derive(Debug)]
pub struct BoundedQueue<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
    soft_capacity: usize,
    hard_capacity: Option<usize>,
    above_soft: AtomicBool,
}

impl<T> BoundedQueue<T> {
    /// Create a queue that warns at `soft_capacity` and never rejects
    pub fn new(soft_capacity: usize) -> Self {
        Self::with_limits(soft_capacity, None)
    }

    /// Create a queue with an optional hard admission limit
    pub fn with_limits(soft_capacity: usize, hard_capacity: Option<usize>) -> Self {
        let (tx, rx) = async_channel::unbounded();
        Self {
            tx,
            rx,
            soft_capacity: soft_capacity.max(1),
            hard_capacity,
            above_soft: AtomicBool::new(false),
        }
    }

    pub fn from_settings(settings: &QueueSettings) -> Self {
        Self::with_limits(settings.soft_capacity, settings.hard_capacity)
    }

    /// Append an item without blocking.
    ///
    /// Returns the depth after the push.
    ///
    /// # Errors
    /// `QueueFull` when the hard capacity is configured and reached.
    pub fn push(&self, item: T) -> Result<usize> {
        if let Some(capacity) = self.hard_capacity {
            let depth = self.rx.len();
            if depth >= capacity {
                return Err(GatewayError::QueueFull { depth, capacity });
            }
        }

        self.tx.try_send(item).map_err(|_| GatewayError::Closed)?;

        let depth = self.rx.len();
        if depth >= self.soft_capacity && !self.above_soft.swap(true, Ordering::Relaxed) {
            warn!(
                depth,
                soft_capacity = self.soft_capacity,
                "Queue crossed soft capacity, producers are outpacing the forwarder"
            );
        }
        Ok(depth)
    }

    /// Remove the oldest item, or `None` when empty
    pub fn try_pop(&self) -> Option<T> {
        match self.rx.try_recv() {
            Ok(item) => {
                self.rearm_soft_warning();
                Some(item)
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => None,
        }
    }

    /// Wait up to `timeout` for an item
    pub async fn pop_timeout(&self, timeout: Duration) -> Option<T> {
        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Ok(Ok(item)) => {
                self.rearm_soft_warning();
                Some(item)
            }
            Ok(Err(_)) | Err(_) => None,
        }
    }

    /// Claim up to `max` items in FIFO order
    pub fn drain(&self, max: usize) -> Vec<T> {
        let mut items = Vec::with_capacity(max.min(self.len()));
        while items.len() < max {
            match self.try_pop() {
                Some(item) => items.push(item),
                None => break,
            }
        }
        if !items.is_empty() {
            debug!(claimed = items.len(), remaining = self.len(), "Drained queue");
        }
        items
    }

    /// Point-in-time depth
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn soft_capacity(&self) -> usize {
        self.soft_capacity
    }

    pub fn hard_capacity(&self) -> Option<usize> {
        self.hard_capacity
    }

    fn rearm_soft_warning(&self) {
        if self.above_soft.load(Ordering::Relaxed) && self.rx.len() < self.soft_capacity {
            self.above_soft.store(false, Ordering::Relaxed);
        }
    }
}
