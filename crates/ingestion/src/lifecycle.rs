//! Adapter lifecycle bookkeeping
//!
//! `Lifecycle` is owned by the adapter; `StateHandle` and `ShutdownToken`
//! are cloned into its background tasks.

use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use contracts::AdapterState;
use observability::record_adapter_state;
use tokio::sync::watch;
use tracing::{debug, error};

use crate::error::{IngestionError, Result};

/// Start/stop state machine of one adapter
#[derive(Debug)]
pub struct Lifecycle {
    handle: StateHandle,
    shutdown: Mutex<Option<watch::Sender<bool>>>,
}

impl Lifecycle {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            handle: StateHandle {
                name: name.into(),
                state: Arc::new(AtomicU8::new(AdapterState::Stopped.as_u8())),
            },
            shutdown: Mutex::new(None),
        }
    }

    pub fn state(&self) -> AdapterState {
        self.handle.get()
    }

    pub fn handle(&self) -> StateHandle {
        self.handle.clone()
    }

    /// Stopped/Failed -> Starting; returns the token the tasks watch.
    ///
    /// Fails outside a Tokio runtime or when already active.
    pub fn begin(&self) -> Result<ShutdownToken> {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(IngestionError::NoRuntime {
                adapter: self.handle.name.to_string(),
            });
        }

        let starting = AdapterState::Starting.as_u8();
        self.handle
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
                match AdapterState::from_u8(raw) {
                    AdapterState::Stopped | AdapterState::Failed => Some(starting),
                    _ => None,
                }
            })
            .map_err(|_| IngestionError::AlreadyRunning {
                adapter: self.handle.name.to_string(),
            })?;
        self.handle.report(AdapterState::Starting);

        let (tx, rx) = watch::channel(false);
        *self
            .shutdown
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(tx);
        Ok(ShutdownToken(rx))
    }

    /// Signal tasks and move to Stopped. Returns false when there was nothing to stop.
    pub fn end(&self) -> bool {
        let stopping = AdapterState::Stopping.as_u8();
        let claimed = self
            .handle
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
                AdapterState::from_u8(raw).is_active().then_some(stopping)
            })
            .is_ok();
        if !claimed {
            return false;
        }
        self.handle.report(AdapterState::Stopping);

        let tx = self
            .shutdown
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(tx) = tx {
            let _ = tx.send(true);
        }

        self.handle
            .state
            .store(AdapterState::Stopped.as_u8(), Ordering::Release);
        self.handle.report(AdapterState::Stopped);
        true
    }
}

/// Cloneable view used by background tasks to publish state changes
#[derive(Debug, Clone)]
pub struct StateHandle {
    name: Arc<str>,
    state: Arc<AtomicU8>,
}

impl StateHandle {
    pub fn get(&self) -> AdapterState {
        AdapterState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Move to `next` unless a stop is in progress or done
    pub fn set(&self, next: AdapterState) -> bool {
        let mut changed = false;
        let updated = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
                match AdapterState::from_u8(raw) {
                    AdapterState::Stopping | AdapterState::Stopped => None,
                    current => {
                        changed = current != next;
                        Some(next.as_u8())
                    }
                }
            })
            .is_ok();
        if updated && changed {
            self.report(next);
        }
        updated
    }

    /// Spawn a background task; if it panics the adapter moves to Failed
    pub fn spawn_supervised<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(task);
        let state = self.clone();
        tokio::spawn(async move {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    error!(adapter = %state.name, error = %e, "adapter task panicked");
                    state.set(AdapterState::Failed);
                }
            }
        });
    }

    fn report(&self, state: AdapterState) {
        debug!(adapter = %self.name, state = %state, "Adapter state changed");
        record_adapter_state(&self.name, state);
    }
}

/// Resolves once the owning adapter is stopped
#[derive(Debug, Clone)]
pub struct ShutdownToken(watch::Receiver<bool>);

impl ShutdownToken {
    pub fn is_shutdown(&self) -> bool {
        *self.0.borrow()
    }

    /// Wait for the stop signal. A dropped sender counts as stopped.
    pub async fn wait(&mut self) {
        let _ = self.0.wait_for(|stopped| *stopped).await;
    }
}
