//! # Gateway
//!
//! Producer-side core of the telemetry gateway.
//!
//! - [`BoundedQueue`]: lock-free MPMC FIFO shared by adapters and the forwarder
//! - [`ThroughputCounter`]: atomic event counting with one report per window
//! - [`QueueNotifier`]: OnDataInQueue fan-out on a dedicated task
//! - [`GatewayService`]: `enqueue(raw) -> depth` façade tying them together
//!
//! ```ignore
//! let queue = Arc::new(BoundedQueue::new(10_000));
//! let service = Arc::new(GatewayService::new(Arc::clone(&queue)));
//! let depth = service.enqueue(r#"{"Value":1,"GUID":"a"}"#)?;
//! ```

mod error;
mod notifier;
mod queue;
mod service;
mod throughput;

pub use error::{GatewayError, Result};
pub use notifier::{QueueNotifier, QueueObserver, DEFAULT_NOTIFY_CAPACITY};
pub use queue::BoundedQueue;
pub use service::{GatewayService, ServiceStats};
pub use throughput::{ThroughputCounter, ThroughputReport, DEFAULT_THRESHOLD};
