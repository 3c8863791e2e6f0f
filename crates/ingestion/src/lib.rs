//! # Ingestion
//!
//! Adapters that turn external sources into gateway records.
//!
//! Responsibilities:
//! - Serial port, TCP socket and synthetic data adapters
//! - Record framing (newline / `<...>` delimited)
//! - Adapter lifecycle with self-healing background loops
//! - Factory table and group lifecycle via `AdapterRegistry`
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::AdapterRegistry;
//!
//! let mut registry = AdapterRegistry::with_builtin();
//! let report = registry.load(&config.adapters);
//! for failure in &report.failures {
//!     eprintln!("{}: {}", failure.adapter, failure.error);
//! }
//!
//! registry.start_all(service.enqueue_callback(), None);
//! // ...
//! registry.stop_all();
//! ```

mod adapter;
mod adapters;
mod error;
mod framing;
mod lifecycle;
mod metrics;
mod registry;

// Re-exports
pub use adapter::Adapter;
pub use adapters::{
    deliver_record, DevPortScanner, MockAdapter, MockConfig, PortScanner, ReadingGenerator,
    RecordOutcome, SerialAdapter, SerialConfig, SocketAdapter, SocketConfig, SocketMode,
};
pub use error::{FramingError, IngestionError, Result};
pub use framing::{FramingMode, RecordFramer, DEFAULT_MAX_RECORD_LEN};
pub use lifecycle::{Lifecycle, ShutdownToken, StateHandle};
pub use crate::metrics::{IngestionMetrics, MetricsSnapshot};
pub use registry::{AdapterFactory, AdapterRegistry, LoadFailure, LoadReport, StopFailure};
