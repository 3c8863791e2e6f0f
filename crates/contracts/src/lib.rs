//! # Contracts
//!
//! Frozen interface contracts shared by every gateway crate: queued items,
//! decoded readings, batches, adapter lifecycle types, the publisher trait
//! and the configuration tree.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Wall-clock UTC (`chrono::DateTime<Utc>`) everywhere
//! - `enqueued_at` is stamped on ingestion, `time_created` on the device or by the forwarder

mod adapter;
mod batch;
mod config;
mod error;
mod item;
mod publisher;
mod reading;

pub use adapter::*;
pub use batch::Batch;
pub use config::*;
pub use error::*;
pub use item::QueuedItem;
pub use publisher::{LocalMessagePublisher, MessagePublisher};
pub use reading::SensorReading;
