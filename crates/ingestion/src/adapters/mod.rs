//! Built-in adapter implementations

mod common;
mod mock;
mod serial;
mod socket;

pub use common::{deliver_record, RecordOutcome};
pub use mock::{MockAdapter, MockConfig, ReadingGenerator};
pub use serial::{DevPortScanner, PortScanner, SerialAdapter, SerialConfig};
pub use socket::{SocketAdapter, SocketConfig, SocketMode};
