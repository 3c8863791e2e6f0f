//! Adapter-facing contracts: lifecycle state, endpoints and callbacks

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::ContractError;

/// Adapter lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum AdapterState {
    Stopped = 0,
    Starting = 1,
    Running = 2,
    Stopping = 3,
    /// Backing resource lost; may self-heal
    Failed = 4,
}

impl AdapterState {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Starting,
            2 => Self::Running,
            3 => Self::Stopping,
            4 => Self::Failed,
            _ => Self::Stopped,
        }
    }

    /// Whether a stop request has anything to do
    pub fn is_active(self) -> bool {
        matches!(self, Self::Starting | Self::Running | Self::Failed)
    }
}

impl fmt::Display for AdapterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Where an adapter reads from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Endpoint {
    /// TCP host/port
    Tcp { host: String, port: u16 },
    /// Local device node, e.g. `/dev/ttyUSB0`
    Device { path: String },
}

impl Endpoint {
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::Tcp {
            host: host.into(),
            port,
        }
    }

    pub fn device(path: impl Into<String>) -> Self {
        Self::Device { path: path.into() }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp { host, port } => write!(f, "{host}:{port}"),
            Self::Device { path } => f.write_str(path),
        }
    }
}

/// Shared ingestion path handed to every adapter.
///
/// Returns the queue depth after the push, or an admission error.
pub type EnqueueCallback = Arc<dyn Fn(Bytes) -> Result<usize, ContractError> + Send + Sync>;

/// Observer invoked with each raw record before it is enqueued
pub type DataArrivalObserver = Arc<dyn Fn(&Bytes) + Send + Sync>;
