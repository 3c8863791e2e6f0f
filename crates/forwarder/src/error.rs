//! Forwarder error types

use thiserror::Error;

/// Forwarder-specific errors
#[derive(Debug, Error)]
pub enum ForwarderError {
    /// Publisher creation error
    #[error("failed to create publisher '{name}': {message}")]
    PublisherCreation { name: String, message: String },

    /// `start` called while the drain loop is running
    #[error("forwarder is already running")]
    AlreadyRunning,

    /// `start` called outside a Tokio runtime
    #[error("forwarder must be started inside a Tokio runtime")]
    NoRuntime,

    /// Publisher error (from contract)
    #[error("publisher error: {0}")]
    Contract(#[from] contracts::ContractError),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ForwarderError {
    /// Create a publisher creation error
    pub fn publisher_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PublisherCreation {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Why a queued item could not become a `SensorReading`
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("payload is not a valid reading: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("reading value is not finite")]
    NonFiniteValue,
}

/// Forwarder Result type alias
pub type Result<T> = std::result::Result<T, ForwarderError>;
