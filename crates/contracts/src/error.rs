//! Layered error definitions
//!
//! Categorized by source: config / queue / publish

use thiserror::Error;

/// Unified error type shared across gateway crates
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Queue Errors =====
    /// Admission control rejected an item
    #[error("queue full: depth={depth}, capacity={capacity}")]
    QueueFull { depth: usize, capacity: usize },

    // ===== Publish Errors =====
    /// Publisher failed to send a batch
    #[error("publisher '{publisher}' send error: {message}")]
    Publish { publisher: String, message: String },

    /// Publisher connection could not be established or was lost
    #[error("publisher '{publisher}' connection error: {message}")]
    PublisherConnection { publisher: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create publish error
    pub fn publish(publisher: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Publish {
            publisher: publisher.into(),
            message: message.into(),
        }
    }

    /// Create publisher connection error
    pub fn publisher_connection(publisher: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PublisherConnection {
            publisher: publisher.into(),
            message: message.into(),
        }
    }

    /// Whether the error came from queue admission control
    pub fn is_queue_full(&self) -> bool {
        matches!(self, Self::QueueFull { .. })
    }
}
