//! Gateway error types

use contracts::ContractError;
use thiserror::Error;

/// Gateway errors
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Hard capacity reached; the item was not pushed
    #[error("queue full: depth={depth}, capacity={capacity}")]
    QueueFull { depth: usize, capacity: usize },

    /// Queue was closed
    #[error("queue closed")]
    Closed,
}

impl From<GatewayError> for ContractError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::QueueFull { depth, capacity } => {
                ContractError::QueueFull { depth, capacity }
            }
            GatewayError::Closed => ContractError::Other("queue closed".into()),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, GatewayError>;
