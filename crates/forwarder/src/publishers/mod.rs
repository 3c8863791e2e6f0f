//! Publisher implementations
//!
//! Contains LogPublisher, FilePublisher, NetworkPublisher and the
//! `AnyPublisher` enum built from configuration.

mod file;
mod log;
mod network;

use contracts::{Batch, ContractError, MessagePublisher, PublisherConfig, PublisherType};
use tracing::{info, instrument};

pub use self::file::{FilePublisher, FilePublisherConfig};
pub use self::log::LogPublisher;
pub use self::network::{NetworkFormat, NetworkPublisher, NetworkPublisherConfig};

use crate::error::{ForwarderError, Result};

/// Publisher selected at runtime from `PublisherConfig`
pub enum AnyPublisher {
    Log(LogPublisher),
    File(FilePublisher),
    Network(NetworkPublisher),
}

impl MessagePublisher for AnyPublisher {
    fn name(&self) -> &str {
        match self {
            Self::Log(p) => p.name(),
            Self::File(p) => p.name(),
            Self::Network(p) => p.name(),
        }
    }

    async fn send(&self, batch: &Batch) -> std::result::Result<(), ContractError> {
        match self {
            Self::Log(p) => p.send(batch).await,
            Self::File(p) => p.send(batch).await,
            Self::Network(p) => p.send(batch).await,
        }
    }

    async fn close(&self) -> std::result::Result<(), ContractError> {
        match self {
            Self::Log(p) => p.close().await,
            Self::File(p) => p.close().await,
            Self::Network(p) => p.close().await,
        }
    }
}

/// Build the configured publisher
#[instrument(
    name = "forwarder_create_publisher",
    skip(config),
    fields(publisher = %config.name, publisher_type = ?config.publisher_type)
)]
pub async fn create_publisher(config: &PublisherConfig) -> Result<AnyPublisher> {
    let publisher = match config.publisher_type {
        PublisherType::Log => AnyPublisher::Log(LogPublisher::new(&config.name)),
        PublisherType::File => AnyPublisher::File(
            FilePublisher::from_params(&config.name, &config.params)
                .await
                .map_err(|e| ForwarderError::publisher_creation(&config.name, e.to_string()))?,
        ),
        PublisherType::Network => AnyPublisher::Network(
            NetworkPublisher::from_params(&config.name, &config.params)
                .await
                .map_err(|e| ForwarderError::publisher_creation(&config.name, e.to_string()))?,
        ),
    };
    info!(publisher = %config.name, "Publisher created");
    Ok(publisher)
}
