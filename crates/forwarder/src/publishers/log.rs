//! LogPublisher - logs batch summaries via tracing

use contracts::{Batch, ContractError, MessagePublisher};
use tracing::{debug, info, instrument};

/// Publisher that only logs; for dry runs and debugging
pub struct LogPublisher {
    name: String,
}

impl LogPublisher {
    /// Create a new LogPublisher with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl MessagePublisher for LogPublisher {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_publisher_send",
        skip(self, batch),
        fields(publisher = %self.name, batch_id = batch.id)
    )]
    async fn send(&self, batch: &Batch) -> Result<(), ContractError> {
        info!(
            publisher = %self.name,
            batch_id = batch.id,
            readings = batch.len(),
            "Batch received"
        );
        for reading in &batch.readings {
            debug!(
                guid = %reading.guid,
                measure = %reading.measure_name,
                value = reading.value,
                unit = %reading.unit_of_measure,
                "Reading"
            );
        }
        Ok(())
    }

    #[instrument(name = "log_publisher_close", skip(self))]
    async fn close(&self) -> Result<(), ContractError> {
        info!(publisher = %self.name, "LogPublisher closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_publisher_send() {
        let publisher = LogPublisher::new("my_logger");
        assert_eq!(publisher.name(), "my_logger");
        assert!(publisher.send(&Batch::new(1, Vec::new())).await.is_ok());
        assert!(publisher.close().await.is_ok());
    }
}
