//! Raw item -> `SensorReading`

use chrono::Utc;
use contracts::{QueuedItem, SensorReading};

use crate::error::TransformError;

const UNKNOWN_LOCATION: &str = "Unknown";

/// Per-item transform applied before publishing.
///
/// - decodes the JSON payload
/// - stamps `time_created` when the device did not
/// - appends the gateway location when one is configured
#[derive(Debug, Clone, Default)]
pub struct Transform {
    gateway_location: Option<String>,
}

impl Transform {
    pub fn new(gateway_location: Option<String>) -> Self {
        Self {
            gateway_location: gateway_location.filter(|l| !l.trim().is_empty()),
        }
    }

    pub fn apply(&self, item: &QueuedItem) -> Result<SensorReading, TransformError> {
        let mut reading: SensorReading = serde_json::from_slice(item.payload())?;
        if !reading.value.is_finite() {
            return Err(TransformError::NonFiniteValue);
        }

        reading.time_created.get_or_insert_with(Utc::now);

        if let Some(gateway) = &self.gateway_location {
            let device = if reading.location.is_empty() {
                UNKNOWN_LOCATION
            } else {
                reading.location.as_str()
            };
            reading.location = format!("{device}\n{gateway}");
        }
        Ok(reading)
    }
}
