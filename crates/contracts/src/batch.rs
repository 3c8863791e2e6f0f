//! Batch - readings drained and published together in one cycle

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::SensorReading;

/// Ordered, bounded list of readings drained in one forwarder cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    /// Monotonic per forwarder
    pub id: u64,
    pub created_at: DateTime<Utc>,
    pub readings: Vec<SensorReading>,
}

impl Batch {
    pub fn new(id: u64, readings: Vec<SensorReading>) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            readings,
        }
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}
