//! Adapter common utility functions

use std::time::Duration;

use bytes::Bytes;
use contracts::{AdapterConfig, EnqueueCallback};
use observability::{record_record_malformed, record_record_received};
use tracing::{trace, warn};

use crate::error::{FramingError, IngestionError, Result};
use crate::metrics::IngestionMetrics;

/// What happened to one framed record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Enqueued { depth: usize },
    /// Refused by queue admission control
    Rejected,
    /// Dropped by framing
    Malformed,
}

/// `<key>` in milliseconds; zero is rejected since it drives a timer
pub(crate) fn timer_period(cfg: &AdapterConfig, key: &str, default_ms: u64) -> Result<Duration> {
    let period = cfg
        .duration_ms(key, default_ms)
        .map_err(|e| IngestionError::invalid_config(&cfg.name, e.to_string()))?;
    if period.is_zero() {
        return Err(IngestionError::invalid_config(
            &cfg.name,
            format!("{key} must be greater than 0"),
        ));
    }
    Ok(period)
}

/// Hand one framed record to the shared ingestion path
pub fn deliver_record(
    adapter: &str,
    record: std::result::Result<Bytes, FramingError>,
    enqueue: &EnqueueCallback,
    metrics: &IngestionMetrics,
) -> RecordOutcome {
    match record {
        Ok(raw) => {
            metrics.record_received();
            record_record_received(adapter);
            match enqueue(raw) {
                Ok(depth) => {
                    trace!(adapter = %adapter, depth, "record enqueued");
                    RecordOutcome::Enqueued { depth }
                }
                Err(e) => {
                    metrics.record_rejected();
                    warn!(adapter = %adapter, error = %e, "record rejected by gateway");
                    RecordOutcome::Rejected
                }
            }
        }
        Err(e) => {
            metrics.record_malformed();
            record_record_malformed(adapter);
            warn!(adapter = %adapter, error = %e, "dropping malformed record");
            RecordOutcome::Malformed
        }
    }
}
