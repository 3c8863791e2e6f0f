//! QueuedItem - the unit handed from adapters to the queue

use bytes::Bytes;
use chrono::{DateTime, Utc};

/// Raw payload plus the moment it entered the gateway.
///
/// Immutable once created. Ownership moves from the queue to the
/// forwarder on pop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedItem {
    payload: Bytes,
    enqueued_at: DateTime<Utc>,
}

impl QueuedItem {
    /// Wrap a raw payload, stamping it with the current time
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
            enqueued_at: Utc::now(),
        }
    }

    /// Wrap a raw payload with an explicit timestamp
    pub fn with_timestamp(payload: impl Into<Bytes>, enqueued_at: DateTime<Utc>) -> Self {
        Self {
            payload: payload.into(),
            enqueued_at,
        }
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn enqueued_at(&self) -> DateTime<Utc> {
        self.enqueued_at
    }

    /// Payload as UTF-8, if valid
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }

    pub fn into_payload(self) -> Bytes {
        self.payload
    }
}
