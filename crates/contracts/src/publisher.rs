//! MessagePublisher trait - forwarder output interface
//!
//! The broker wire protocol lives behind this trait.

use crate::{Batch, ContractError};

/// "Send one batch" capability backed by a broker client.
///
/// Must be safely callable repeatedly and from concurrent drain cycles.
/// Success or failure is reported per call, not per reading.
#[trait_variant::make(MessagePublisher: Send)]
pub trait LocalMessagePublisher {
    /// Publisher name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Publish one batch
    ///
    /// # Errors
    /// Returns a publish error; the caller does not retry.
    async fn send(&self, batch: &Batch) -> Result<(), ContractError>;

    /// Release the client handle. Called once, after the forwarder stopped.
    async fn close(&self) -> Result<(), ContractError>;
}
