//! Per-cycle batch notifications

use std::fmt;

/// How one drain cycle ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    /// Every drained item was published
    Sent,
    /// Published, but `rejected` items failed transform
    PartiallySent { rejected: usize },
    /// The publisher refused the batch; its readings are dropped
    Failed { error: String },
    /// Nothing to publish (queue empty, or every item rejected)
    Empty,
}

impl BatchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Sent | Self::PartiallySent { .. })
    }
}

/// Record of one drain cycle, broadcast to subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    /// `None` when nothing was published
    pub batch_id: Option<u64>,
    /// Items claimed from the queue
    pub drained: usize,
    /// Readings handed to the publisher
    pub published: usize,
    /// Items dropped by transform
    pub rejected: usize,
    pub outcome: BatchOutcome,
}

impl BatchReport {
    pub fn empty() -> Self {
        Self {
            batch_id: None,
            drained: 0,
            published: 0,
            rejected: 0,
            outcome: BatchOutcome::Empty,
        }
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            BatchOutcome::Sent => write!(f, "sent {} readings", self.published),
            BatchOutcome::PartiallySent { rejected } => write!(
                f,
                "sent {} readings, {} rejected",
                self.published, rejected
            ),
            BatchOutcome::Failed { error } => {
                write!(f, "failed to send {} readings: {}", self.published, error)
            }
            BatchOutcome::Empty if self.rejected > 0 => {
                write!(f, "all {} drained items rejected", self.rejected)
            }
            BatchOutcome::Empty => f.write_str("empty"),
        }
    }
}
