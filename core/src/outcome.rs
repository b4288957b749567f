//! Outcome publishing abstraction.

use crate::events::{InventoryOutcomeEvent, OutcomeStatus};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors from publishing an outcome.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// The outcome could not be encoded
    #[error("Failed to serialize outcome: {0}")]
    Serialization(String),

    /// The broker rejected or never acknowledged the record
    #[error("Publish failed for topic '{topic}': {reason}")]
    PublishFailed {
        /// The topic that failed
        topic: String,
        /// The reason for failure
        reason: String,
    },

    /// No acknowledgement within the deadline
    #[error("Publish timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// Output topic names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeTopics {
    /// Topic for RESERVED outcomes
    pub reserved: String,
    /// Topic for FAILED outcomes
    pub failed: String,
}

impl Default for OutcomeTopics {
    fn default() -> Self {
        Self {
            reserved: "inventory-reserved".to_string(),
            failed: "inventory-failed".to_string(),
        }
    }
}

impl OutcomeTopics {
    /// Topic an outcome with `status` is routed to.
    #[must_use]
    pub fn topic_for(&self, status: OutcomeStatus) -> &str {
        match status {
            OutcomeStatus::Reserved => &self.reserved,
            OutcomeStatus::Failed => &self.failed,
        }
    }
}

/// Sink for reservation outcomes.
///
/// `publish` resolves only once the record is acknowledged by the broker.
/// The consumer commits its read offset on `Ok`, so an implementation must
/// never report success for a record it has not handed off durably.
pub trait OutcomePublisher: Send + Sync {
    /// Publish one outcome to the stream matching its status.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError`] if the record was not acknowledged.
    fn publish(
        &self,
        outcome: &InventoryOutcomeEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), PublishError>> + Send + '_>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_by_status() {
        let topics = OutcomeTopics::default();
        assert_eq!(topics.topic_for(OutcomeStatus::Reserved), "inventory-reserved");
        assert_eq!(topics.topic_for(OutcomeStatus::Failed), "inventory-failed");
    }
}
