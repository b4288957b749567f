//! Order event log abstraction.
//!
//! The log delivers raw order payloads one at a time, in order per partition.
//! Consumers acknowledge a message with [`OrderLog::commit`] once its outcome
//! is durably published; anything not committed is redelivered after a
//! restart or rebalance (at-least-once).
//!
//! Payloads are returned undecoded so the consumer decides what a malformed
//! record means (it is logged, committed and skipped).

use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors from the order log.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderLogError {
    /// Could not create or connect the consumer
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Fetching the next message failed
    #[error("Read failed: {0}")]
    ReadFailed(String),

    /// Offset commit was rejected
    #[error("Commit failed for {topic}[{partition}]@{offset}: {reason}")]
    CommitFailed {
        /// Topic of the message
        topic: String,
        /// Partition of the message
        partition: i32,
        /// Offset of the message
        offset: i64,
        /// The reason for failure
        reason: String,
    },

    /// The log has no more messages and never will
    #[error("Order log closed")]
    Closed,
}

/// A record fetched from the order log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderMessage {
    /// Source topic
    pub topic: String,
    /// Source partition
    pub partition: i32,
    /// Offset within the partition
    pub offset: i64,
    /// Partition key, normally the product id
    pub key: Option<Vec<u8>>,
    /// Raw JSON payload, `None` for tombstones
    pub payload: Option<Vec<u8>>,
}

impl OrderMessage {
    /// `topic[partition]@offset`, for logs.
    #[must_use]
    pub fn position(&self) -> String {
        format!("{}[{}]@{}", self.topic, self.partition, self.offset)
    }
}

/// Source of order-created events.
///
/// Implementations hold one consumer-group membership. All methods are called
/// from a single consumer task, so they never race with each other.
pub trait OrderLog: Send + Sync {
    /// Wait for the next message.
    ///
    /// # Errors
    ///
    /// - [`OrderLogError::ReadFailed`] on broker/transport errors (retryable)
    /// - [`OrderLogError::Closed`] when the source is exhausted
    fn next_message(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<OrderMessage, OrderLogError>> + Send + '_>>;

    /// Mark `message` and everything before it on its partition as consumed.
    ///
    /// # Errors
    ///
    /// Returns [`OrderLogError::CommitFailed`] if the broker rejects the commit.
    fn commit(
        &self,
        message: &OrderMessage,
    ) -> Pin<Box<dyn Future<Output = Result<(), OrderLogError>> + Send + '_>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_is_readable() {
        let message = OrderMessage {
            topic: "orders".to_string(),
            partition: 2,
            offset: 17,
            key: None,
            payload: None,
        };
        assert_eq!(message.position(), "orders[2]@17");
    }
}
