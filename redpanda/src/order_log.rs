//! Kafka consumer for the `orders` topic.

use inventory_core::{OrderLog, OrderLogError, OrderMessage};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::{Offset, TopicPartitionList};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

/// Consumer-group member reading order-created events.
///
/// Auto-commit is disabled: [`OrderLog::commit`] is the only way offsets
/// advance.
pub struct RedpandaOrderLog {
    consumer: Arc<StreamConsumer>,
    topic: String,
    consumer_group: String,
}

impl RedpandaOrderLog {
    /// Create a builder for configuring the order log.
    #[must_use]
    pub fn builder() -> RedpandaOrderLogBuilder {
        RedpandaOrderLogBuilder::default()
    }

    /// Subscribed topic.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Consumer group id.
    #[must_use]
    pub fn consumer_group(&self) -> &str {
        &self.consumer_group
    }

    /// Verify a broker answers a metadata request for the subscribed topic.
    ///
    /// Used at startup so an unreachable broker is a fatal error rather than
    /// an endless stream of read retries.
    ///
    /// # Errors
    ///
    /// Returns [`OrderLogError::ConnectionFailed`] if no broker answers within
    /// `timeout`.
    pub async fn check_connection(&self, timeout: Duration) -> Result<(), OrderLogError> {
        let consumer = Arc::clone(&self.consumer);
        let topic = self.topic.clone();

        let brokers = tokio::task::spawn_blocking(move || {
            consumer
                .fetch_metadata(Some(topic.as_str()), timeout)
                .map(|metadata| metadata.brokers().len())
        })
        .await
        .map_err(|e| OrderLogError::ConnectionFailed(format!("Metadata probe panicked: {e}")))?
        .map_err(|e| OrderLogError::ConnectionFailed(format!("Broker unreachable: {e}")))?;

        tracing::info!(topic = %self.topic, brokers, "Order log connected");
        Ok(())
    }
}

impl OrderLog for RedpandaOrderLog {
    fn next_message(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<OrderMessage, OrderLogError>> + Send + '_>> {
        Box::pin(async move {
            let message = self
                .consumer
                .recv()
                .await
                .map_err(|e| OrderLogError::ReadFailed(e.to_string()))?;

            tracing::trace!(
                topic = message.topic(),
                partition = message.partition(),
                offset = message.offset(),
                "Order message received"
            );

            Ok(OrderMessage {
                topic: message.topic().to_string(),
                partition: message.partition(),
                offset: message.offset(),
                key: message.key().map(<[u8]>::to_vec),
                payload: message.payload().map(<[u8]>::to_vec),
            })
        })
    }

    /// Commit synchronously so a broker-side rejection (for example after a
    /// rebalance took the partition away) surfaces as
    /// [`OrderLogError::CommitFailed`].
    fn commit(
        &self,
        message: &OrderMessage,
    ) -> Pin<Box<dyn Future<Output = Result<(), OrderLogError>> + Send + '_>> {
        let consumer = Arc::clone(&self.consumer);
        let topic = message.topic.clone();
        let partition = message.partition;
        let offset = message.offset;

        Box::pin(async move {
            let commit_failed = |reason: String| OrderLogError::CommitFailed {
                topic: topic.clone(),
                partition,
                offset,
                reason,
            };

            // Kafka commits the offset of the next message to read.
            let mut offsets = TopicPartitionList::new();
            offsets
                .add_partition_offset(&topic, partition, Offset::Offset(offset + 1))
                .map_err(|e| commit_failed(e.to_string()))?;

            tokio::task::spawn_blocking(move || consumer.commit(&offsets, CommitMode::Sync))
                .await
                .map_err(|e| commit_failed(format!("Commit task panicked: {e}")))?
                .map_err(|e| commit_failed(e.to_string()))
        })
    }
}

/// Builder for [`RedpandaOrderLog`].
#[derive(Default)]
pub struct RedpandaOrderLogBuilder {
    brokers: Option<String>,
    consumer_group: Option<String>,
    topic: Option<String>,
    auto_offset_reset: Option<String>,
    session_timeout: Option<Duration>,
}

impl RedpandaOrderLogBuilder {
    /// Set broker addresses (comma-separated). Required.
    #[must_use]
    pub fn brokers(mut self, brokers: impl Into<String>) -> Self {
        self.brokers = Some(brokers.into());
        self
    }

    /// Set the consumer group (default: `inventory-service-group`).
    ///
    /// All replicas of the service share one group so each partition is
    /// processed by exactly one of them.
    #[must_use]
    pub fn consumer_group(mut self, consumer_group: impl Into<String>) -> Self {
        self.consumer_group = Some(consumer_group.into());
        self
    }

    /// Set the topic to consume (default: `orders`).
    #[must_use]
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Where a new consumer group starts reading (default: `earliest`).
    ///
    /// - `"earliest"`: from the beginning of the topic
    /// - `"latest"`: only messages produced after the group joins
    #[must_use]
    pub fn auto_offset_reset(mut self, policy: impl Into<String>) -> Self {
        self.auto_offset_reset = Some(policy.into());
        self
    }

    /// Group session timeout (default: 6s).
    #[must_use]
    pub fn session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = Some(timeout);
        self
    }

    /// Create the consumer and subscribe to the topic.
    ///
    /// This does not contact the broker; see
    /// [`RedpandaOrderLog::check_connection`].
    ///
    /// # Errors
    ///
    /// Returns [`OrderLogError::ConnectionFailed`] if brokers are not set or
    /// the consumer configuration is rejected.
    pub fn build(self) -> Result<RedpandaOrderLog, OrderLogError> {
        let brokers = self
            .brokers
            .ok_or_else(|| OrderLogError::ConnectionFailed("Brokers not configured".to_string()))?;
        let consumer_group = self
            .consumer_group
            .unwrap_or_else(|| "inventory-service-group".to_string());
        let topic = self.topic.unwrap_or_else(|| "orders".to_string());
        let auto_offset_reset = self
            .auto_offset_reset
            .unwrap_or_else(|| "earliest".to_string());
        let session_timeout = self.session_timeout.unwrap_or(Duration::from_secs(6));

        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &brokers)
            .set("group.id", &consumer_group)
            .set("enable.auto.commit", "false") // Manual commit for at-least-once
            .set("auto.offset.reset", &auto_offset_reset)
            .set("session.timeout.ms", session_timeout.as_millis().to_string())
            .set("enable.partition.eof", "false")
            .create()
            .map_err(|e| {
                OrderLogError::ConnectionFailed(format!("Failed to create consumer: {e}"))
            })?;

        consumer.subscribe(&[topic.as_str()]).map_err(|e| {
            OrderLogError::ConnectionFailed(format!("Failed to subscribe to '{topic}': {e}"))
        })?;

        tracing::info!(
            brokers = %brokers,
            consumer_group = %consumer_group,
            topic = %topic,
            auto_offset_reset = %auto_offset_reset,
            manual_commit = true,
            "RedpandaOrderLog created"
        );

        Ok(RedpandaOrderLog {
            consumer: Arc::new(consumer),
            topic,
            consumer_group,
        })
    }
}
