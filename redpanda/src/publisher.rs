//! Kafka producer for reservation outcomes.

use inventory_core::{InventoryOutcomeEvent, OutcomePublisher, OutcomeTopics, PublishError};
use rdkafka::config::ClientConfig;
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Publishes outcomes to the reserved and failed topics.
///
/// `publish` resolves once the broker acknowledges the record with the
/// configured `acks` level, or fails.
pub struct RedpandaOutcomePublisher {
    producer: FutureProducer,
    topics: OutcomeTopics,
    timeout: Duration,
}

impl RedpandaOutcomePublisher {
    /// Create a builder for configuring the publisher.
    #[must_use]
    pub fn builder() -> RedpandaOutcomePublisherBuilder {
        RedpandaOutcomePublisherBuilder::default()
    }

    /// Output topic names.
    #[must_use]
    pub const fn topics(&self) -> &OutcomeTopics {
        &self.topics
    }

    /// Verify a broker answers a metadata request.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::PublishFailed`] if no broker answers within
    /// `timeout`.
    pub async fn check_connection(&self, timeout: Duration) -> Result<(), PublishError> {
        let producer = self.producer.clone();
        let topic = self.topics.reserved.clone();

        let brokers = tokio::task::spawn_blocking(move || {
            producer
                .client()
                .fetch_metadata(None, timeout)
                .map(|metadata| metadata.brokers().len())
        })
        .await
        .map_err(|e| PublishError::PublishFailed {
            topic: topic.clone(),
            reason: format!("Metadata probe panicked: {e}"),
        })?
        .map_err(|e| PublishError::PublishFailed {
            topic,
            reason: format!("Broker unreachable: {e}"),
        })?;

        tracing::info!(brokers, "Outcome publisher connected");
        Ok(())
    }

    /// Wait for in-flight records to be delivered.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::Timeout`] if records are still queued after
    /// `timeout`.
    pub fn flush(&self, timeout: Duration) -> Result<(), PublishError> {
        self.producer
            .flush(Timeout::After(timeout))
            .map_err(|_| PublishError::Timeout(timeout))
    }
}

impl OutcomePublisher for RedpandaOutcomePublisher {
    fn publish(
        &self,
        outcome: &InventoryOutcomeEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), PublishError>> + Send + '_>> {
        let outcome = outcome.clone();
        let topic = self.topics.topic_for(outcome.status).to_string();
        let timeout = self.timeout;

        Box::pin(async move {
            let payload = outcome
                .to_json()
                .map_err(|e| PublishError::Serialization(e.to_string()))?;

            // Outcomes for one order always land on one partition
            let key = outcome.order_id.to_string();

            let record = FutureRecord::to(&topic).payload(&payload).key(&key);

            match self.producer.send(record, Timeout::After(timeout)).await {
                Ok((partition, offset)) => {
                    tracing::debug!(
                        topic = %topic,
                        partition,
                        offset,
                        order_id = %outcome.order_id,
                        status = %outcome.status,
                        "Outcome published"
                    );
                    Ok(())
                }
                Err((kafka_error, _)) => {
                    tracing::error!(
                        topic = %topic,
                        order_id = %outcome.order_id,
                        error = %kafka_error,
                        "Failed to publish outcome"
                    );
                    Err(classify_send_error(&topic, &kafka_error, timeout))
                }
            }
        })
    }
}

fn classify_send_error(topic: &str, error: &KafkaError, timeout: Duration) -> PublishError {
    match error {
        KafkaError::MessageProduction(RDKafkaErrorCode::MessageTimedOut) => {
            PublishError::Timeout(timeout)
        }
        other => PublishError::PublishFailed {
            topic: topic.to_string(),
            reason: other.to_string(),
        },
    }
}

/// Builder for [`RedpandaOutcomePublisher`].
#[derive(Default)]
pub struct RedpandaOutcomePublisherBuilder {
    brokers: Option<String>,
    producer_acks: Option<String>,
    compression: Option<String>,
    timeout: Option<Duration>,
    topics: Option<OutcomeTopics>,
}

impl RedpandaOutcomePublisherBuilder {
    /// Set broker addresses (comma-separated). Required.
    #[must_use]
    pub fn brokers(mut self, brokers: impl Into<String>) -> Self {
        self.brokers = Some(brokers.into());
        self
    }

    /// Set producer acknowledgment mode (default: `all`).
    ///
    /// - `"0"`: no acknowledgment
    /// - `"1"`: leader only
    /// - `"all"`: all in-sync replicas
    #[must_use]
    pub fn producer_acks(mut self, acks: impl Into<String>) -> Self {
        self.producer_acks = Some(acks.into());
        self
    }

    /// Set compression type (default: `none`).
    #[must_use]
    pub fn compression(mut self, compression: impl Into<String>) -> Self {
        self.compression = Some(compression.into());
        self
    }

    /// Set the delivery timeout for one record (default: 5s).
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set output topics (default: `inventory-reserved` / `inventory-failed`).
    #[must_use]
    pub fn topics(mut self, topics: OutcomeTopics) -> Self {
        self.topics = Some(topics);
        self
    }

    /// Create the producer.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::PublishFailed`] if brokers are not set or the
    /// producer configuration is rejected.
    pub fn build(self) -> Result<RedpandaOutcomePublisher, PublishError> {
        let topics = self.topics.unwrap_or_default();
        let brokers = self.brokers.ok_or_else(|| PublishError::PublishFailed {
            topic: topics.reserved.clone(),
            reason: "Brokers not configured".to_string(),
        })?;
        let acks = self.producer_acks.unwrap_or_else(|| "all".to_string());
        let compression = self.compression.unwrap_or_else(|| "none".to_string());
        let timeout = self.timeout.unwrap_or(Duration::from_secs(5));

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &brokers)
            .set("message.timeout.ms", timeout.as_millis().to_string())
            .set("acks", &acks)
            .set("compression.type", &compression)
            .create()
            .map_err(|e| PublishError::PublishFailed {
                topic: topics.reserved.clone(),
                reason: format!("Failed to create producer: {e}"),
            })?;

        tracing::info!(
            brokers = %brokers,
            acks = %acks,
            compression = %compression,
            reserved_topic = %topics.reserved,
            failed_topic = %topics.failed,
            "RedpandaOutcomePublisher created"
        );

        Ok(RedpandaOutcomePublisher {
            producer,
            topics,
            timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publisher_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<RedpandaOutcomePublisher>();
        assert_sync::<RedpandaOutcomePublisher>();
    }

    #[test]
    fn build_requires_brokers() {
        let result = RedpandaOutcomePublisher::builder().build();
        assert!(matches!(result, Err(PublishError::PublishFailed { .. })));
    }

    #[tokio::test]
    async fn custom_topics_are_kept() {
        let topics = OutcomeTopics {
            reserved: "r".to_string(),
            failed: "f".to_string(),
        };
        let publisher = RedpandaOutcomePublisher::builder()
            .brokers("localhost:1")
            .topics(topics.clone())
            .build();

        assert_eq!(publisher.ok().map(|p| p.topics().clone()), Some(topics));
    }

    #[test]
    fn delivery_timeouts_map_to_timeout() {
        let timeout = Duration::from_secs(2);
        let err = classify_send_error(
            "inventory-reserved",
            &KafkaError::MessageProduction(RDKafkaErrorCode::MessageTimedOut),
            timeout,
        );
        assert_eq!(err, PublishError::Timeout(timeout));

        let err = classify_send_error(
            "inventory-reserved",
            &KafkaError::MessageProduction(RDKafkaErrorCode::MessageSizeTooLarge),
            timeout,
        );
        assert!(matches!(err, PublishError::PublishFailed { .. }));
    }
}
