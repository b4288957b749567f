//! Integration tests for the Redpanda adapters with a real Kafka instance.
//!
//! These tests use testcontainers to spin up Kafka and validate:
//! - Order messages are read with topic, partition, offset, key and payload
//! - Outcomes are routed to the reserved/failed topics with the JSON schema
//! - Uncommitted messages are redelivered to a new group member
//! - Committed offsets are not redelivered
//! - Commits the broker rejects are reported to the caller
//!
//! # Running These Tests
//!
//! These tests are marked as `#[ignore]` by default because they require
//! Docker and take 15-60 seconds each to spin up Kafka.
//!
//! ```bash
//! cargo test -p inventory-redpanda --test integration_tests -- --ignored
//! ```

#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use inventory_core::{
    FailureReason, InventoryOutcomeEvent, OrderId, OrderLog, OrderLogError, OrderMessage,
    OutcomePublisher, OutcomeTopics,
};
use inventory_redpanda::{RedpandaOrderLog, RedpandaOutcomePublisher};
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::time::Duration;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::kafka::{KAFKA_PORT, Kafka};

async fn start_kafka() -> (ContainerAsync<Kafka>, String) {
    let kafka = Kafka::default()
        .with_env_var("KAFKA_AUTO_CREATE_TOPICS_ENABLE", "true")
        .start()
        .await
        .expect("Failed to start Kafka container");

    let host = kafka.get_host().await.expect("Failed to get host");
    let port = kafka
        .get_host_port_ipv4(KAFKA_PORT)
        .await
        .expect("Failed to get port");
    let brokers = format!("{host}:{port}");
    wait_for_kafka_ready(&brokers).await;
    (kafka, brokers)
}

/// Helper to wait for Kafka to accept writes
async fn wait_for_kafka_ready(brokers: &str) {
    let producer = raw_producer(brokers);
    let max_attempts = 60;
    for attempt in 1..=max_attempts {
        let record = FutureRecord::to("warmup-topic").payload("warmup").key("warmup");
        if producer
            .send(record, Timeout::After(Duration::from_secs(2)))
            .await
            .is_ok()
        {
            tokio::time::sleep(Duration::from_millis(500)).await;
            return;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(
            attempt != max_attempts,
            "Kafka failed to become ready after {max_attempts} attempts"
        );
    }
}

fn raw_producer(brokers: &str) -> FutureProducer {
    ClientConfig::new()
        .set("bootstrap.servers", brokers)
        .set("message.timeout.ms", "5000")
        .create()
        .expect("Failed to create producer")
}

async fn produce(producer: &FutureProducer, topic: &str, key: &str, payload: &[u8]) {
    producer
        .send(
            FutureRecord::to(topic).payload(payload).key(key),
            Timeout::After(Duration::from_secs(5)),
        )
        .await
        .expect("Failed to produce");
}

fn order_log(brokers: &str, group: &str, topic: &str) -> RedpandaOrderLog {
    RedpandaOrderLog::builder()
        .brokers(brokers)
        .consumer_group(group)
        .topic(topic)
        .auto_offset_reset("earliest")
        .build()
        .expect("Failed to create order log")
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn reads_order_messages_with_their_position() {
    let (_kafka, brokers) = start_kafka().await;
    let producer = raw_producer(&brokers);
    let payload = br#"{"orderId":1,"userId":7,"productId":42,"quantity":5,"total":49.5}"#;
    produce(&producer, "orders-read", "42", payload).await;

    let log = order_log(&brokers, "read-test", "orders-read");
    log.check_connection(Duration::from_secs(10))
        .await
        .expect("Broker should answer");

    let message = tokio::time::timeout(Duration::from_secs(30), log.next_message())
        .await
        .expect("Timeout waiting for message")
        .expect("Failed to read message");

    assert_eq!(message.topic, "orders-read");
    assert_eq!(message.offset, 0);
    assert_eq!(message.key.as_deref(), Some(&b"42"[..]));
    assert_eq!(message.payload.as_deref(), Some(&payload[..]));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn uncommitted_messages_are_redelivered_committed_ones_are_not() {
    let (_kafka, brokers) = start_kafka().await;
    let producer = raw_producer(&brokers);
    produce(&producer, "orders-commit", "1", b"first").await;
    produce(&producer, "orders-commit", "1", b"second").await;

    {
        let log = order_log(&brokers, "commit-test", "orders-commit");
        let first = tokio::time::timeout(Duration::from_secs(30), log.next_message())
            .await
            .expect("Timeout waiting for first")
            .expect("Failed to read first");
        log.commit(&first).await.expect("Failed to commit");

        // Read the second message but never commit it.
        let _second = tokio::time::timeout(Duration::from_secs(10), log.next_message())
            .await
            .expect("Timeout waiting for second")
            .expect("Failed to read second");

    }

    let log = order_log(&brokers, "commit-test", "orders-commit");
    let redelivered = tokio::time::timeout(Duration::from_secs(30), log.next_message())
        .await
        .expect("Timeout waiting for redelivery")
        .expect("Failed to read redelivery");

    assert_eq!(redelivered.payload.as_deref(), Some(&b"second"[..]));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn broker_rejected_commit_is_an_error() {
    let (_kafka, brokers) = start_kafka().await;
    let producer = raw_producer(&brokers);
    produce(&producer, "orders-reject", "1", b"only").await;

    let log = order_log(&brokers, "reject-test", "orders-reject");
    let read = tokio::time::timeout(Duration::from_secs(30), log.next_message())
        .await
        .expect("Timeout waiting for message")
        .expect("Failed to read message");

    // The topic has a single partition; the broker refuses offsets for any other.
    let foreign = OrderMessage {
        partition: read.partition + 7,
        ..read
    };
    let err = log
        .commit(&foreign)
        .await
        .expect_err("Commit for a missing partition should fail");

    match err {
        OrderLogError::CommitFailed { partition, .. } => {
            assert_eq!(partition, foreign.partition);
        }
        other => panic!("Expected CommitFailed, got {other:?}"),
    }
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn outcomes_are_routed_by_status() {
    let (_kafka, brokers) = start_kafka().await;
    let publisher = RedpandaOutcomePublisher::builder()
        .brokers(&brokers)
        .topics(OutcomeTopics {
            reserved: "test-reserved".to_string(),
            failed: "test-failed".to_string(),
        })
        .build()
        .expect("Failed to create publisher");
    publisher
        .check_connection(Duration::from_secs(10))
        .await
        .expect("Broker should answer");

    publisher
        .publish(&InventoryOutcomeEvent::reserved(OrderId::new(1)))
        .await
        .expect("Failed to publish reserved");
    publisher
        .publish(&InventoryOutcomeEvent::failed(
            OrderId::new(2),
            FailureReason::NotEnoughStock,
        ))
        .await
        .expect("Failed to publish failed");

    let failed_log = order_log(&brokers, "outcome-reader", "test-failed");
    let message = tokio::time::timeout(Duration::from_secs(30), failed_log.next_message())
        .await
        .expect("Timeout waiting for outcome")
        .expect("Failed to read outcome");

    let body: serde_json::Value =
        serde_json::from_slice(message.payload.as_deref().expect("payload")).expect("json");
    assert_eq!(
        body,
        serde_json::json!({"orderId": 2, "status": "FAILED", "message": "Not enough stock"})
    );
    assert_eq!(message.key.as_deref(), Some(&b"2"[..]));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn unreachable_broker_fails_the_connection_check() {
    let log = order_log("127.0.0.1:1", "nobody", "orders");
    let result = log.check_connection(Duration::from_secs(2)).await;
    assert!(result.is_err());
}
