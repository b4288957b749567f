//! Redpanda adapters for the inventory reservation service.
//!
//! Uses rdkafka, so any Kafka-compatible broker works (Redpanda, Apache Kafka,
//! MSK, ...).
//!
//! - [`RedpandaOrderLog`]: consumer-group member on the `orders` topic,
//!   implementing [`OrderLog`](inventory_core::OrderLog)
//! - [`RedpandaOutcomePublisher`]: producer for `inventory-reserved` and
//!   `inventory-failed`, implementing
//!   [`OutcomePublisher`](inventory_core::OutcomePublisher)
//!
//! # Delivery Semantics
//!
//! **At-least-once** with manual offset commits:
//! - `enable.auto.commit=false`; the consumer loop commits an offset only
//!   after the outcome for that message has been acknowledged
//! - a crash before the commit means the order is redelivered, and the
//!   stock store's ledger replays the recorded decision
//! - ordering is guaranteed within a partition; upstream keys orders by
//!   product id
//!
//! Outcomes are produced with `acks=all` by default and keyed by order id.
//!
//! # Example
//!
//! ```no_run
//! use inventory_redpanda::{RedpandaOrderLog, RedpandaOutcomePublisher};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let orders = RedpandaOrderLog::builder()
//!     .brokers("localhost:9092")
//!     .consumer_group("inventory-service-group")
//!     .topic("orders")
//!     .build()?;
//!
//! let outcomes = RedpandaOutcomePublisher::builder()
//!     .brokers("localhost:9092")
//!     .build()?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod order_log;
pub mod publisher;

pub use order_log::{RedpandaOrderLog, RedpandaOrderLogBuilder};
pub use publisher::{RedpandaOutcomePublisher, RedpandaOutcomePublisherBuilder};
