//! # Inventory Testing
//!
//! Test doubles and helpers for the inventory reservation service.
//!
//! This crate provides:
//! - [`InMemoryStockStore`]: conditional decrement plus order ledger, with failure injection
//! - [`ScriptedOrderLog`]: plays back messages and read errors, records commits
//! - [`RecordingOutcomePublisher`]: captures outcomes per topic, with failure injection
//! - [`Timeline`]: shared journal to assert reserve/publish/commit ordering
//! - fixtures for order events and raw log messages
//!
//! ## Example
//!
//! ```
//! use inventory_testing::{InMemoryStockStore, order_event};
//!
//! let store = InMemoryStockStore::new().with_stock(42, 10);
//! let event = order_event(1, 42, 3);
//! assert_eq!(event.quantity, 3);
//! assert_eq!(store.quantity_of(42), Some(10));
//! ```

use chrono::{DateTime, Utc};
use inventory_core::environment::Clock;

pub mod order_log;
pub mod publisher;
pub mod stock_store;
pub mod timeline;

/// Mock implementations of environment traits.
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use inventory_testing::mocks::FixedClock;
    /// use inventory_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Order fixtures.
pub mod fixtures {
    use inventory_core::{OrderCreatedEvent, OrderId, OrderMessage, ProductId};

    /// Topic fixtures are delivered on.
    pub const ORDERS_TOPIC: &str = "orders";

    /// A well-formed order event. `user_id` and `total` are filler.
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // fixture quantities are small
    pub fn order_event(order_id: i64, product_id: i64, quantity: i64) -> OrderCreatedEvent {
        OrderCreatedEvent {
            order_id: OrderId::new(order_id),
            user_id: 1,
            product_id: ProductId::new(product_id),
            quantity,
            total: quantity as f64 * 9.99,
        }
    }

    /// A log message on partition 0 carrying `event` as JSON, keyed by product.
    #[must_use]
    pub fn order_message(offset: i64, event: &OrderCreatedEvent) -> OrderMessage {
        OrderMessage {
            topic: ORDERS_TOPIC.to_string(),
            partition: 0,
            offset,
            key: Some(event.product_id.to_string().into_bytes()),
            payload: Some(serde_json::to_vec(event).unwrap_or_default()),
        }
    }

    /// A log message on partition 0 carrying arbitrary bytes.
    #[must_use]
    pub fn raw_message(offset: i64, payload: &[u8]) -> OrderMessage {
        OrderMessage {
            topic: ORDERS_TOPIC.to_string(),
            partition: 0,
            offset,
            key: None,
            payload: Some(payload.to_vec()),
        }
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use proptest::collection::vec;
    use proptest::prelude::*;

    /// Initial stock plus a batch of order quantities against one product.
    ///
    /// Quantities include zero and negatives so invalid events are mixed in.
    pub fn stock_and_orders() -> impl Strategy<Value = (i64, Vec<i64>)> {
        (0i64..50, vec(-2i64..15, 1..40))
    }
}

// Re-export commonly used items
pub use fixtures::{order_event, order_message, raw_message};
pub use mocks::{FixedClock, test_clock};
pub use order_log::ScriptedOrderLog;
pub use publisher::RecordingOutcomePublisher;
pub use stock_store::InMemoryStockStore;
pub use timeline::{Timeline, TimelineEntry};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
    }

    #[test]
    fn order_message_carries_decodable_json() {
        let event = order_event(5, 42, 2);
        let message = order_message(9, &event);

        let decoded =
            inventory_core::OrderCreatedEvent::from_json(&message.payload.unwrap_or_default());
        assert_eq!(decoded.ok(), Some(event));
        assert_eq!(message.key.as_deref(), Some(&b"42"[..]));
    }
}
