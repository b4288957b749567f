//! # Inventory Core
//!
//! Domain types and boundary traits for the inventory reservation service.
//!
//! The reservation pipeline has three external collaborators, each abstracted
//! behind a trait defined here so the runtime can be driven by production
//! adapters or by the in-memory doubles in `inventory-testing`:
//!
//! - [`stock::StockStore`]: durable stock table with an atomic conditional decrement
//! - [`order_log::OrderLog`]: ordered, partitioned log of order-created events
//! - [`outcome::OutcomePublisher`]: the reserved / failed output streams
//!
//! ## Data Flow
//!
//! ```text
//! ┌──────────────┐    ┌────────────────────┐    ┌──────────────────┐
//! │  OrderLog    │───▶│ Reservation Engine │───▶│ OutcomePublisher │
//! │  ("orders")  │    │   (try_reserve)    │    │ reserved/failed  │
//! └──────▲───────┘    └─────────┬──────────┘    └────────┬─────────┘
//!        │                      ▼                        │
//!        │              ┌──────────────┐                 │
//!        │              │  StockStore  │                 │
//!        │              └──────────────┘                 │
//!        └──────────── commit offset after publish ◀─────┘
//! ```
//!
//! ## Wire Formats
//!
//! Events are JSON on the wire (see [`events`]). Field names are camelCase
//! to match the upstream order service.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub use chrono::{DateTime, Utc};

pub mod events;
pub mod order_log;
pub mod outcome;
pub mod stock;

/// Injected dependencies shared by the adapters.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// Stores stamp `updated_at` through this trait so tests can pin the time.
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall-clock time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

pub use events::{FailureReason, InventoryOutcomeEvent, OrderCreatedEvent, OutcomeStatus};
pub use order_log::{OrderLog, OrderLogError, OrderMessage};
pub use outcome::{OutcomePublisher, OutcomeTopics, PublishError};
pub use stock::{
    OrderId, ProductId, Reservation, ReservationRequest, ReserveDecision, StockRecord, StockStore,
    StockStoreError,
};
