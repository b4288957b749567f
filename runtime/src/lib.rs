//! # Inventory Runtime
//!
//! The reservation pipeline, independent of any broker or database.
//!
//! ## Core Components
//!
//! - **Reservation engine** ([`reservation`]): validates an order and turns the
//!   store's decision into exactly one outcome event
//! - **Order consumer** ([`consumer`]): the Idle → Processing → Publishing loop
//!   that gates offset commits on acknowledged outcomes
//! - **Retry** ([`retry`]): bounded exponential backoff shared by the store,
//!   publish and read paths
//! - **Metrics** ([`metrics`]): Prometheus counters and histograms
//!
//! ## Example
//!
//! ```ignore
//! use inventory_runtime::{OrderConsumer, ReservationEngine};
//!
//! let engine = ReservationEngine::new(store);
//! let handle = OrderConsumer::builder()
//!     .log(order_log)
//!     .engine(engine)
//!     .publisher(publisher)
//!     .shutdown(shutdown_rx)
//!     .build()?
//!     .spawn();
//! ```

/// Order consumer loop
pub mod consumer;

/// Prometheus metrics for observability
pub mod metrics;

/// Reservation decisions against the stock store
pub mod reservation;

/// Retry logic with exponential backoff
pub mod retry;

pub use consumer::{
    ConsumerBuildError, ConsumerPhase, ConsumerSnapshot, ConsumerStats, OrderConsumer,
    OrderConsumerBuilder,
};
pub use metrics::{MetricsError, MetricsRecorder};
pub use reservation::ReservationEngine;
pub use retry::{RetryPolicy, RetryPolicyBuilder, retry_with_backoff, retry_with_predicate};
