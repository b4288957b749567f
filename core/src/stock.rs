//! Stock store abstraction.
//!
//! The [`StockStore`] is the only mutable resource shared between the HTTP
//! surface and the reservation pipeline. Correctness under concurrency is
//! delegated entirely to the store: [`StockStore::try_reserve`] must be a
//! single atomic conditional decrement, never a read followed by a write.
//!
//! # Idempotency
//!
//! Order events arrive at least once. Every reservation carries its
//! [`OrderId`], and the store records one [`ReserveDecision`] per order in the
//! same atomic step as the decrement. A redelivered order gets the recorded
//! decision back with [`Reservation::replayed`] set, and stock is untouched.
//!
//! # Implementations
//!
//! - `PostgresStockStore` (crate `inventory-postgres`) - production
//! - `InMemoryStockStore` (crate `inventory-testing`) - tests

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;

/// Product identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(i64);

impl ProductId {
    /// Wrap a raw identifier.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Raw identifier.
    #[must_use]
    pub const fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Order identifier, the idempotency key of a reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(i64);

impl OrderId {
    /// Wrap a raw identifier.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Raw identifier.
    #[must_use]
    pub const fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One row of the stock table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRecord {
    /// Product this row tracks
    pub product_id: ProductId,
    /// Units on hand, never negative
    pub quantity: i64,
    /// Last mutation time
    pub updated_at: DateTime<Utc>,
}

/// A request to reserve stock for one order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservationRequest {
    /// Idempotency key
    pub order_id: OrderId,
    /// Product to decrement
    pub product_id: ProductId,
    /// Units to take, must be positive
    pub quantity: i64,
}

/// Decision taken by the store for a reservation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReserveDecision {
    /// Quantity was decremented
    Reserved,
    /// Quantity was below the requested amount; nothing changed
    InsufficientStock,
    /// No row for the product; nothing changed
    NotFound,
}

impl ReserveDecision {
    /// Ledger representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Reserved => "reserved",
            Self::InsufficientStock => "insufficient_stock",
            Self::NotFound => "not_found",
        }
    }

    /// Parse the ledger representation.
    ///
    /// # Errors
    ///
    /// Returns [`StockStoreError::Query`] for unknown values.
    pub fn parse(s: &str) -> Result<Self, StockStoreError> {
        match s {
            "reserved" => Ok(Self::Reserved),
            "insufficient_stock" => Ok(Self::InsufficientStock),
            "not_found" => Ok(Self::NotFound),
            _ => Err(StockStoreError::Query(format!(
                "Invalid reservation decision: {s}"
            ))),
        }
    }
}

/// Result of [`StockStore::try_reserve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservation {
    /// What the store decided for this order
    pub decision: ReserveDecision,
    /// `true` when the order was already in the ledger and nothing was applied
    pub replayed: bool,
}

impl Reservation {
    /// A decision applied by this call.
    #[must_use]
    pub const fn fresh(decision: ReserveDecision) -> Self {
        Self {
            decision,
            replayed: false,
        }
    }

    /// A decision recorded by an earlier delivery of the same order.
    #[must_use]
    pub const fn replayed(decision: ReserveDecision) -> Self {
        Self {
            decision,
            replayed: true,
        }
    }
}

/// Errors from stock store operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StockStoreError {
    /// Store could not be reached
    #[error("Stock store unavailable: {0}")]
    Unavailable(String),

    /// Operation exceeded its deadline
    #[error("Stock store operation timed out after {0:?}")]
    Timeout(Duration),

    /// Statement failed for a non-connectivity reason
    #[error("Query failed: {0}")]
    Query(String),

    /// Insert of a product that already has a row
    #[error("Product {0} already exists")]
    AlreadyExists(ProductId),

    /// Quantity would break the non-negative invariant
    #[error("Invalid quantity {0}: must be non-negative")]
    InvalidQuantity(i64),
}

impl StockStoreError {
    /// Whether retrying the same call may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout(_))
    }
}

/// Durable stock table.
///
/// # Dyn Compatibility
///
/// Methods return `Pin<Box<dyn Future>>` so the store can be shared as
/// `Arc<dyn StockStore>` between axum handlers and the consumer task.
pub trait StockStore: Send + Sync {
    /// Point read of a stock row.
    ///
    /// # Errors
    ///
    /// Returns [`StockStoreError`] if the store cannot be queried.
    fn get_stock(
        &self,
        product_id: ProductId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<StockRecord>, StockStoreError>> + Send + '_>>;

    /// Point read of the quantity only. `None` means the product is unknown.
    ///
    /// # Errors
    ///
    /// Returns [`StockStoreError`] if the store cannot be queried.
    fn get_quantity(
        &self,
        product_id: ProductId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<i64>, StockStoreError>> + Send + '_>> {
        Box::pin(async move {
            Ok(self
                .get_stock(product_id)
                .await?
                .map(|record| record.quantity))
        })
    }

    /// Insert a new stock row.
    ///
    /// # Errors
    ///
    /// - [`StockStoreError::AlreadyExists`] if the product has a row
    /// - [`StockStoreError::InvalidQuantity`] for negative quantities
    fn create_stock(
        &self,
        product_id: ProductId,
        quantity: i64,
    ) -> Pin<Box<dyn Future<Output = Result<StockRecord, StockStoreError>> + Send + '_>>;

    /// Overwrite the quantity of an existing row. `None` means the product is unknown.
    ///
    /// # Errors
    ///
    /// - [`StockStoreError::InvalidQuantity`] for negative quantities
    fn set_quantity(
        &self,
        product_id: ProductId,
        quantity: i64,
    ) -> Pin<Box<dyn Future<Output = Result<Option<StockRecord>, StockStoreError>> + Send + '_>>;

    /// Atomically decrement stock if enough is available, once per order.
    ///
    /// The decrement and the ledger entry for `request.order_id` commit
    /// together or not at all. A repeated order id returns the recorded
    /// decision with [`Reservation::replayed`] set.
    ///
    /// # Errors
    ///
    /// Returns [`StockStoreError`] when the store fails; nothing is committed
    /// in that case.
    fn try_reserve(
        &self,
        request: ReservationRequest,
    ) -> Pin<Box<dyn Future<Output = Result<Reservation, StockStoreError>> + Send + '_>>;

    /// Cheap connectivity check for readiness probes.
    ///
    /// # Errors
    ///
    /// Returns [`StockStoreError::Unavailable`] when the store cannot be reached.
    fn ping(&self) -> Pin<Box<dyn Future<Output = Result<(), StockStoreError>> + Send + '_>>;
}
