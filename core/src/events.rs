//! Wire schemas for the order and outcome topics.
//!
//! Both schemas are fixed JSON shapes shared with services outside this
//! workspace, so field names and enum spellings must not drift:
//!
//! ```text
//! orders:              {"orderId":1,"userId":7,"productId":42,"quantity":5,"total":99.5}
//! inventory-reserved:  {"orderId":1,"status":"RESERVED","message":"Reserved successfully"}
//! inventory-failed:    {"orderId":1,"status":"FAILED","message":"Not enough stock"}
//! ```

use crate::stock::{OrderId, ProductId, ReservationRequest};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use thiserror::Error;

/// An order was created upstream and needs stock reserved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreatedEvent {
    /// Order identifier (idempotency key for the reservation)
    pub order_id: OrderId,
    /// Customer who placed the order (0 when absent or null)
    #[serde(default, deserialize_with = "null_as_default")]
    pub user_id: i64,
    /// Product to reserve
    pub product_id: ProductId,
    /// Units requested
    pub quantity: i64,
    /// Order total, carried through but not used for the decision
    #[serde(default, deserialize_with = "null_as_default")]
    pub total: f64,
}

/// Fields the decision ignores decode leniently so producers that omit them
/// still get an outcome.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Why an order event failed validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidEvent {
    /// Requested quantity was zero or negative
    #[error("quantity must be positive, got {0}")]
    NonPositiveQuantity(i64),
    /// Product id outside the identifier range
    #[error("product id must be positive, got {0}")]
    InvalidProductId(ProductId),
    /// Order id outside the identifier range
    #[error("order id must be positive, got {0}")]
    InvalidOrderId(OrderId),
}

impl OrderCreatedEvent {
    /// Decode an event from a raw log payload.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error when the payload is not a well-formed
    /// order event (missing fields, non-numeric quantity, ...).
    pub fn from_json(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }

    /// Check the event shape before it reaches the store.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidEvent`] describing the first violated constraint.
    pub fn validate(&self) -> Result<(), InvalidEvent> {
        if self.order_id.get() <= 0 {
            return Err(InvalidEvent::InvalidOrderId(self.order_id));
        }
        if self.product_id.get() <= 0 {
            return Err(InvalidEvent::InvalidProductId(self.product_id));
        }
        if self.quantity <= 0 {
            return Err(InvalidEvent::NonPositiveQuantity(self.quantity));
        }
        Ok(())
    }

    /// The store request this event asks for.
    #[must_use]
    pub const fn reservation_request(&self) -> ReservationRequest {
        ReservationRequest {
            order_id: self.order_id,
            product_id: self.product_id,
            quantity: self.quantity,
        }
    }
}

/// Reservation result as seen by downstream services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeStatus {
    /// Stock was decremented for the order
    Reserved,
    /// Nothing was decremented
    Failed,
}

impl OutcomeStatus {
    /// Wire spelling of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Reserved => "RESERVED",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reason carried in the message of a FAILED outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureReason {
    /// Event failed validation; the store was not touched
    InvalidEvent,
    /// Product exists but has fewer units than requested
    NotEnoughStock,
    /// No stock row for the product
    ProductNotFound,
    /// Store stayed unreachable through every retry
    Transient,
}

impl FailureReason {
    /// Human-readable message published on the failed stream.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::InvalidEvent => "invalid event",
            Self::NotEnoughStock => "Not enough stock",
            Self::ProductNotFound => "Product not found",
            Self::Transient => "transient error",
        }
    }

    /// Stable label for metrics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::InvalidEvent => "invalid_event",
            Self::NotEnoughStock => "not_enough_stock",
            Self::ProductNotFound => "product_not_found",
            Self::Transient => "transient",
        }
    }
}

/// Message published on the reserved stream.
pub const RESERVED_MESSAGE: &str = "Reserved successfully";

/// Outcome of one order event, published to exactly one output stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryOutcomeEvent {
    /// Order this outcome answers
    pub order_id: OrderId,
    /// Whether stock was reserved
    pub status: OutcomeStatus,
    /// Human-readable detail
    pub message: String,
}

impl InventoryOutcomeEvent {
    /// Successful reservation.
    #[must_use]
    pub fn reserved(order_id: OrderId) -> Self {
        Self {
            order_id,
            status: OutcomeStatus::Reserved,
            message: RESERVED_MESSAGE.to_string(),
        }
    }

    /// Rejected reservation.
    #[must_use]
    pub fn failed(order_id: OrderId, reason: FailureReason) -> Self {
        Self {
            order_id,
            status: OutcomeStatus::Failed,
            message: reason.message().to_string(),
        }
    }

    /// `true` when the outcome claims a committed decrement.
    #[must_use]
    pub fn is_reserved(&self) -> bool {
        self.status == OutcomeStatus::Reserved
    }

    /// Encode for the wire.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if encoding fails.
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
