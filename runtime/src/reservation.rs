//! Reservation engine: turns an order event into exactly one outcome.
//!
//! ```text
//! OrderCreatedEvent
//!        │ validate ── invalid ──────────────▶ FAILED "invalid event"
//!        ▼
//! try_reserve (deadline + bounded retry on transient errors)
//!        │ Reserved ─────────────────────────▶ RESERVED
//!        │ InsufficientStock ────────────────▶ FAILED "Not enough stock"
//!        │ NotFound ─────────────────────────▶ FAILED "Product not found"
//!        └ store error after retries ────────▶ FAILED "transient error"
//! ```
//!
//! The outcome is RESERVED only when the store reports a committed
//! decrement for this order, either now or on an earlier delivery.

use crate::metrics::ReservationMetrics;
use crate::retry::{RetryPolicy, retry_with_predicate};
use inventory_core::{
    FailureReason, InventoryOutcomeEvent, OrderCreatedEvent, Reservation, ReservationRequest,
    ReserveDecision, StockStore, StockStoreError,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Default deadline for one store round-trip.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Decides and applies reservations against a [`StockStore`].
#[derive(Clone)]
pub struct ReservationEngine {
    store: Arc<dyn StockStore>,
    retry: RetryPolicy,
    store_timeout: Duration,
}

impl ReservationEngine {
    /// Create an engine with the default retry policy and store deadline.
    #[must_use]
    pub fn new(store: Arc<dyn StockStore>) -> Self {
        Self {
            store,
            retry: RetryPolicy::builder().jitter(true).build(),
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    /// Override the retry policy for transient store errors.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Override the per-call store deadline.
    #[must_use]
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Decide the outcome for one order event.
    ///
    /// Never fails: every problem becomes a FAILED outcome carrying the
    /// matching [`FailureReason`].
    pub async fn reserve(&self, event: &OrderCreatedEvent) -> InventoryOutcomeEvent {
        let started = Instant::now();

        if let Err(invalid) = event.validate() {
            warn!(
                order_id = %event.order_id,
                product_id = %event.product_id,
                error = %invalid,
                "Rejecting invalid order event"
            );
            return Self::finish(
                InventoryOutcomeEvent::failed(event.order_id, FailureReason::InvalidEvent),
                Some(FailureReason::InvalidEvent),
                started,
            );
        }

        let request = event.reservation_request();
        let result = retry_with_predicate(
            "stock.try_reserve",
            &self.retry,
            || self.try_reserve_once(request),
            StockStoreError::is_transient,
        )
        .await;

        match result {
            Ok(reservation) => Self::map_reservation(request, reservation, started),
            Err(err) => {
                error!(
                    order_id = %request.order_id,
                    product_id = %request.product_id,
                    error = %err,
                    transient = err.is_transient(),
                    "Stock store failed, reporting transient error"
                );
                Self::finish(
                    InventoryOutcomeEvent::failed(request.order_id, FailureReason::Transient),
                    Some(FailureReason::Transient),
                    started,
                )
            }
        }
    }

    async fn try_reserve_once(
        &self,
        request: ReservationRequest,
    ) -> Result<Reservation, StockStoreError> {
        tokio::time::timeout(self.store_timeout, self.store.try_reserve(request))
            .await
            .map_err(|_| StockStoreError::Timeout(self.store_timeout))?
    }

    fn map_reservation(
        request: ReservationRequest,
        reservation: Reservation,
        started: Instant,
    ) -> InventoryOutcomeEvent {
        if reservation.replayed {
            info!(
                order_id = %request.order_id,
                decision = reservation.decision.as_str(),
                "Order already processed, replaying recorded decision"
            );
            ReservationMetrics::record_replay();
        }

        match reservation.decision {
            ReserveDecision::Reserved => {
                info!(
                    order_id = %request.order_id,
                    product_id = %request.product_id,
                    quantity = request.quantity,
                    "Stock reserved"
                );
                Self::finish(InventoryOutcomeEvent::reserved(request.order_id), None, started)
            }
            ReserveDecision::InsufficientStock => {
                info!(
                    order_id = %request.order_id,
                    product_id = %request.product_id,
                    quantity = request.quantity,
                    "Not enough stock for order"
                );
                Self::finish(
                    InventoryOutcomeEvent::failed(request.order_id, FailureReason::NotEnoughStock),
                    Some(FailureReason::NotEnoughStock),
                    started,
                )
            }
            ReserveDecision::NotFound => {
                info!(
                    order_id = %request.order_id,
                    product_id = %request.product_id,
                    "Product not found for order"
                );
                Self::finish(
                    InventoryOutcomeEvent::failed(request.order_id, FailureReason::ProductNotFound),
                    Some(FailureReason::ProductNotFound),
                    started,
                )
            }
        }
    }

    fn finish(
        outcome: InventoryOutcomeEvent,
        reason: Option<FailureReason>,
        started: Instant,
    ) -> InventoryOutcomeEvent {
        ReservationMetrics::record_decision(outcome.status, reason, started.elapsed());
        outcome
    }
}
