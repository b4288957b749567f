//! In-memory stock store for fast, deterministic tests.
//!
//! Behaves like the Postgres store: the conditional decrement and the
//! order ledger are applied under one lock, so concurrent reservations
//! serialize and a redelivered order replays its recorded decision.
//!
//! Failure injection:
//! - [`InMemoryStockStore::fail_next_reserves`]: next `n` reserve calls fail transiently
//! - [`InMemoryStockStore::set_unavailable`]: every call fails until cleared
//! - [`InMemoryStockStore::with_reserve_latency`]: slow reserve calls, for deadline tests

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Lock poisoning only follows a panicking test

use crate::mocks::test_clock;
use crate::timeline::{Timeline, TimelineEntry};
use inventory_core::environment::Clock;
use inventory_core::{
    OrderId, ProductId, Reservation, ReservationRequest, ReserveDecision, StockRecord, StockStore,
    StockStoreError,
};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Default)]
struct State {
    rows: HashMap<ProductId, StockRecord>,
    ledger: HashMap<OrderId, ReserveDecision>,
}

/// In-memory [`StockStore`].
///
/// Clones share state, so a test can hand one clone to the code under test
/// and inspect another.
///
/// # Example
///
/// ```
/// use inventory_testing::InMemoryStockStore;
///
/// let store = InMemoryStockStore::new().with_stock(42, 10);
/// assert_eq!(store.quantity_of(42), Some(10));
/// ```
#[derive(Clone)]
pub struct InMemoryStockStore {
    state: Arc<Mutex<State>>,
    clock: Arc<dyn Clock>,
    reserve_latency: Option<Duration>,
    timeline: Option<Timeline>,
    reserve_calls: Arc<AtomicUsize>,
    failing_reserves: Arc<AtomicUsize>,
    unavailable: Arc<AtomicBool>,
}

impl Default for InMemoryStockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStockStore {
    /// Create an empty store stamped by [`test_clock`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            clock: Arc::new(test_clock()),
            reserve_latency: None,
            timeline: None,
            reserve_calls: Arc::new(AtomicUsize::new(0)),
            failing_reserves: Arc::new(AtomicUsize::new(0)),
            unavailable: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Seed a product row.
    #[must_use]
    pub fn with_stock(self, product_id: i64, quantity: i64) -> Self {
        let product_id = ProductId::new(product_id);
        let record = StockRecord {
            product_id,
            quantity,
            updated_at: self.clock.now(),
        };
        self.state.lock().unwrap().rows.insert(product_id, record);
        self
    }

    /// Use a different clock for `updated_at`.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Delay every reserve call by `latency` before touching state.
    #[must_use]
    pub fn with_reserve_latency(mut self, latency: Duration) -> Self {
        self.reserve_latency = Some(latency);
        self
    }

    /// Record committed reservations into `timeline`.
    #[must_use]
    pub fn with_timeline(mut self, timeline: Timeline) -> Self {
        self.timeline = Some(timeline);
        self
    }

    /// Make the next `n` reserve calls fail with a transient error.
    pub fn fail_next_reserves(&self, n: usize) {
        self.failing_reserves.store(n, Ordering::SeqCst);
    }

    /// Make every call fail with [`StockStoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Current quantity of a product, bypassing failure injection.
    #[must_use]
    pub fn quantity_of(&self, product_id: i64) -> Option<i64> {
        self.get(ProductId::new(product_id)).map(|row| row.quantity)
    }

    /// Current row of a product, bypassing failure injection.
    #[must_use]
    pub fn get(&self, product_id: ProductId) -> Option<StockRecord> {
        self.state.lock().unwrap().rows.get(&product_id).cloned()
    }

    /// Decision recorded for an order, if it was ever applied.
    #[must_use]
    pub fn ledger_decision(&self, order_id: i64) -> Option<ReserveDecision> {
        self.state
            .lock()
            .unwrap()
            .ledger
            .get(&OrderId::new(order_id))
            .copied()
    }

    /// Number of `try_reserve` calls, including failed ones.
    #[must_use]
    pub fn reserve_calls(&self) -> usize {
        self.reserve_calls.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), StockStoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StockStoreError::Unavailable(
                "in-memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }

    fn take_injected_failure(&self) -> bool {
        self.failing_reserves
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn apply(&self, request: ReservationRequest) -> Reservation {
        let mut state = self.state.lock().unwrap();

        if let Some(decision) = state.ledger.get(&request.order_id) {
            return Reservation::replayed(*decision);
        }

        let decision = match state.rows.get_mut(&request.product_id) {
            None => ReserveDecision::NotFound,
            Some(row) if row.quantity >= request.quantity => {
                row.quantity -= request.quantity;
                row.updated_at = self.clock.now();
                ReserveDecision::Reserved
            }
            Some(_) => ReserveDecision::InsufficientStock,
        };
        state.ledger.insert(request.order_id, decision);
        drop(state);

        if decision == ReserveDecision::Reserved {
            if let Some(timeline) = &self.timeline {
                timeline.record(TimelineEntry::Reserve(request.order_id));
            }
        }

        Reservation::fresh(decision)
    }
}

impl StockStore for InMemoryStockStore {
    fn get_stock(
        &self,
        product_id: ProductId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<StockRecord>, StockStoreError>> + Send + '_>>
    {
        Box::pin(async move {
            self.check_available()?;
            Ok(self.get(product_id))
        })
    }

    fn create_stock(
        &self,
        product_id: ProductId,
        quantity: i64,
    ) -> Pin<Box<dyn Future<Output = Result<StockRecord, StockStoreError>> + Send + '_>> {
        Box::pin(async move {
            self.check_available()?;
            if quantity < 0 {
                return Err(StockStoreError::InvalidQuantity(quantity));
            }

            let mut state = self.state.lock().unwrap();
            if state.rows.contains_key(&product_id) {
                return Err(StockStoreError::AlreadyExists(product_id));
            }
            let record = StockRecord {
                product_id,
                quantity,
                updated_at: self.clock.now(),
            };
            state.rows.insert(product_id, record.clone());
            Ok(record)
        })
    }

    fn set_quantity(
        &self,
        product_id: ProductId,
        quantity: i64,
    ) -> Pin<Box<dyn Future<Output = Result<Option<StockRecord>, StockStoreError>> + Send + '_>>
    {
        Box::pin(async move {
            self.check_available()?;
            if quantity < 0 {
                return Err(StockStoreError::InvalidQuantity(quantity));
            }

            let mut state = self.state.lock().unwrap();
            Ok(state.rows.get_mut(&product_id).map(|row| {
                row.quantity = quantity;
                row.updated_at = self.clock.now();
                row.clone()
            }))
        })
    }

    fn try_reserve(
        &self,
        request: ReservationRequest,
    ) -> Pin<Box<dyn Future<Output = Result<Reservation, StockStoreError>> + Send + '_>> {
        Box::pin(async move {
            self.reserve_calls.fetch_add(1, Ordering::SeqCst);

            if let Some(latency) = self.reserve_latency {
                tokio::time::sleep(latency).await;
            }
            self.check_available()?;
            if self.take_injected_failure() {
                return Err(StockStoreError::Unavailable(
                    "injected transient failure".to_string(),
                ));
            }
            if request.quantity <= 0 {
                return Err(StockStoreError::InvalidQuantity(request.quantity));
            }

            Ok(self.apply(request))
        })
    }

    fn ping(&self) -> Pin<Box<dyn Future<Output = Result<(), StockStoreError>> + Send + '_>> {
        Box::pin(async move { self.check_available() })
    }
}
