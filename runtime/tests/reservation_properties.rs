//! Property tests for the reservation engine.
//!
//! - Concurrent reservations never oversell.
//! - Replaying any batch of orders never changes the final stock.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use inventory_core::OrderCreatedEvent;
use inventory_runtime::{ReservationEngine, RetryPolicy};
use inventory_testing::properties::stock_and_orders;
use inventory_testing::{InMemoryStockStore, order_event};
use proptest::prelude::*;
use std::sync::Arc;
use tokio::task::JoinSet;

const PRODUCT: i64 = 1;

fn engine(store: &InMemoryStockStore) -> ReservationEngine {
    ReservationEngine::new(Arc::new(store.clone()))
        .with_retry_policy(RetryPolicy::builder().max_retries(0).build())
}

fn orders(quantities: &[i64]) -> Vec<OrderCreatedEvent> {
    quantities
        .iter()
        .zip(1i64..)
        .map(|(&quantity, order_id)| order_event(order_id, PRODUCT, quantity))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: the reserved total never exceeds initial stock, and the
    /// final quantity is exactly what is left.
    #[test]
    fn prop_concurrent_reservations_never_oversell((initial, quantities) in stock_and_orders()) {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(4)
            .enable_all()
            .build()
            .unwrap();

        let store = InMemoryStockStore::new().with_stock(PRODUCT, initial);
        let engine = engine(&store);
        let events = orders(&quantities);

        let reserved_total: i64 = runtime.block_on(async {
            let mut tasks = JoinSet::new();
            for event in events.clone() {
                let engine = engine.clone();
                tasks.spawn(async move {
                    let outcome = engine.reserve(&event).await;
                    (event.quantity, outcome.is_reserved())
                });
            }

            let mut total = 0;
            while let Some(joined) = tasks.join_next().await {
                let (quantity, reserved) = joined.unwrap();
                if reserved {
                    total += quantity;
                }
            }
            total
        });

        let remaining = store.quantity_of(PRODUCT).unwrap();
        prop_assert!(reserved_total <= initial);
        prop_assert!(remaining >= 0);
        prop_assert_eq!(remaining, initial - reserved_total);
    }

    /// Property: delivering every order twice decrements exactly as much as
    /// delivering it once, and both deliveries agree on the outcome.
    #[test]
    fn prop_redelivery_has_no_double_effect((initial, quantities) in stock_and_orders()) {
        let once = InMemoryStockStore::new().with_stock(PRODUCT, initial);
        let twice = InMemoryStockStore::new().with_stock(PRODUCT, initial);
        let events = orders(&quantities);

        tokio_test::block_on(async {
            let single = engine(&once);
            let double = engine(&twice);
            for event in &events {
                let expected = single.reserve(event).await;
                let first = double.reserve(event).await;
                let second = double.reserve(event).await;
                assert_eq!(first, expected);
                assert_eq!(second, first);
            }
        });

        prop_assert_eq!(once.quantity_of(PRODUCT), twice.quantity_of(PRODUCT));
    }
}
