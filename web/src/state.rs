//! Application state for Axum handlers.

use inventory_core::StockStore;
use std::sync::Arc;

/// State shared across all HTTP handlers.
///
/// The store handle is the same one the reservation consumer uses, so stock
/// written over HTTP is immediately visible to the pipeline.
#[derive(Clone)]
pub struct AppState {
    /// Durable stock table
    pub store: Arc<dyn StockStore>,
}

impl AppState {
    /// Create state around a store handle.
    #[must_use]
    pub fn new(store: Arc<dyn StockStore>) -> Self {
        Self { store }
    }
}
