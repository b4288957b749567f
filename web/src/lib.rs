//! HTTP surface of the inventory reservation service.
//!
//! Operators and upstream services manage the stock table here; the
//! reservation pipeline reads and decrements the same table through the
//! shared [`StockStore`](inventory_core::StockStore) handle in [`AppState`].
//!
//! # Routes
//!
//! ```text
//! GET  /health                  liveness
//! GET  /ready                   store ping, 503 when down
//! GET  /inventory/:product_id   {available, quantity}
//! POST /inventory               {product_id, quantity}
//! PUT  /inventory/:product_id   {quantity}
//! ```
//!
//! # Middleware (outermost first)
//!
//! 1. Correlation ID (`X-Correlation-ID` on every response)
//! 2. CORS (`OPTIONS` answered with 204 here)
//! 3. `tower_http` request tracing
//!
//! # Example
//!
//! ```ignore
//! use inventory_web::{AppState, router};
//!
//! let app = router(AppState::new(store));
//! axum::serve(listener, app).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod state;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

pub use error::AppError;
pub use extractors::{JsonBody, ProductPath};
pub use middleware::{CORRELATION_ID_HEADER, correlation_id_layer, cors_layer};
pub use state::AppState;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;

/// Inventory and health routes, without state or middleware.
///
/// Use with [`with_middleware`] when extra routes (such as `/metrics`) need
/// the same middleware stack.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/inventory", post(handlers::create_stock))
        .route(
            "/inventory/:product_id",
            get(handlers::get_stock).put(handlers::update_stock),
        )
}

/// Add the 404 fallback and the middleware stack.
pub fn with_middleware(router: Router) -> Router {
    router
        .fallback(route_not_found)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
        .layer(correlation_id_layer())
}

/// The complete inventory router.
pub fn router(state: AppState) -> Router {
    with_middleware(routes().with_state(state))
}

#[allow(clippy::unused_async)]
async fn route_not_found() -> AppError {
    AppError::new(
        axum::http::StatusCode::NOT_FOUND,
        "Route not found".to_string(),
        "NOT_FOUND".to_string(),
    )
}
