//! Error types for web handlers.
//!
//! [`AppError`] bridges store errors and HTTP responses by implementing
//! Axum's `IntoResponse`. Every error body has the same shape:
//!
//! ```json
//! { "code": "NOT_FOUND", "message": "Product with id 42 not found" }
//! ```

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use inventory_core::{ProductId, StockStoreError};
use serde::Serialize;
use std::fmt;

/// Application error type for web handlers.
///
/// # Examples
///
/// ```ignore
/// async fn handler(Path(id): Path<i64>) -> Result<Json<Stock>, AppError> {
///     let stock = store.get_stock(ProductId::new(id)).await?
///         .ok_or_else(|| AppError::not_found("Product", id))?;
///     Ok(Json(stock.into()))
/// }
/// ```
#[derive(Debug)]
pub struct AppError {
    /// HTTP status code
    status: StatusCode,
    /// Error message (user-facing)
    message: String,
    /// Error code (for client error handling)
    code: String,
    /// Internal error (for logging, not exposed to client)
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub const fn new(status: StatusCode, message: String, code: String) -> Self {
        Self {
            status,
            message,
            code,
            source: None,
        }
    }

    /// Attach the error that caused this one.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// Create a 400 Bad Request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            message.into(),
            "BAD_REQUEST".to_string(),
        )
    }

    /// Create a 404 Not Found error.
    #[must_use]
    pub fn not_found(resource: impl fmt::Display, id: impl fmt::Display) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            format!("{resource} with id {id} not found"),
            "NOT_FOUND".to_string(),
        )
    }

    /// HTTP status this error renders as.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse {
    /// Error code (for client error handling).
    code: String,
    /// Human-readable error message.
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match (&self.source, self.status.is_server_error()) {
            (Some(source), true) => tracing::error!(
                status = %self.status,
                code = %self.code,
                message = %self.message,
                error = %source,
                "Request failed"
            ),
            (None, true) => tracing::error!(
                status = %self.status,
                code = %self.code,
                message = %self.message,
                "Request failed"
            ),
            // Store failures on the CRUD routes render as 4xx but still
            // need to reach the logs.
            (Some(source), false) => tracing::warn!(
                status = %self.status,
                code = %self.code,
                message = %self.message,
                error = %source,
                "Request failed"
            ),
            (None, false) => {}
        }

        let body = ErrorResponse {
            code: self.code,
            message: self.message,
        };

        (self.status, Json(body)).into_response()
    }
}

/// Map store errors on a write (`POST`/`PUT`) to HTTP statuses.
///
/// The CRUD routes only answer 2xx/4xx: caller mistakes keep their own code,
/// an unreachable or failing store is also a 400. Details stay in the logs.
impl From<StockStoreError> for AppError {
    fn from(err: StockStoreError) -> Self {
        match err {
            StockStoreError::AlreadyExists(product_id) => Self::new(
                StatusCode::BAD_REQUEST,
                format!("Product {product_id} already exists"),
                "ALREADY_EXISTS".to_string(),
            ),
            StockStoreError::InvalidQuantity(quantity) => Self::new(
                StatusCode::BAD_REQUEST,
                format!("Invalid quantity {quantity}: must be non-negative"),
                "INVALID_QUANTITY".to_string(),
            ),
            other => Self::new(
                StatusCode::BAD_REQUEST,
                "Stock could not be written".to_string(),
                "STORE_ERROR".to_string(),
            )
            .with_source(other.into()),
        }
    }
}

impl AppError {
    /// Map a store error on a read to 404.
    ///
    /// A lookup that cannot be answered is reported the same way as a
    /// missing product.
    #[must_use]
    pub fn lookup_failed(product_id: ProductId, err: StockStoreError) -> Self {
        Self::not_found("Product", product_id).with_source(err.into())
    }
}
