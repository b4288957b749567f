//! Stock table endpoints.
//!
//! ```text
//! GET  /inventory/:product_id   → 200 {available, quantity} | 404
//! POST /inventory               → 201 | 400
//! PUT  /inventory/:product_id   → 200 | 400
//! ```
//!
//! Writes go straight to the store; the reservation pipeline sees them on
//! its next decrement.

use crate::WebResult;
use crate::error::AppError;
use crate::extractors::{JsonBody, ProductPath};
use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use chrono::{DateTime, Utc};
use inventory_core::{ProductId, StockRecord};
use serde::{Deserialize, Serialize};

/// Body of `GET /inventory/:product_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAvailability {
    /// Whether at least one unit is on hand
    pub available: bool,
    /// Units on hand
    pub quantity: i64,
}

/// Body of `POST /inventory`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateStockRequest {
    /// Product to create
    pub product_id: i64,
    /// Initial units on hand
    pub quantity: i64,
}

/// Body of `PUT /inventory/:product_id`.
///
/// The path names the product; a `product_id` in the body is accepted for
/// compatibility and ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStockRequest {
    /// Ignored in favour of the path segment
    #[serde(default)]
    pub product_id: Option<i64>,
    /// New units on hand
    pub quantity: i64,
}

/// Stock row as returned by the write endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockResponse {
    /// Product id
    pub product_id: i64,
    /// Units on hand
    pub quantity: i64,
    /// Last mutation time
    pub updated_at: DateTime<Utc>,
}

impl From<StockRecord> for StockResponse {
    fn from(record: StockRecord) -> Self {
        Self {
            product_id: record.product_id.get(),
            quantity: record.quantity,
            updated_at: record.updated_at,
        }
    }
}

/// `GET /inventory/:product_id`
///
/// # Errors
///
/// - 404 if the product has no row, the id is not a number, or the store
///   cannot answer
pub async fn get_stock(
    State(state): State<AppState>,
    product: Result<ProductPath, AppError>,
) -> WebResult<Json<StockAvailability>> {
    let ProductPath(product_id) = product.map_err(|rejection| {
        tracing::debug!(error = %rejection, "Unparseable product id");
        AppError::new(
            StatusCode::NOT_FOUND,
            "Product not found".to_string(),
            "NOT_FOUND".to_string(),
        )
    })?;

    let quantity = state
        .store
        .get_quantity(product_id)
        .await
        .map_err(|e| AppError::lookup_failed(product_id, e))?
        .ok_or_else(|| AppError::not_found("Product", product_id))?;

    Ok(Json(StockAvailability {
        available: quantity > 0,
        quantity,
    }))
}

/// `POST /inventory`
///
/// # Errors
///
/// - 400 for malformed JSON, a negative quantity, an existing product or a
///   store failure
pub async fn create_stock(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<CreateStockRequest>,
) -> WebResult<(StatusCode, Json<StockResponse>)> {
    let product_id = ProductId::new(request.product_id);
    let record = state
        .store
        .create_stock(product_id, request.quantity)
        .await?;

    metrics::counter!("inventory_stock_writes_total", "operation" => "create").increment(1);
    tracing::info!(
        product_id = %product_id,
        quantity = record.quantity,
        "Stock created"
    );

    Ok((StatusCode::CREATED, Json(record.into())))
}

/// `PUT /inventory/:product_id`
///
/// Overwrites the quantity; it is not a delta.
///
/// # Errors
///
/// - 400 for malformed JSON, a negative quantity, an unknown product or a
///   store failure
pub async fn update_stock(
    State(state): State<AppState>,
    ProductPath(product_id): ProductPath,
    JsonBody(request): JsonBody<UpdateStockRequest>,
) -> WebResult<Json<StockResponse>> {
    if let Some(body_id) = request.product_id.filter(|id| *id != product_id.get()) {
        tracing::debug!(
            product_id = %product_id,
            body_product_id = body_id,
            "Ignoring product_id in body, path wins"
        );
    }

    let record = state
        .store
        .set_quantity(product_id, request.quantity)
        .await?
        .ok_or_else(|| {
            AppError::new(
                StatusCode::BAD_REQUEST,
                format!("Product {product_id} does not exist"),
                "UNKNOWN_PRODUCT".to_string(),
            )
        })?;

    metrics::counter!("inventory_stock_writes_total", "operation" => "update").increment(1);
    tracing::info!(
        product_id = %product_id,
        quantity = record.quantity,
        "Stock updated"
    );

    Ok(Json(record.into()))
}
