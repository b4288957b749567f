//! Custom Axum extractors.
//!
//! - [`ProductPath`]: the `{product_id}` path segment as a [`ProductId`]
//! - [`JsonBody`]: a JSON body whose rejections render as [`AppError`]
//!
//! Axum's stock `Json` and `Path` reject with plain-text bodies and a mix of
//! 400/415/422 statuses. The wrappers here turn every malformed request into
//! a 400 with the usual `{code, message}` body.
//!
//! Inventory clients post JSON without always setting `Content-Type`, so
//! [`JsonBody`] parses the raw body instead of going through `Json`.
//!
//! # Examples
//!
//! ```ignore
//! async fn handler(
//!     ProductPath(product_id): ProductPath,
//!     JsonBody(body): JsonBody<UpdateStockRequest>,
//! ) -> Result<Json<StockResponse>, AppError> {
//!     ...
//! }
//! ```

use crate::error::AppError;
use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Path, Request},
    http::request::Parts,
};
use inventory_core::ProductId;
use serde::de::DeserializeOwned;

/// Product id taken from the request path.
#[derive(Debug, Clone, Copy)]
pub struct ProductPath(pub ProductId);

#[async_trait]
impl<S> FromRequestParts<S> for ProductPath
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(product_id) = Path::<i64>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| AppError::bad_request(rejection.body_text()))?;

        Ok(Self(ProductId::new(product_id)))
    }
}

/// JSON request body that rejects with a 400 [`AppError`].
///
/// The `Content-Type` header is not checked; any body that parses as `T` is
/// accepted.
#[derive(Debug, Clone)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|rejection| AppError::bad_request(rejection.body_text()))?;

        serde_json::from_slice(&bytes)
            .map(Self)
            .map_err(|e| AppError::bad_request(format!("Invalid JSON body: {e}")))
    }
}
