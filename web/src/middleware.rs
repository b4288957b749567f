//! Tower middleware for the inventory router.
//!
//! - **Correlation ID**: read `X-Correlation-ID` or generate one, keep it in
//!   the request extensions, open a tracing span with it, echo it back
//! - **CORS**: fixed permissive headers on every response, and `OPTIONS`
//!   answered with 204 before routing
//!
//! # Example
//!
//! ```ignore
//! use inventory_web::middleware::{correlation_id_layer, cors_layer};
//!
//! let app = Router::new()
//!     .route("/inventory/:product_id", get(get_stock))
//!     .layer(cors_layer())
//!     .layer(correlation_id_layer());
//! ```

use axum::{
    body::Body,
    extract::Request,
    http::{HeaderName, HeaderValue, Method, StatusCode, header},
    response::Response,
};
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::Instrument;
use uuid::Uuid;

/// Header name for correlation ID.
pub const CORRELATION_ID_HEADER: &str = "X-Correlation-ID";

/// Methods advertised in `Access-Control-Allow-Methods`.
pub const CORS_ALLOWED_METHODS: &str = "GET, POST, PUT, OPTIONS";

/// Headers advertised in `Access-Control-Allow-Headers`.
pub const CORS_ALLOWED_HEADERS: &str = "Content-Type";

type BoxFuture<T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send>>;

/// Create a layer that adds correlation ID tracking to all requests.
#[must_use]
pub const fn correlation_id_layer() -> CorrelationIdLayer {
    CorrelationIdLayer
}

/// Layer for correlation ID tracking.
#[derive(Clone, Debug)]
pub struct CorrelationIdLayer;

impl<S> Layer<S> for CorrelationIdLayer {
    type Service = CorrelationIdMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CorrelationIdMiddleware { inner }
    }
}

/// Middleware service for correlation ID tracking.
#[derive(Clone, Debug)]
pub struct CorrelationIdMiddleware<S> {
    inner: S,
}

impl<S> Service<Request> for CorrelationIdMiddleware<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        let correlation_id = req
            .headers()
            .get(CORRELATION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .unwrap_or_else(Uuid::new_v4);

        req.extensions_mut().insert(correlation_id);

        let span = tracing::info_span!(
            "http_request",
            correlation_id = %correlation_id,
            method = %req.method(),
            uri = %req.uri(),
        );

        let fut = self.inner.call(req);

        Box::pin(async move {
            let mut response = fut.instrument(span).await?;

            if let Ok(header_value) = HeaderValue::from_str(&correlation_id.to_string()) {
                response
                    .headers_mut()
                    .insert(CORRELATION_ID_HEADER, header_value);
            }

            Ok(response)
        })
    }
}

/// Create the CORS layer.
///
/// `tower_http::cors` only answers requests that look like browser preflights
/// and only sets the allow-methods header on those; inventory clients expect
/// the three headers on every response and a 204 for any `OPTIONS`.
#[must_use]
pub const fn cors_layer() -> CorsLayer {
    CorsLayer
}

/// Layer adding the CORS headers.
#[derive(Clone, Debug)]
pub struct CorsLayer;

impl<S> Layer<S> for CorsLayer {
    type Service = CorsMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CorsMiddleware { inner }
    }
}

/// Middleware service adding the CORS headers.
#[derive(Clone, Debug)]
pub struct CorsMiddleware<S> {
    inner: S,
}

impl<S> Service<Request> for CorsMiddleware<S>
where
    S: Service<Request, Response = Response, Error = Infallible> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = BoxFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        if req.method() == Method::OPTIONS {
            let mut response = Response::new(Body::empty());
            *response.status_mut() = StatusCode::NO_CONTENT;
            apply_cors_headers(&mut response);
            return Box::pin(std::future::ready(Ok(response)));
        }

        let fut = self.inner.call(req);

        Box::pin(async move {
            let mut response = fut.await?;
            apply_cors_headers(&mut response);
            Ok(response)
        })
    }
}

fn apply_cors_headers(response: &mut Response) {
    let headers = response.headers_mut();
    let entries: [(HeaderName, &'static str); 3] = [
        (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
        (header::ACCESS_CONTROL_ALLOW_METHODS, CORS_ALLOWED_METHODS),
        (header::ACCESS_CONTROL_ALLOW_HEADERS, CORS_ALLOWED_HEADERS),
    ];
    for (name, value) in entries {
        headers.insert(name, HeaderValue::from_static(value));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use axum::{Router, routing::get};
    use tower::ServiceExt;

    fn request(method: Method, uri: &str) -> Request {
        axum::http::Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    fn test_app() -> Router {
        Router::new()
            .route("/test", get(|| async { "ok" }))
            .layer(cors_layer())
            .layer(correlation_id_layer())
    }

    #[tokio::test]
    async fn test_correlation_id_generated_if_missing() {
        let response = test_app()
            .oneshot(request(Method::GET, "/test"))
            .await
            .unwrap();

        let correlation_id = response
            .headers()
            .get(CORRELATION_ID_HEADER)
            .expect("Correlation ID header should be present");

        assert!(Uuid::parse_str(correlation_id.to_str().unwrap()).is_ok());
    }

    #[tokio::test]
    async fn test_correlation_id_preserved_from_request() {
        let request_uuid = Uuid::new_v4();
        let mut req = request(Method::GET, "/test");
        req.headers_mut().insert(
            CORRELATION_ID_HEADER,
            HeaderValue::from_str(&request_uuid.to_string()).unwrap(),
        );

        let response = test_app().oneshot(req).await.unwrap();

        let response_id = response
            .headers()
            .get(CORRELATION_ID_HEADER)
            .expect("Correlation ID header should be present")
            .to_str()
            .unwrap();
        assert_eq!(response_id, request_uuid.to_string());
    }

    #[tokio::test]
    async fn test_invalid_uuid_generates_new() {
        let mut req = request(Method::GET, "/test");
        req.headers_mut()
            .insert(CORRELATION_ID_HEADER, HeaderValue::from_static("not-a-uuid"));

        let response = test_app().oneshot(req).await.unwrap();

        let uuid_str = response
            .headers()
            .get(CORRELATION_ID_HEADER)
            .expect("Correlation ID header should be present")
            .to_str()
            .unwrap();
        assert!(Uuid::parse_str(uuid_str).is_ok());
    }

    #[tokio::test]
    async fn cors_headers_on_routed_responses() {
        let response = test_app()
            .oneshot(request(Method::GET, "/test"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_METHODS],
            "GET, POST, PUT, OPTIONS"
        );
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], "Content-Type");
    }

    #[tokio::test]
    async fn options_short_circuits_with_no_content() {
        // No OPTIONS route exists; the layer must answer before routing.
        let response = test_app()
            .oneshot(request(Method::OPTIONS, "/anything"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert!(response.headers().contains_key(CORRELATION_ID_HEADER));
    }
}
