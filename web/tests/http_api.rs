//! End-to-end tests of the inventory router against the in-memory store.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use axum::http::{HeaderName, HeaderValue, Method, StatusCode, header};
use axum_test::TestServer;
use inventory_testing::InMemoryStockStore;
use inventory_web::handlers::inventory::{StockAvailability, StockResponse};
use inventory_web::{AppState, CORRELATION_ID_HEADER, router};
use serde_json::{Value, json};
use std::sync::Arc;

fn server(store: &InMemoryStockStore) -> TestServer {
    let app = router(AppState::new(Arc::new(store.clone())));
    TestServer::new(app).unwrap()
}

fn assert_cors(headers: &axum::http::HeaderMap) {
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(
        headers[header::ACCESS_CONTROL_ALLOW_METHODS],
        "GET, POST, PUT, OPTIONS"
    );
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], "Content-Type");
}

#[tokio::test]
async fn get_reports_quantity_and_availability() {
    let store = InMemoryStockStore::new().with_stock(42, 10).with_stock(7, 0);
    let server = server(&store);

    let response = server.get("/inventory/42").await;
    response.assert_status(StatusCode::OK);
    assert_eq!(
        response.json::<StockAvailability>(),
        StockAvailability {
            available: true,
            quantity: 10
        }
    );

    let response = server.get("/inventory/7").await;
    assert_eq!(
        response.json::<StockAvailability>(),
        StockAvailability {
            available: false,
            quantity: 0
        }
    );
}

#[tokio::test]
async fn get_unknown_product_is_not_found() {
    let store = InMemoryStockStore::new();
    let server = server(&store);

    let response = server.get("/inventory/999").await;

    response.assert_status(StatusCode::NOT_FOUND);
    let body = response.json::<Value>();
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn get_with_non_numeric_id_is_not_found() {
    let store = InMemoryStockStore::new();
    let server = server(&store);

    let response = server.get("/inventory/abc").await;

    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(response.json::<Value>()["code"], "NOT_FOUND");
}

#[tokio::test]
async fn post_creates_stock() {
    let store = InMemoryStockStore::new();
    let server = server(&store);

    let response = server
        .post("/inventory")
        .json(&json!({"product_id": 42, "quantity": 10}))
        .await;

    response.assert_status(StatusCode::CREATED);
    let created = response.json::<StockResponse>();
    assert_eq!(created.product_id, 42);
    assert_eq!(created.quantity, 10);
    assert_eq!(store.quantity_of(42), Some(10));
}

#[tokio::test]
async fn post_rejects_duplicates_negatives_and_garbage() {
    let store = InMemoryStockStore::new().with_stock(42, 10);
    let server = server(&store);

    let duplicate = server
        .post("/inventory")
        .json(&json!({"product_id": 42, "quantity": 1}))
        .await;
    duplicate.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(duplicate.json::<Value>()["code"], "ALREADY_EXISTS");

    let negative = server
        .post("/inventory")
        .json(&json!({"product_id": 43, "quantity": -1}))
        .await;
    negative.assert_status(StatusCode::BAD_REQUEST);

    let garbage = server.post("/inventory").text("{product_id: ").await;
    garbage.assert_status(StatusCode::BAD_REQUEST);

    assert_eq!(store.quantity_of(42), Some(10));
    assert_eq!(store.quantity_of(43), None);
}

#[tokio::test]
async fn put_overwrites_quantity() {
    let store = InMemoryStockStore::new().with_stock(42, 10);
    let server = server(&store);

    let response = server
        .put("/inventory/42")
        .json(&json!({"product_id": 42, "quantity": 3}))
        .await;

    response.assert_status(StatusCode::OK);
    assert_eq!(response.json::<StockResponse>().quantity, 3);
    assert_eq!(store.quantity_of(42), Some(3));
}

#[tokio::test]
async fn put_uses_the_path_product() {
    let store = InMemoryStockStore::new().with_stock(42, 10).with_stock(1, 1);
    let server = server(&store);

    server
        .put("/inventory/42")
        .json(&json!({"product_id": 1, "quantity": 0}))
        .await
        .assert_status(StatusCode::OK);

    assert_eq!(store.quantity_of(42), Some(0));
    assert_eq!(store.quantity_of(1), Some(1));
}

#[tokio::test]
async fn put_unknown_or_invalid_is_rejected() {
    let store = InMemoryStockStore::new().with_stock(42, 10);
    let server = server(&store);

    let unknown = server
        .put("/inventory/999")
        .json(&json!({"quantity": 3}))
        .await;
    unknown.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(unknown.json::<Value>()["code"], "UNKNOWN_PRODUCT");
    assert_eq!(store.quantity_of(999), None);

    server
        .put("/inventory/abc")
        .json(&json!({"quantity": 3}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    server
        .put("/inventory/42")
        .json(&json!({"quantity": -5}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    server
        .put("/inventory/42")
        .text("not json")
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    assert_eq!(store.quantity_of(42), Some(10));
}

#[tokio::test]
async fn store_outage_keeps_crud_answers_in_the_4xx_range() {
    let store = InMemoryStockStore::new().with_stock(42, 10);
    store.set_unavailable(true);
    let server = server(&store);

    let read = server.get("/inventory/42").await;
    read.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(read.json::<Value>()["code"], "NOT_FOUND");

    let create = server
        .post("/inventory")
        .json(&json!({"product_id": 43, "quantity": 1}))
        .await;
    create.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(create.json::<Value>()["code"], "STORE_ERROR");

    let update = server
        .put("/inventory/42")
        .json(&json!({"quantity": 1}))
        .await;
    update.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(update.json::<Value>()["code"], "STORE_ERROR");

    // Only readiness reports the outage as such.
    server
        .get("/ready")
        .await
        .assert_status(StatusCode::SERVICE_UNAVAILABLE);
    server.get("/health").await.assert_status(StatusCode::OK);

    store.set_unavailable(false);
    assert_eq!(store.quantity_of(42), Some(10));
    assert_eq!(store.quantity_of(43), None);
}

#[tokio::test]
async fn every_response_carries_cors_and_correlation_headers() {
    let store = InMemoryStockStore::new().with_stock(42, 10);
    let server = server(&store);

    for response in [
        server.get("/inventory/42").await,
        server.get("/inventory/999").await,
        server.get("/no/such/route").await,
        server.get("/health").await,
    ] {
        assert_cors(response.headers());
        assert!(response.headers().contains_key(CORRELATION_ID_HEADER));
    }
}

#[tokio::test]
async fn options_is_answered_with_no_content() {
    let store = InMemoryStockStore::new();
    let server = server(&store);

    let response = server
        .method(Method::OPTIONS, "/inventory")
        .add_header(
            HeaderName::from_static("access-control-request-method"),
            HeaderValue::from_static("POST"),
        )
        .await;

    response.assert_status(StatusCode::NO_CONTENT);
    assert_cors(response.headers());
}

#[tokio::test]
async fn unknown_routes_are_not_found() {
    let store = InMemoryStockStore::new();
    let server = server(&store);

    let response = server.get("/inventories").await;

    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(response.json::<Value>()["code"], "NOT_FOUND");
}
