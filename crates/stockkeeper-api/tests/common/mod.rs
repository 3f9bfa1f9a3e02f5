//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use stockkeeper_core::config::{ConcurrencyConfig, StrategyKind};
use stockkeeper_core::lock::LeaseLockService;
use stockkeeper_core::store::StockStore;
use stockkeeper_inventory::application::concurrency::{SharedRng, build_strategy};
use stockkeeper_store::memory::{InMemoryLeaseLockService, InMemoryStockStore};
use stockkeeper_test_support::{FixedClock, MockRng};
use tower::ServiceExt;

use stockkeeper_api::state::AppState;

/// Build the full app over a fresh in-memory store with the given strategy.
pub fn build_test_app(strategy: StrategyKind) -> Router {
    build_test_app_with_store(strategy, Arc::new(InMemoryStockStore::new()))
}

/// Build the full app over `store`, with a deterministic RNG and a frozen
/// lease clock.
pub fn build_test_app_with_store(strategy: StrategyKind, store: Arc<dyn StockStore>) -> Router {
    let rng: SharedRng = Arc::new(Mutex::new(MockRng));
    let leases: Arc<dyn LeaseLockService> =
        Arc::new(InMemoryLeaseLockService::new(Arc::new(FixedClock::epoch())));
    let strategy = build_strategy(&ConcurrencyConfig::for_strategy(strategy), Some(leases), rng)
        .unwrap();
    stockkeeper_api::app(AppState::new(store, strategy))
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();

    send(app, request).await
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    send(app, request).await
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if body_bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body_bytes).unwrap_or(serde_json::Value::Null)
    };

    (status, json)
}
