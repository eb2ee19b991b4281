//! Shared test helpers for HTTP integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use parley_core::clock::Clock;
use parley_test_support::{FixedClock, LoopbackTransport, SequenceRng};
use tower::ServiceExt;

use parley_server::config::AppConfig;
use parley_server::routes;
use parley_server::state::AppState;

/// Fixed timestamp used across all integration tests.
fn fixed_clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock(
        chrono::TimeZone::with_ymd_and_hms(&chrono::Utc, 2026, 1, 15, 10, 0, 0).unwrap(),
    ))
}

/// Configuration with a short RPC timeout so unanswered calls fail fast.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.rpc.max_wait_time_ms = 200;
    config
}

/// Wire the scene services over `transport` with a fixed clock and a
/// scripted RNG. The bus is not started.
pub fn build_test_state(transport: Arc<LoopbackTransport>) -> AppState {
    AppState::assemble(
        &test_config(),
        transport,
        fixed_clock(),
        Box::new(SequenceRng::new(vec![0])),
    )
}

/// Build the full app router. Uses the same route structure as `main.rs`.
pub fn build_test_app(state: &AppState) -> Router {
    routes::build_router(state.clone())
}

/// Send a POST request without a body and return the response.
pub async fn post_empty(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
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
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();

    (status, json)
}
