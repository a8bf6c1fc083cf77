//! Health and readiness HTTP tests

use super::{build_test_router, get_json, TestAppState};
use axum::http::StatusCode;
use userapi_core::api::health::HealthResponse;

#[tokio::test]
async fn test_health_returns_version() {
    let app = build_test_router(TestAppState::new());

    let res = get_json::<HealthResponse>(&app, "/health", None).await;

    assert_eq!(res.status, StatusCode::OK);
    let body = res.body.unwrap();
    assert_eq!(body.status, "healthy");
    assert_eq!(body.version, env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_ready_acquires_and_releases() {
    let state = TestAppState::new();
    let app = build_test_router(state.clone());

    let res = get_json::<serde_json::Value>(&app, "/ready", None).await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(state.pool.acquired(), 1);
    assert_eq!(state.pool.released(), 1);
}

#[tokio::test]
async fn test_ready_reports_exhausted_pool() {
    let state = TestAppState::new();
    state.pool.exhaust();
    let app = build_test_router(state);

    let res = get_json::<serde_json::Value>(&app, "/ready", None).await;

    assert_eq!(res.status, StatusCode::SERVICE_UNAVAILABLE);
}
