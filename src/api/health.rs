//! Health check endpoints

use crate::context::RequestContext;
use crate::repository::ResourceScope;
use crate::state::HasServices;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness check endpoint. Ready when a handle can be taken from the pool.
pub async fn ready<S: HasServices>(State(state): State<S>, ctx: RequestContext) -> impl IntoResponse {
    match ResourceScope::acquire(state.pool(), &ctx, "health.ready").await {
        Ok(_scope) => (StatusCode::OK, "ready"),
        Err(err) => {
            tracing::warn!(error = %err, "readiness check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "not_ready")
        }
    }
}
