//! Builds the per-request [`RequestContext`]
//!
//! The context is stamped once with the state's clock, the request id and,
//! when a valid bearer token is present, the caller's claims. Missing or
//! invalid tokens leave the context without claims; authorization decisions
//! are made later by the handler that needs them.

use crate::context::RequestContext;
use crate::jwt::{Claims, JwtManager};
use crate::state::HasServices;
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use tokio::time::Instant;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Extract the Bearer token from the Authorization header, if any.
fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Claims from a verified bearer token whose validity window contains `now`.
pub fn bearer_claims(jwt: &JwtManager, headers: &HeaderMap, now: DateTime<Utc>) -> Option<Claims> {
    let token = extract_bearer_token(headers)?;
    match jwt.verify(token) {
        Ok(claims) if claims.is_valid_at(now) => Some(claims),
        Ok(claims) => {
            tracing::debug!(
                subject = claims.subject(),
                issued_at = ?claims.issued_at(),
                expires_at = ?claims.expires_at(),
                %now,
                "token outside validity window"
            );
            None
        }
        Err(err) => {
            tracing::debug!(error = %err, "token validation failed");
            None
        }
    }
}

fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Build the context for one request and store it in request extensions.
pub fn build_context<S: HasServices>(state: &S, headers: &HeaderMap) -> RequestContext {
    let now = state.clock().now();
    let deadline = Instant::now() + state.config().request_timeout();
    let ctx = RequestContext::new(now, request_id(headers)).with_deadline(deadline);

    match bearer_claims(state.jwt_manager(), headers, now) {
        Some(claims) => ctx.with_claims(claims),
        None => ctx,
    }
}

/// Middleware installing a [`RequestContext`] on every request.
pub async fn request_context_middleware<S: HasServices>(
    State(state): State<S>,
    mut request: Request,
    next: Next,
) -> Response {
    let ctx = build_context(&state, request.headers());
    request.extensions_mut().insert(ctx);
    next.run(request).await
}
