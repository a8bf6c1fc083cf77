//! HTTP middleware for the User API
//!
//! - Request context construction (clock, request id, bearer claims)
//! - Request ID echo and per-route request metrics

pub mod context;
pub mod metrics;

pub use context::request_context_middleware;
pub use metrics::RequestMetricsLayer;
