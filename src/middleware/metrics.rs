//! Per-request HTTP metrics and request id echo
//!
//! Every request is labelled with the route it matched, never the raw path,
//! so user ids do not become label values. The in-flight gauge is owned by a
//! guard and is released even when the client disconnects and the response
//! future is dropped.

use super::context::REQUEST_ID_HEADER;
use axum::{
    body::Body,
    http::{HeaderValue, Method, Request},
    response::Response,
};
use metrics::{counter, gauge, histogram};
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
    time::Instant,
};
use tower::{Layer, Service};
use tracing::Instrument;
use uuid::Uuid;

const REQUESTS_TOTAL: &str = "userapi_http_requests_total";
const REQUEST_DURATION: &str = "userapi_http_request_duration_seconds";
const IN_FLIGHT: &str = "userapi_http_requests_in_flight";

/// Status label for a request whose response was never produced.
const DROPPED: &str = "dropped";

/// Route template for a request path.
pub fn route_label(path: &str) -> &'static str {
    match path.trim_end_matches('/') {
        "/health" => "/health",
        "/ready" => "/ready",
        "/metrics" => "/metrics",
        "/v1/users" => "/v1/users",
        "/v1/users/token" => "/v1/users/token",
        other => match other.strip_prefix("/v1/users/") {
            Some(id) if !id.is_empty() && !id.contains('/') => "/v1/users/{id}",
            _ => "other",
        },
    }
}

/// Records one request: in-flight while alive, counted once at the end.
struct RequestMetrics {
    method: Method,
    route: &'static str,
    started: Instant,
    recorded: bool,
}

impl RequestMetrics {
    fn start(method: Method, route: &'static str) -> Self {
        gauge!(IN_FLIGHT).increment(1.0);
        Self {
            method,
            route,
            started: Instant::now(),
            recorded: false,
        }
    }

    fn record(&mut self, status: String) {
        if self.recorded {
            return;
        }
        self.recorded = true;
        let method = self.method.to_string();
        counter!(REQUESTS_TOTAL, "method" => method.clone(), "route" => self.route, "status" => status)
            .increment(1);
        histogram!(REQUEST_DURATION, "method" => method, "route" => self.route)
            .record(self.started.elapsed().as_secs_f64());
    }

    fn finish(mut self, response: &Response) {
        self.record(response.status().as_u16().to_string());
    }
}

impl Drop for RequestMetrics {
    fn drop(&mut self) {
        self.record(DROPPED.to_string());
        gauge!(IN_FLIGHT).decrement(1.0);
    }
}

/// Client-supplied request id, or a fresh UUID when absent or empty.
fn request_id(request: &Request<Body>) -> HeaderValue {
    request
        .headers()
        .get(REQUEST_ID_HEADER)
        .filter(|v| !v.is_empty())
        .cloned()
        .unwrap_or_else(|| {
            HeaderValue::try_from(Uuid::new_v4().to_string())
                .unwrap_or_else(|_| HeaderValue::from_static("unknown"))
        })
}

/// Tower layer wrapping the router with [`RequestMetricsService`].
#[derive(Clone, Copy, Default)]
pub struct RequestMetricsLayer;

impl<S> Layer<S> for RequestMetricsLayer {
    type Service = RequestMetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestMetricsService { inner }
    }
}

#[derive(Clone)]
pub struct RequestMetricsService<S> {
    inner: S,
}

impl<S> Service<Request<Body>> for RequestMetricsService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<Body>) -> Self::Future {
        let id = request_id(&request);
        request.headers_mut().insert(REQUEST_ID_HEADER, id.clone());

        let route = route_label(request.uri().path());
        let metrics = RequestMetrics::start(request.method().clone(), route);
        let span = tracing::info_span!(
            "request",
            request_id = id.to_str().unwrap_or_default(),
            route,
        );

        // The service that was polled ready handles this call.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(
            async move {
                let mut response = inner.call(request).await?;
                metrics.finish(&response);
                response.headers_mut().insert(REQUEST_ID_HEADER, id);
                Ok(response)
            }
            .instrument(span),
        )
    }
}
