//! Prometheus metrics setup and metric definitions

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Histogram buckets (seconds) for request latency.
const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Install the Prometheus recorder and return a handle for rendering metrics.
pub fn install_prometheus_recorder() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .set_buckets(LATENCY_BUCKETS)?
        .install_recorder()?;
    Ok(handle)
}

/// Register metric descriptions and emit zero values so HELP/TYPE lines are
/// present from startup.
pub fn describe_metrics() {
    describe_counter!("userapi_http_requests_total", "Total number of HTTP requests");
    describe_histogram!(
        "userapi_http_request_duration_seconds",
        "HTTP request duration in seconds"
    );
    describe_gauge!(
        "userapi_http_requests_in_flight",
        "Number of HTTP requests currently being processed"
    );
    describe_counter!(
        "userapi_errors_total",
        "Error responses written, by error kind"
    );
    describe_counter!(
        "userapi_pool_acquire_failures_total",
        "Requests that could not obtain a backing-store handle"
    );

    gauge!("userapi_http_requests_in_flight").set(0.0);
    counter!("userapi_pool_acquire_failures_total").absolute(0);
    counter!("userapi_errors_total", "kind" => "internal_error").absolute(0);
}
