//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define API metrics (requests, latency, rejections, panics)
//! - Expose a Prometheus-compatible scrape endpoint when enabled
//!
//! # Metrics
//! - `api_requests_total` (counter): requests by method, status
//! - `api_request_duration_seconds` (histogram): latency distribution
//! - `api_in_flight_requests` (gauge): requests currently executing
//! - `api_rate_limited_total` (counter): requests rejected with 429
//! - `api_panics_total` (counter): handler panics caught
//! - `api_edit_conflicts_total` (counter): updates rejected with 409
//! - `api_rate_limiter_clients` (gauge): clients tracked by the limiter
//!
//! # Design Decisions
//! - Recording is always safe: without an installed recorder every call
//!   is a no-op, so tests and disabled deployments pay nothing

use std::net::SocketAddr;
use std::time::Instant;

use axum::http::{Method, StatusCode};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the global recorder and start the scrape listener.
///
/// Must be called from inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record one completed request.
pub fn record_request(method: &Method, status: StatusCode, start: Instant) {
    let labels = [
        ("method", method.as_str().to_owned()),
        ("status", status.as_u16().to_string()),
    ];
    metrics::counter!("api_requests_total", &labels).increment(1);
    metrics::histogram!("api_request_duration_seconds", "method" => method.as_str().to_owned())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_in_flight(count: usize) {
    metrics::gauge!("api_in_flight_requests").set(count as f64);
}

pub fn record_rate_limited() {
    metrics::counter!("api_rate_limited_total").increment(1);
}

pub fn record_panic() {
    metrics::counter!("api_panics_total").increment(1);
}

pub fn record_edit_conflict() {
    metrics::counter!("api_edit_conflicts_total").increment(1);
}

pub fn record_tracked_clients(count: usize) {
    metrics::gauge!("api_rate_limiter_clients").set(count as f64);
}
