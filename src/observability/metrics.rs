//! Metrics collection and exposition.
//!
//! # Metrics
//! - `http_requests_total` (counter): HTTP requests by status, method, path
//! - `http_request_duration_seconds` (histogram): HTTP latency by status, method, path
//! - `bus_requests_total` (counter): dispatched bus requests by endpoint, outcome
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder it is a no-op
//! - The Prometheus exporter serves its own scrape endpoint

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one finished HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, start: Instant) {
    let status = status.to_string();

    metrics::counter!(
        "http_requests_total",
        "status" => status.clone(),
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .increment(1);

    metrics::histogram!(
        "http_request_duration_seconds",
        "status" => status,
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

/// Record one dispatched bus request.
pub fn record_bus_request(endpoint: &str, outcome: &'static str) {
    metrics::counter!(
        "bus_requests_total",
        "endpoint" => endpoint.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}
