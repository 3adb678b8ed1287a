//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by method, status
//! - `proxy_request_duration_seconds` (histogram): latency distribution
//! - `proxy_backend_failures_total` (counter): failures remembered per host
//! - `proxy_retries_total` (counter): extra selection rounds per group
//! - `proxy_unmatched_total` (counter): requests handed to the next handler
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "proxy_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("proxy_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_backend_failure(host: &str) {
    counter!("proxy_backend_failures_total", "host" => host.to_string()).increment(1);
}

pub fn record_retry(upstream: &str) {
    counter!("proxy_retries_total", "upstream" => upstream.to_string()).increment(1);
}

pub fn record_unmatched() {
    counter!("proxy_unmatched_total").increment(1);
}
