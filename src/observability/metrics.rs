//! Metrics collection and exposition.
//!
//! # Metrics
//! - `http_connections_accepted_total` (counter)
//! - `http_accept_errors_total` (counter)
//! - `http_parse_failures_total` (counter)
//! - `http_requests_total` (counter): parsed requests by method
//! - `http_active_connections` (gauge): maintained by `net::connection`
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint. Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_accept() {
    metrics::counter!("http_connections_accepted_total").increment(1);
}

pub fn record_accept_error() {
    metrics::counter!("http_accept_errors_total").increment(1);
}

pub fn record_parse_failure() {
    metrics::counter!("http_parse_failures_total").increment(1);
}

pub fn record_request(method: &str) {
    metrics::counter!("http_requests_total", "method" => method.to_string()).increment(1);
}
