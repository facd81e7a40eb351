//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define gateway metrics (requests, latency, route misses, rule count)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `transcoder_requests_total` (counter): requests by method, status, selector
//! - `transcoder_request_duration_seconds` (histogram): latency distribution
//! - `transcoder_route_misses_total` (counter): requests no rule matched
//! - `transcoder_rules_loaded` (gauge): rules in the active rule set
//!
//! # Design Decisions
//! - Low-overhead metric updates (atomic operations)
//! - Selector label is `none` when no rule matched

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its HTTP listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record a finished request.
pub fn record_request(method: &str, status: u16, selector: &str, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
        ("selector", selector.to_string()),
    ];
    metrics::counter!("transcoder_requests_total", &labels).increment(1);
    metrics::histogram!("transcoder_request_duration_seconds", &labels)
        .record(start.elapsed().as_secs_f64());
}

/// Record a request that matched no rule.
pub fn record_route_miss(method: &str) {
    metrics::counter!("transcoder_route_misses_total", "method" => method.to_string()).increment(1);
}

/// Publish the size of the active rule set.
pub fn set_rules_loaded(count: usize) {
    metrics::gauge!("transcoder_rules_loaded").set(count as f64);
}
