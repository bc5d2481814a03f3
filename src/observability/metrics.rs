//! Metrics collection and exposition.
//!
//! # Metrics
//! - `http_requests_total` (counter): requests by method and status
//! - `http_request_duration_seconds` (histogram): latency distribution
//! - `rate_limit_checks_total` (counter): checks by outcome
//! - `rate_limit_fail_open_total` (counter): checks skipped on store errors
//! - `cache_lookups_total` (counter): cache-aside lookups by result
//! - `cache_invalidated_keys_total` (counter): keys removed per model
//!
//! Recording is a no-op until `init_metrics` installs the recorder.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
    ];
    counter!("http_requests_total", &labels).increment(1);
    histogram!("http_request_duration_seconds", &labels).record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limit_check(allowed: bool) {
    let outcome = if allowed { "allowed" } else { "limited" };
    counter!("rate_limit_checks_total", "outcome" => outcome).increment(1);
}

pub fn record_rate_limit_fail_open() {
    counter!("rate_limit_fail_open_total").increment(1);
}

pub fn record_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("cache_lookups_total", "result" => result).increment(1);
}

pub fn record_cache_invalidation(model: &str, removed: u64) {
    counter!("cache_invalidated_keys_total", "model" => model.to_string()).increment(removed);
}
