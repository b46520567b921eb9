//! Metrics collection and exposition.
//!
//! # Metrics
//! - `explorer_upstream_requests_total` (counter): upstream calls by tier, outcome
//! - `explorer_upstream_duration_seconds` (histogram): upstream latency by tier
//! - `explorer_decode_total` (counter): decoded transactions by pipeline path
//! - `explorer_tier_exhausted_total` (counter): calls where every tier failed
//! - `explorer_preferred_tier` (gauge): advisory tier preference, 1-based
//!
//! Recording goes through the `metrics` facade and is a no-op until
//! [`init_metrics`] installs the Prometheus recorder.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics recorder"),
    }
}

pub fn record_upstream(tier: &'static str, outcome: &'static str, started: Instant) {
    metrics::counter!("explorer_upstream_requests_total", "tier" => tier, "outcome" => outcome)
        .increment(1);
    metrics::histogram!("explorer_upstream_duration_seconds", "tier" => tier)
        .record(started.elapsed().as_secs_f64());
}

pub fn record_decode(path: &'static str) {
    metrics::counter!("explorer_decode_total", "path" => path).increment(1);
}

pub fn record_tier_exhausted(operation: &'static str) {
    metrics::counter!("explorer_tier_exhausted_total", "operation" => operation).increment(1);
}

pub fn record_preferred_tier(rank: u8) {
    metrics::gauge!("explorer_preferred_tier").set(rank as f64);
}
