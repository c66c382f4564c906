//! Metrics collection and exposition.
//!
//! # Metrics
//! - `resilience_calls_total{endpoint,function,outcome}` (counter)
//! - `resilience_call_duration_seconds{endpoint}` (histogram)
//! - `resilience_tokens_total{endpoint}` (counter)
//! - `resilience_endpoint_status{endpoint,status}` (gauge): 1 for the current status
//! - `resilience_dlq_size` (gauge)
//! - `resilience_dlq_events_total{event}` (counter): added, processed, removed, expired
//! - `resilience_cache_entries` (gauge)
//! - `resilience_cache_lookups_total{result}` (counter): hit, miss
//!
//! Without an installed recorder every helper is a no-op.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;

use crate::health::HealthStatus;

const CALL_LATENCY_BUCKETS: &[f64] = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0];

/// Install the Prometheus recorder and its scrape listener on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    let builder = match PrometheusBuilder::new().set_buckets(CALL_LATENCY_BUCKETS) {
        Ok(builder) => builder,
        Err(e) => {
            tracing::error!(error = %e, "Invalid histogram buckets");
            return;
        }
    };

    if let Err(e) = builder.with_http_listener(addr).install() {
        tracing::error!(error = %e, address = %addr, "Failed to install Prometheus exporter");
        return;
    }

    describe_counter!("resilience_calls_total", "Protected calls by terminal outcome");
    describe_histogram!("resilience_call_duration_seconds", "Protected call duration in seconds");
    describe_counter!("resilience_tokens_total", "Tokens consumed by protected calls");
    describe_gauge!("resilience_endpoint_status", "1 for the endpoint's current health status");
    describe_gauge!("resilience_dlq_size", "Dead-letter queue length");
    describe_counter!("resilience_dlq_events_total", "Dead-letter queue events");
    describe_gauge!("resilience_cache_entries", "Fallback cache entries");
    describe_counter!("resilience_cache_lookups_total", "Fallback cache lookups");

    tracing::info!(address = %addr, "Prometheus metrics exporter listening");
}

/// Record one terminal call outcome.
pub fn record_call(endpoint: &str, function: &str, outcome: &'static str, duration: Duration, tokens: Option<u64>) {
    let labels = [
        ("endpoint", endpoint.to_string()),
        ("function", function.to_string()),
        ("outcome", outcome.to_string()),
    ];
    counter!("resilience_calls_total", &labels).increment(1);
    histogram!("resilience_call_duration_seconds", "endpoint" => endpoint.to_string()).record(duration.as_secs_f64());
    if let Some(tokens) = tokens {
        counter!("resilience_tokens_total", "endpoint" => endpoint.to_string()).increment(tokens);
    }
}

pub fn record_endpoint_status(endpoint: &str, current: HealthStatus) {
    for status in HealthStatus::ALL {
        let value = if status == current { 1.0 } else { 0.0 };
        gauge!(
            "resilience_endpoint_status",
            "endpoint" => endpoint.to_string(),
            "status" => status.as_str()
        )
        .set(value);
    }
}

pub fn record_dlq_size(size: usize) {
    gauge!("resilience_dlq_size").set(size as f64);
}

pub fn record_dlq_event(event: &'static str) {
    counter!("resilience_dlq_events_total", "event" => event).increment(1);
}

pub fn record_cache_size(entries: usize) {
    gauge!("resilience_cache_entries").set(entries as f64);
}

pub fn record_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("resilience_cache_lookups_total", "result" => result).increment(1);
}
