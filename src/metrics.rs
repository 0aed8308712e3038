//! Prometheus metrics for application observability.
//!
//! The in-process [`MetricsCollector`](crate::monitoring::MetricsCollector)
//! answers `/metrics` and the periodic report; this module mirrors the same
//! events into the `metrics` facade so they can be scraped from the
//! dedicated Prometheus listener (default: `0.0.0.0:9090`).
//!
//! # Available Metrics
//!
//! ## Counters
//! - `portfolio_requests_total` - Completed requests (label: outcome = ok | error)
//! - `portfolio_slow_requests_total` - Requests above the slow threshold
//! - `portfolio_cache_lookups_total` - Response cache lookups (label: result = hit | miss)
//! - `portfolio_rate_limited_total` - Requests rejected by a limiter (label: policy)
//! - `portfolio_blocked_requests_total` - Requests rejected by request validation (label: reason)
//!
//! ## Histograms
//! - `portfolio_request_duration_seconds` - Request duration (labels: method, status)
//!
//! ## Gauges
//! - `portfolio_cache_entries` - Entries held by the response cache
//!
//! Recording functions are no-ops until [`init_metrics`] installs a recorder,
//! so tests never need to set one up.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{error, info};

/// Metric names as constants for consistency.
pub mod names {
    pub const REQUESTS_TOTAL: &str = "portfolio_requests_total";
    pub const SLOW_REQUESTS_TOTAL: &str = "portfolio_slow_requests_total";
    pub const CACHE_LOOKUPS_TOTAL: &str = "portfolio_cache_lookups_total";
    pub const RATE_LIMITED_TOTAL: &str = "portfolio_rate_limited_total";
    pub const BLOCKED_REQUESTS_TOTAL: &str = "portfolio_blocked_requests_total";
    pub const REQUEST_DURATION_SECONDS: &str = "portfolio_request_duration_seconds";
    pub const CACHE_ENTRIES: &str = "portfolio_cache_entries";
}

/// Initialize the Prometheus metrics exporter.
///
/// # Arguments
///
/// * `metrics_addr` - Address for the Prometheus metrics endpoint
///
/// # Returns
///
/// `Ok(())` if initialization succeeds, `Err` with message otherwise.
pub fn init_metrics(metrics_addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(names::REQUESTS_TOTAL, "Total number of completed requests");
    describe_counter!(
        names::SLOW_REQUESTS_TOTAL,
        "Requests that took longer than the slow request threshold"
    );
    describe_counter!(
        names::CACHE_LOOKUPS_TOTAL,
        "Response cache lookups by result"
    );
    describe_counter!(
        names::RATE_LIMITED_TOTAL,
        "Requests rejected because the client exceeded its quota"
    );
    describe_counter!(
        names::BLOCKED_REQUESTS_TOTAL,
        "Requests rejected by request validation"
    );

    describe_histogram!(
        names::REQUEST_DURATION_SECONDS,
        "HTTP request duration in seconds"
    );

    describe_gauge!(
        names::CACHE_ENTRIES,
        "Entries currently held by the response cache, including expired ones not yet swept"
    );

    info!(addr = %metrics_addr, "Prometheus metrics endpoint started");
    Ok(())
}

/// Try to initialize metrics, logging any errors but not failing.
pub fn try_init_metrics(metrics_addr: SocketAddr) {
    if let Err(e) = init_metrics(metrics_addr) {
        error!(error = %e, "Failed to initialize metrics, continuing without metrics");
    }
}

// =============================================================================
// Counter Recording Functions
// =============================================================================

/// Record a completed request.
pub fn record_request_completed(is_error: bool, slow: bool) {
    let outcome = if is_error { "error" } else { "ok" };
    counter!(names::REQUESTS_TOTAL, "outcome" => outcome).increment(1);
    if slow {
        counter!(names::SLOW_REQUESTS_TOTAL).increment(1);
    }
}

/// Record a response cache lookup.
pub fn record_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!(names::CACHE_LOOKUPS_TOTAL, "result" => result).increment(1);
}

/// Record a quota rejection for the named limiter policy.
pub fn record_rate_limited(policy: &'static str) {
    counter!(names::RATE_LIMITED_TOTAL, "policy" => policy).increment(1);
}

/// Record a request blocked by validation.
pub fn record_blocked_request(reason: &'static str) {
    counter!(names::BLOCKED_REQUESTS_TOTAL, "reason" => reason).increment(1);
}

// =============================================================================
// Histogram Recording Functions
// =============================================================================

/// Record HTTP request duration.
pub fn record_request_duration(method: &str, status: u16, duration_secs: f64) {
    histogram!(names::REQUEST_DURATION_SECONDS, "method" => method.to_string(), "status" => status.to_string())
        .record(duration_secs);
}

// =============================================================================
// Gauge Recording Functions
// =============================================================================

/// Update the cache size gauge.
pub fn set_cache_entries(entries: usize) {
    gauge!(names::CACHE_ENTRIES).set(entries as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    // Without an installed recorder these are no-ops; they must not panic.

    #[test]
    fn test_record_request_completed() {
        record_request_completed(false, false);
        record_request_completed(true, true);
    }

    #[test]
    fn test_record_cache_lookup() {
        record_cache_lookup(true);
        record_cache_lookup(false);
    }

    #[test]
    fn test_record_rejections() {
        record_rate_limited("contact");
        record_blocked_request("missing_user_agent");
    }

    #[test]
    fn test_record_request_duration() {
        record_request_duration("GET", 200, 0.012);
    }

    #[test]
    fn test_set_cache_entries() {
        set_cache_entries(42);
    }
}
