//! Process-wide request metrics.
//!
//! [`MetricsCollector`] keeps the counters behind the `/metrics` endpoint and
//! the periodic metrics report: request and error totals, cache hits and
//! misses, slow requests, and a moving average over the most recent
//! latencies. It lives in the application context rather than a global, so
//! each test can build its own.
//!
//! Every update is also forwarded to the Prometheus facade in
//! [`crate::metrics`].

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::metrics;

/// Snapshot of process-level figures.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemMetrics {
    pub uptime_seconds: u64,
    pub memory: MemoryUsage,
    pub timestamp: DateTime<Utc>,
}

/// Memory figures for the current process, when the platform exposes them.
#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryUsage {
    pub resident_bytes: Option<u64>,
    pub virtual_bytes: Option<u64>,
}

impl MemoryUsage {
    /// Read the current process's memory usage.
    ///
    /// On Linux this parses `/proc/self/status`; elsewhere both fields are
    /// `None`.
    pub fn current() -> Self {
        #[cfg(target_os = "linux")]
        {
            match std::fs::read_to_string("/proc/self/status") {
                Ok(status) => Self::from_proc_status(&status),
                Err(_) => Self::default(),
            }
        }

        #[cfg(not(target_os = "linux"))]
        {
            Self::default()
        }
    }

    /// Parse `VmRSS` / `VmSize` lines (reported in kB).
    fn from_proc_status(status: &str) -> Self {
        let field = |name: &str| {
            status
                .lines()
                .find_map(|line| line.strip_prefix(name))
                .and_then(|rest| rest.split_whitespace().next())
                .and_then(|kb| kb.parse::<u64>().ok())
                .map(|kb| kb * 1024)
        };

        Self {
            resident_bytes: field("VmRSS:"),
            virtual_bytes: field("VmSize:"),
        }
    }
}

/// Snapshot of request counters.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationMetrics {
    pub request_count: u64,
    pub error_count: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    /// Moving average over the retained latency window, in milliseconds.
    pub avg_response_time_ms: f64,
    pub slow_requests: u64,
    /// Cache hit rate as a percentage; 0 when no lookups happened.
    pub cache_hit_rate: f64,
}

/// Combined payload served by `GET /metrics`.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub system: SystemMetrics,
    pub application: ApplicationMetrics,
}

/// Bounded window of recent latencies, oldest first.
struct LatencyWindow {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl LatencyWindow {
    fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn push(&mut self, millis: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(millis);
    }

    fn average(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }

    fn clear(&mut self) {
        self.samples.clear();
    }
}

pub struct MetricsCollector {
    request_count: AtomicU64,
    error_count: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    slow_requests: AtomicU64,
    latencies: Mutex<LatencyWindow>,
    slow_threshold: Duration,
    started_at: Instant,
}

impl MetricsCollector {
    /// Create a collector keeping `latency_window` samples for the average.
    ///
    /// A zero window is treated as 1.
    pub fn new(latency_window: usize, slow_threshold: Duration) -> Self {
        Self {
            request_count: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            slow_requests: AtomicU64::new(0),
            latencies: Mutex::new(LatencyWindow::new(latency_window.max(1))),
            slow_threshold,
            started_at: Instant::now(),
        }
    }

    pub fn slow_threshold(&self) -> Duration {
        self.slow_threshold
    }

    /// Record one completed request.
    pub fn record_request(&self, duration: Duration, is_error: bool) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        if is_error {
            self.error_count.fetch_add(1, Ordering::Relaxed);
        }

        self.lock_latencies().push(duration_millis(duration));

        let slow = duration > self.slow_threshold;
        if slow {
            self.slow_requests.fetch_add(1, Ordering::Relaxed);
        }

        metrics::record_request_completed(is_error, slow);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
        metrics::record_cache_lookup(true);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
        metrics::record_cache_lookup(false);
    }

    /// Hit rate as a percentage of all cache lookups.
    pub fn cache_hit_rate(&self) -> f64 {
        hit_rate(
            self.cache_hits.load(Ordering::Relaxed),
            self.cache_misses.load(Ordering::Relaxed),
        )
    }

    pub fn system_metrics(&self) -> SystemMetrics {
        SystemMetrics {
            uptime_seconds: self.started_at.elapsed().as_secs(),
            memory: MemoryUsage::current(),
            timestamp: Utc::now(),
        }
    }

    pub fn application_metrics(&self) -> ApplicationMetrics {
        let cache_hits = self.cache_hits.load(Ordering::Relaxed);
        let cache_misses = self.cache_misses.load(Ordering::Relaxed);

        ApplicationMetrics {
            request_count: self.request_count.load(Ordering::Relaxed),
            error_count: self.error_count.load(Ordering::Relaxed),
            cache_hits,
            cache_misses,
            avg_response_time_ms: self.lock_latencies().average(),
            slow_requests: self.slow_requests.load(Ordering::Relaxed),
            cache_hit_rate: hit_rate(cache_hits, cache_misses),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            system: self.system_metrics(),
            application: self.application_metrics(),
        }
    }

    /// Zero all counters and clear the latency window. Uptime is kept.
    pub fn reset(&self) {
        self.request_count.store(0, Ordering::Relaxed);
        self.error_count.store(0, Ordering::Relaxed);
        self.cache_hits.store(0, Ordering::Relaxed);
        self.cache_misses.store(0, Ordering::Relaxed);
        self.slow_requests.store(0, Ordering::Relaxed);
        self.lock_latencies().clear();
    }

    /// Emit the current snapshot as one structured log event.
    pub fn log_snapshot(&self) {
        let MetricsSnapshot {
            system,
            application,
        } = self.snapshot();

        info!(
            uptime_secs = system.uptime_seconds,
            resident_mb = system.memory.resident_bytes.map(bytes_to_mb),
            virtual_mb = system.memory.virtual_bytes.map(bytes_to_mb),
            requests = application.request_count,
            errors = application.error_count,
            avg_response_ms = %format!("{:.1}", application.avg_response_time_ms),
            slow_requests = application.slow_requests,
            cache_hit_rate = %format!("{:.1}%", application.cache_hit_rate),
            "Application metrics"
        );
    }

    fn lock_latencies(&self) -> std::sync::MutexGuard<'_, LatencyWindow> {
        // Window updates can't leave it inconsistent, so a poisoned lock is usable
        self.latencies.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn hit_rate(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        return 0.0;
    }
    hits as f64 / total as f64 * 100.0
}

/// Milliseconds with microsecond precision.
pub fn duration_millis(duration: Duration) -> f64 {
    duration.as_micros() as f64 / 1000.0
}

fn bytes_to_mb(bytes: u64) -> f64 {
    (bytes as f64 / (1024.0 * 1024.0) * 10.0).round() / 10.0
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn collector(window: usize) -> MetricsCollector {
        MetricsCollector::new(window, ms(1000))
    }

    #[test]
    fn test_moving_average() {
        let metrics = collector(100);
        for latency in [100, 200, 300] {
            metrics.record_request(ms(latency), false);
        }

        let app = metrics.application_metrics();
        assert_eq!(app.request_count, 3);
        assert!((app.avg_response_time_ms - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_moving_average_evicts_oldest() {
        let metrics = collector(3);
        for latency in [100, 200, 300, 600] {
            metrics.record_request(ms(latency), false);
        }

        // 100 dropped: (200 + 300 + 600) / 3
        let app = metrics.application_metrics();
        assert!((app.avg_response_time_ms - 366.666_666_666).abs() < 1e-6);
        assert_eq!(app.request_count, 4);
    }

    #[test]
    fn test_latency_window_never_exceeds_capacity() {
        let mut window = LatencyWindow::new(3);
        for i in 0..10 {
            window.push(f64::from(i));
            assert!(window.samples.len() <= 3);
        }
        assert_eq!(window.samples, VecDeque::from(vec![7.0, 8.0, 9.0]));
    }

    #[test]
    fn test_errors_and_slow_requests() {
        let metrics = collector(100);
        metrics.record_request(ms(50), false);
        metrics.record_request(ms(1000), true);
        metrics.record_request(ms(1001), true);

        let app = metrics.application_metrics();
        assert_eq!(app.error_count, 2);
        // Threshold is exclusive
        assert_eq!(app.slow_requests, 1);
    }

    #[test]
    fn test_cache_hit_rate() {
        let metrics = collector(100);
        assert_eq!(metrics.cache_hit_rate(), 0.0);

        for _ in 0..3 {
            metrics.record_cache_hit();
        }
        metrics.record_cache_miss();

        assert!((metrics.cache_hit_rate() - 75.0).abs() < 1e-9);
        assert_eq!(metrics.application_metrics().cache_hits, 3);
        assert_eq!(metrics.application_metrics().cache_misses, 1);
    }

    #[test]
    fn test_reset_clears_counters() {
        let metrics = collector(100);
        metrics.record_request(ms(2000), true);
        metrics.record_cache_hit();

        metrics.reset();

        let app = metrics.application_metrics();
        assert_eq!(
            app,
            ApplicationMetrics {
                request_count: 0,
                error_count: 0,
                cache_hits: 0,
                cache_misses: 0,
                avg_response_time_ms: 0.0,
                slow_requests: 0,
                cache_hit_rate: 0.0,
            }
        );
    }

    #[test]
    fn test_proc_status_parsing() {
        let status = "Name:\tportfolio\nVmSize:\t  204800 kB\nVmRSS:\t   10240 kB\n";
        let memory = MemoryUsage::from_proc_status(status);

        assert_eq!(memory.resident_bytes, Some(10240 * 1024));
        assert_eq!(memory.virtual_bytes, Some(204800 * 1024));
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let metrics = collector(100);
        metrics.record_request(ms(10), false);

        let json = serde_json::to_value(metrics.snapshot()).unwrap();
        assert_eq!(json["application"]["requestCount"], 1);
        assert!(json["system"]["uptimeSeconds"].is_u64());
        assert!(json["application"].get("cacheHitRate").is_some());
    }

    #[test]
    fn test_log_snapshot_does_not_panic() {
        collector(10).log_snapshot();
    }
}
