//! Shared application state for Axum handlers.
//!
//! [`AppState`] owns:
//!
//! - **Pipeline**: response cache, rate limiters, metrics collector and
//!   security policy
//! - **Storage**: in-memory portfolio records
//! - **Configuration**: runtime configuration access
//!
//! # Structured Concurrency
//!
//! Background sweeps are spawned on a `tokio_util::task::TaskTracker` and stop
//! when the `CancellationToken` fires. Call `shutdown()` before exit to cancel
//! and wait for them:
//!
//! | Task | Interval | Work |
//! |------|----------|------|
//! | cache sweep | `CACHE_CLEANUP_INTERVAL_SECS` | drop expired cache entries |
//! | rate limit sweep | `RATE_LIMIT_CLEANUP_INTERVAL_SECS` | drop expired client windows |
//! | metrics report | `METRICS_LOG_INTERVAL_SECS` | log a metrics snapshot |

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::AppResult;
use crate::pipeline::Pipeline;
use crate::storage::MemStorage;

/// Shared application state for Axum handlers.
///
/// Cloned for each request handler; everything inside is behind an `Arc`.
///
/// # Lifecycle
///
/// ```rust,ignore
/// let state = AppState::new(config)?;
/// // ... serve ...
/// state.shutdown().await;  // Wait for background tasks to complete
/// ```
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Pipeline,
    pub storage: Arc<MemStorage>,
    pub config: Arc<Config>,
    pub started_at: Instant,
    task_tracker: TaskTracker,
    cancellation_token: CancellationToken,
}

impl AppState {
    /// Create state seeded with the sample portfolio and start background tasks.
    ///
    /// Must be called inside a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if the pipeline can't be built from
    /// `config`.
    pub fn new(config: Config) -> AppResult<Self> {
        Self::with_storage(config, MemStorage::with_sample_data())
    }

    /// Create state around an existing store.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if the pipeline can't be built from
    /// `config`.
    pub fn with_storage(config: Config, storage: MemStorage) -> AppResult<Self> {
        config.validate()?;
        let pipeline = Pipeline::new(&config)?;

        let state = Self {
            pipeline,
            storage: Arc::new(storage),
            config: Arc::new(config),
            started_at: Instant::now(),
            task_tracker: TaskTracker::new(),
            cancellation_token: CancellationToken::new(),
        };

        state.spawn_cache_sweep_task();
        state.spawn_rate_limit_sweep_task();
        state.spawn_metrics_report_task();

        Ok(state)
    }

    fn spawn_cache_sweep_task(&self) {
        let pipeline = self.pipeline.clone();
        self.spawn_periodic(
            "cache sweep",
            self.config.cache_cleanup_interval,
            move || {
                let removed = pipeline.sweep_cache();
                if removed > 0 {
                    debug!(removed, "Swept expired cache entries");
                }
            },
        );
    }

    fn spawn_rate_limit_sweep_task(&self) {
        let pipeline = self.pipeline.clone();
        self.spawn_periodic(
            "rate limit sweep",
            self.config.rate_limit_cleanup_interval,
            move || {
                let removed = pipeline.sweep_rate_limits();
                if removed > 0 {
                    debug!(removed, "Purged expired rate limit windows");
                }
            },
        );
    }

    fn spawn_metrics_report_task(&self) {
        let Some(period) = self.config.metrics_log_interval else {
            debug!("Periodic metrics report disabled");
            return;
        };

        let metrics = self.pipeline.metrics.clone();
        self.spawn_periodic("metrics report", period, move || metrics.log_snapshot());
    }

    /// Run `work` every `period` until cancelled. The first run happens one
    /// period after spawn.
    fn spawn_periodic<F>(&self, name: &'static str, period: Duration, mut work: F)
    where
        F: FnMut() + Send + 'static,
    {
        let cancel = self.cancellation_token.clone();

        self.task_tracker.spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await; // Skip the first immediate tick

            loop {
                tokio::select! {
                    biased; // Check cancellation first

                    _ = cancel.cancelled() => {
                        debug!(task = name, "Background task received cancellation signal");
                        break;
                    }
                    _ = ticker.tick() => work(),
                }
            }

            debug!(task = name, "Background task shutting down");
        });
    }

    /// Gracefully shutdown all background tasks.
    ///
    /// 1. Signals all tasks to stop via cancellation token
    /// 2. Closes the task tracker (prevents new tasks)
    /// 3. Waits for all tasks to complete
    pub async fn shutdown(&self) {
        info!("Initiating graceful shutdown of background tasks");

        self.cancellation_token.cancel();
        self.task_tracker.close();
        self.task_tracker.wait().await;

        info!("All background tasks have completed");
    }

    /// Number of background tasks still running.
    pub fn background_tasks(&self) -> usize {
        self.task_tracker.len()
    }

    /// Get the application uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::Environment;
    use crate::middleware::CachedResponse;
    use axum::body::Bytes;
    use axum::http::HeaderValue;

    fn test_config() -> Config {
        Config {
            environment: Environment::Test,
            metrics_log_interval: None,
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_shutdown_stops_background_tasks() {
        let state = AppState::new(test_config()).unwrap();
        // Cache and rate limit sweeps; the report is disabled
        assert_eq!(state.background_tasks(), 2);

        state.shutdown().await;
        assert_eq!(state.background_tasks(), 0);
    }

    #[tokio::test]
    async fn test_metrics_report_task_spawned_when_configured() {
        let config = Config {
            metrics_log_interval: Some(Duration::from_secs(60)),
            ..test_config()
        };
        let state = AppState::new(config).unwrap();
        assert_eq!(state.background_tasks(), 3);
        state.shutdown().await;
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let config = Config {
            rate_limit_cleanup_interval: Duration::ZERO,
            ..test_config()
        };
        assert!(AppState::new(config).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_sweep_runs_on_interval() {
        let config = Config {
            cache_cleanup_interval: Duration::from_secs(600),
            ..test_config()
        };
        let state = AppState::new(config).unwrap();
        state.pipeline.cache.set(
            "/api/books",
            CachedResponse {
                body: Bytes::from_static(b"[]"),
                content_type: HeaderValue::from_static("application/json"),
            },
            Duration::from_secs(1),
        );

        // Let the sweep task register its first tick, then fire the second
        for _ in 0..3 {
            tokio::task::yield_now().await;
        }
        tokio::time::advance(Duration::from_secs(601)).await;
        for _ in 0..3 {
            tokio::task::yield_now().await;
        }

        assert!(state.pipeline.cache.is_empty());
        state.shutdown().await;
    }
}
