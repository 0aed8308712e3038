//! Application configuration loaded from environment variables.
//!
//! # Configuration Hierarchy
//!
//! All configuration is loaded from environment variables with sensible defaults
//! for development. In production, configure via environment variables or a `.env` file.
//!
//! # Environment
//!
//! - `APP_ENV`: `development` (default), `production` or `test`. Production
//!   enables HSTS, JSON logs, a longer metrics report interval, and hides the
//!   `/metrics` endpoint.
//! - `TRUST_PROXY`: when `true`, client identity is read from
//!   `X-Forwarded-For` / `X-Real-IP` instead of the peer address.
//!
//! # Pipeline Tuning
//!
//! - `API_RATE_LIMIT_MAX` / `API_RATE_LIMIT_WINDOW_SECS`: general API quota (default: 100 / 900)
//! - `CONTACT_RATE_LIMIT_MAX` / `CONTACT_RATE_LIMIT_WINDOW_SECS`: contact form quota (default: 5 / 60)
//! - `PROJECTS_CACHE_TTL_SECS` / `BOOKS_CACHE_TTL_SECS`: response cache TTLs (default: 3600 / 1800)
//! - `SLOW_REQUEST_THRESHOLD_MS`: latency above which a request counts as slow (default: 1000)

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{AppError, AppResult};

/// Longest accepted window, TTL or interval.
pub const MAX_DURATION: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Deployment environment the process runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Production,
    Test,
}

impl Environment {
    pub fn is_production(self) -> bool {
        self == Environment::Production
    }

    /// Default interval for the periodic metrics report.
    ///
    /// Production reports every 5 minutes, development every minute; tests
    /// don't report unless `METRICS_LOG_INTERVAL_SECS` is set.
    pub fn default_metrics_log_interval(self) -> Option<Duration> {
        match self {
            Environment::Production => Some(Duration::from_secs(5 * 60)),
            Environment::Development => Some(Duration::from_secs(60)),
            Environment::Test => None,
        }
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            "test" => Ok(Environment::Test),
            other => Err(format!(
                "unknown environment '{other}' (expected development, production or test)"
            )),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Environment::Development => "development",
            Environment::Production => "production",
            Environment::Test => "test",
        };
        f.write_str(name)
    }
}

/// Application configuration loaded from environment variables.
///
/// # Example
///
/// ```rust,ignore
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.server_addr());
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Server host address (default: "0.0.0.0")
    pub host: String,

    /// Server port (default: 5000)
    pub port: u16,

    /// Deployment environment (default: development)
    pub environment: Environment,

    /// Read client identity from proxy headers (default: false)
    pub trust_proxy: bool,

    /// Maximum request body size in bytes (default: 1MB)
    pub max_request_body_size: usize,

    /// Allowed CORS origins; `*` allows any origin
    pub cors_allowed_origins: Vec<String>,

    // =========================================================================
    // Rate Limiting Configuration
    // =========================================================================
    /// Requests allowed per window on the general API (default: 100)
    pub api_rate_limit_max: u32,

    /// Window length for the general API limiter (default: 15 minutes)
    pub api_rate_limit_window: Duration,

    /// Requests allowed per window on the contact form (default: 5)
    pub contact_rate_limit_max: u32,

    /// Window length for the contact form limiter (default: 1 minute)
    pub contact_rate_limit_window: Duration,

    /// How often expired client windows are purged (default: 60 seconds)
    pub rate_limit_cleanup_interval: Duration,

    // =========================================================================
    // Response Cache Configuration
    // =========================================================================
    /// How often expired cache entries are swept (default: 10 minutes)
    pub cache_cleanup_interval: Duration,

    /// TTL for cached project responses (default: 1 hour)
    pub projects_cache_ttl: Duration,

    /// TTL for cached book responses (default: 30 minutes)
    pub books_cache_ttl: Duration,

    // =========================================================================
    // Observability Configuration
    // =========================================================================
    /// Log level (e.g., "info", "debug", "trace")
    pub log_level: String,

    /// Number of recent latencies kept for the moving average (default: 100)
    pub latency_window_size: usize,

    /// Requests slower than this are counted and logged (default: 1000ms)
    pub slow_request_threshold: Duration,

    /// Interval of the periodic metrics report (`None` = disabled)
    pub metrics_log_interval: Option<Duration>,

    /// Port for Prometheus metrics endpoint (default: 9090, 0 = disabled)
    pub metrics_port: u16,
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if any value fails to parse or
    /// validation rejects it (e.g., a zero rate limit window).
    pub fn from_env() -> AppResult<Self> {
        // Load an .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let environment: Environment = Self::parse_env("APP_ENV", Environment::Development)?;

        let metrics_log_interval = match env::var("METRICS_LOG_INTERVAL_SECS") {
            Ok(val) => {
                let secs: u64 = val.parse().map_err(|e| {
                    AppError::ConfigError(format!("Invalid METRICS_LOG_INTERVAL_SECS: {e}"))
                })?;
                // 0 explicitly disables the report
                (secs > 0).then(|| Duration::from_secs(secs))
            }
            Err(_) => environment.default_metrics_log_interval(),
        };

        let config = Self {
            // Server
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: Self::parse_env("PORT", 5000)?,
            environment,
            trust_proxy: Self::parse_env("TRUST_PROXY", false)?,
            max_request_body_size: Self::parse_env("MAX_REQUEST_BODY_SIZE", 1024 * 1024)?,
            cors_allowed_origins: Self::parse_cors_origins(),

            // Rate limiting
            api_rate_limit_max: Self::parse_env("API_RATE_LIMIT_MAX", 100)?,
            api_rate_limit_window: Duration::from_secs(Self::parse_env(
                "API_RATE_LIMIT_WINDOW_SECS",
                15 * 60,
            )?),
            contact_rate_limit_max: Self::parse_env("CONTACT_RATE_LIMIT_MAX", 5)?,
            contact_rate_limit_window: Duration::from_secs(Self::parse_env(
                "CONTACT_RATE_LIMIT_WINDOW_SECS",
                60,
            )?),
            rate_limit_cleanup_interval: Duration::from_secs(Self::parse_env(
                "RATE_LIMIT_CLEANUP_INTERVAL_SECS",
                60,
            )?),

            // Response cache
            cache_cleanup_interval: Duration::from_secs(Self::parse_env(
                "CACHE_CLEANUP_INTERVAL_SECS",
                10 * 60,
            )?),
            projects_cache_ttl: Duration::from_secs(Self::parse_env(
                "PROJECTS_CACHE_TTL_SECS",
                3600,
            )?),
            books_cache_ttl: Duration::from_secs(Self::parse_env("BOOKS_CACHE_TTL_SECS", 1800)?),

            // Observability
            log_level: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            latency_window_size: Self::parse_env("LATENCY_WINDOW_SIZE", 100)?,
            slow_request_threshold: Duration::from_millis(Self::parse_env(
                "SLOW_REQUEST_THRESHOLD_MS",
                1000,
            )?),
            metrics_log_interval,
            metrics_port: Self::parse_env("METRICS_PORT", 9090)?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values for consistency and correctness.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if validation fails.
    pub fn validate(&self) -> AppResult<()> {
        if self.api_rate_limit_max == 0 || self.contact_rate_limit_max == 0 {
            return Err(AppError::ConfigError(
                "API_RATE_LIMIT_MAX and CONTACT_RATE_LIMIT_MAX must be greater than 0".to_string(),
            ));
        }

        if self.api_rate_limit_window.is_zero() || self.contact_rate_limit_window.is_zero() {
            return Err(AppError::ConfigError(
                "Rate limit windows must be greater than 0 seconds".to_string(),
            ));
        }

        // tokio::time::interval panics on a zero period
        if self.rate_limit_cleanup_interval.is_zero() || self.cache_cleanup_interval.is_zero() {
            return Err(AppError::ConfigError(
                "RATE_LIMIT_CLEANUP_INTERVAL_SECS and CACHE_CLEANUP_INTERVAL_SECS must be greater than 0"
                    .to_string(),
            ));
        }

        let durations = [
            ("API_RATE_LIMIT_WINDOW_SECS", Some(self.api_rate_limit_window)),
            ("CONTACT_RATE_LIMIT_WINDOW_SECS", Some(self.contact_rate_limit_window)),
            ("RATE_LIMIT_CLEANUP_INTERVAL_SECS", Some(self.rate_limit_cleanup_interval)),
            ("CACHE_CLEANUP_INTERVAL_SECS", Some(self.cache_cleanup_interval)),
            ("PROJECTS_CACHE_TTL_SECS", Some(self.projects_cache_ttl)),
            ("BOOKS_CACHE_TTL_SECS", Some(self.books_cache_ttl)),
            ("SLOW_REQUEST_THRESHOLD_MS", Some(self.slow_request_threshold)),
            ("METRICS_LOG_INTERVAL_SECS", self.metrics_log_interval),
        ];
        if let Some((name, _)) = durations
            .iter()
            .find(|(_, value)| value.is_some_and(|d| d > MAX_DURATION))
        {
            return Err(AppError::ConfigError(format!(
                "{name} must not exceed {} seconds",
                MAX_DURATION.as_secs()
            )));
        }

        if self.latency_window_size == 0 {
            return Err(AppError::ConfigError(
                "LATENCY_WINDOW_SIZE must be greater than 0".to_string(),
            ));
        }

        if self.max_request_body_size == 0 {
            return Err(AppError::ConfigError(
                "MAX_REQUEST_BODY_SIZE must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Get the full server address for binding.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_production(&self) -> bool {
        self.environment.is_production()
    }

    /// The `/metrics` snapshot endpoint is only exposed outside production.
    pub fn metrics_endpoint_enabled(&self) -> bool {
        !self.is_production()
    }

    /// Check if Prometheus metrics export is enabled.
    pub fn prometheus_enabled(&self) -> bool {
        self.metrics_port > 0
    }

    /// Get the Prometheus endpoint address.
    ///
    /// Returns `None` if export is disabled (port = 0).
    pub fn metrics_addr(&self) -> Option<std::net::SocketAddr> {
        if self.prometheus_enabled() {
            Some(std::net::SocketAddr::from((
                [0, 0, 0, 0],
                self.metrics_port,
            )))
        } else {
            None
        }
    }

    /// Parse an environment variable into the specified type with a default value.
    fn parse_env<T>(name: &str, default: T) -> AppResult<T>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match env::var(name) {
            Ok(val) => val
                .parse()
                .map_err(|e| AppError::ConfigError(format!("Invalid {name}: {e}"))),
            Err(_) => Ok(default),
        }
    }

    /// Parse CORS allowed origins from environment variable.
    fn parse_cors_origins() -> Vec<String> {
        env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// Default configuration for testing and development.
///
/// Production deployments should use `Config::from_env()` instead.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Server
            host: "0.0.0.0".to_string(),
            port: 5000,
            environment: Environment::Development,
            trust_proxy: false,
            max_request_body_size: 1024 * 1024,
            cors_allowed_origins: vec!["*".to_string()],
            // Rate limiting
            api_rate_limit_max: 100,
            api_rate_limit_window: Duration::from_secs(15 * 60),
            contact_rate_limit_max: 5,
            contact_rate_limit_window: Duration::from_secs(60),
            rate_limit_cleanup_interval: Duration::from_secs(60),
            // Response cache
            cache_cleanup_interval: Duration::from_secs(10 * 60),
            projects_cache_ttl: Duration::from_secs(3600),
            books_cache_ttl: Duration::from_secs(1800),
            // Observability
            log_level: "info".to_string(),
            latency_window_size: 100,
            slow_request_threshold: Duration::from_millis(1000),
            metrics_log_interval: Environment::Development.default_metrics_log_interval(),
            metrics_port: 9090,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = Config::default();

        assert_eq!(config.port, 5000);
        assert_eq!(config.api_rate_limit_max, 100);
        assert_eq!(config.api_rate_limit_window, Duration::from_secs(900));
        assert_eq!(config.contact_rate_limit_max, 5);
        assert_eq!(config.contact_rate_limit_window, Duration::from_secs(60));
        assert_eq!(config.latency_window_size, 100);
        assert!(!config.trust_proxy);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_server_addr_format() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };

        assert_eq!(config.server_addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_environment_parsing() {
        assert_eq!(
            "production".parse::<Environment>().unwrap(),
            Environment::Production
        );
        assert_eq!(
            " Dev ".parse::<Environment>().unwrap(),
            Environment::Development
        );
        assert_eq!("test".parse::<Environment>().unwrap(), Environment::Test);
        assert!("staging".parse::<Environment>().is_err());
    }

    #[test]
    fn test_metrics_log_interval_by_environment() {
        assert_eq!(
            Environment::Production.default_metrics_log_interval(),
            Some(Duration::from_secs(300))
        );
        assert_eq!(
            Environment::Development.default_metrics_log_interval(),
            Some(Duration::from_secs(60))
        );
        assert_eq!(Environment::Test.default_metrics_log_interval(), None);
    }

    #[test]
    fn test_metrics_endpoint_hidden_in_production() {
        let config = Config {
            environment: Environment::Production,
            ..Config::default()
        };
        assert!(!config.metrics_endpoint_enabled());
        assert!(Config::default().metrics_endpoint_enabled());
    }

    #[test]
    fn test_validate_zero_rate_limit() {
        let config = Config {
            contact_rate_limit_max: 0,
            ..Config::default()
        };

        let result = config.validate();
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("CONTACT_RATE_LIMIT_MAX")
        );
    }

    #[test]
    fn test_validate_zero_window() {
        let config = Config {
            api_rate_limit_window: Duration::ZERO,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_oversized_durations() {
        let config = Config {
            books_cache_ttl: Duration::from_secs(u64::MAX),
            ..Config::default()
        };
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("BOOKS_CACHE_TTL_SECS"));

        let config = Config {
            api_rate_limit_window: Duration::from_secs(u64::MAX),
            ..Config::default()
        };
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("API_RATE_LIMIT_WINDOW_SECS"));

        let config = Config {
            metrics_log_interval: Some(MAX_DURATION + Duration::from_secs(1)),
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            contact_rate_limit_window: MAX_DURATION,
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_latency_window() {
        let config = Config {
            latency_window_size: 0,
            ..Config::default()
        };

        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("LATENCY_WINDOW_SIZE"));
    }

    #[test]
    fn test_metrics_addr_disabled() {
        let config = Config {
            metrics_port: 0,
            ..Config::default()
        };
        assert!(config.metrics_addr().is_none());
    }
}
