//! Assembly of the request-processing pipeline.
//!
//! [`Pipeline`] owns the three shared stores (response cache, the two rate
//! limiters and the metrics collector) plus the security policy, and hands out
//! the Tower layers that use them. Nothing here is global: each `Pipeline` is
//! independent, so tests can build as many as they like.
//!
//! # Ordering
//!
//! ```text
//! Security → Timing → [API limit → [Contact limit]] → [Cache] → Handler
//! └── wrap() ───────┘  └──────── per route group ─────────────┘
//! ```
//!
//! [`Pipeline::wrap`] applies the two global stages to a finished router. The
//! route-scoped stages are attached by the router itself with
//! [`Pipeline::api_rate_limit`], [`Pipeline::contact_rate_limit`] and
//! [`Pipeline::cached`].

use std::sync::Arc;
use std::time::Duration;

use axum::Router;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::limiter::RateLimiter;
use crate::middleware::{
    ClientIpSource, RateLimitLayer, ResponseCache, ResponseCacheLayer, SecurityLayer, TimingLayer,
};
use crate::monitoring::MetricsCollector;
use crate::security::SecurityPolicy;

/// Policy names used in logs and metric labels.
pub const API_POLICY: &str = "api";
pub const CONTACT_POLICY: &str = "contact";

#[derive(Clone)]
pub struct Pipeline {
    pub cache: Arc<ResponseCache>,
    pub api_limiter: Arc<RateLimiter>,
    pub contact_limiter: Arc<RateLimiter>,
    pub metrics: Arc<MetricsCollector>,
    pub security: Arc<SecurityPolicy>,
    pub client_ip: ClientIpSource,
}

impl Pipeline {
    /// Build the pipeline's stores from configuration.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if a limiter is configured with a zero
    /// ceiling or window, or the signature set fails to compile.
    pub fn new(config: &Config) -> AppResult<Self> {
        let api_limiter =
            RateLimiter::new(config.api_rate_limit_window, config.api_rate_limit_max)
                .map_err(|e| AppError::ConfigError(format!("API rate limiter: {e}")))?;
        let contact_limiter =
            RateLimiter::new(config.contact_rate_limit_window, config.contact_rate_limit_max)
                .map_err(|e| AppError::ConfigError(format!("Contact rate limiter: {e}")))?;
        let security = SecurityPolicy::new(config.is_production())
            .map_err(|e| AppError::ConfigError(format!("Security signatures: {e}")))?;

        Ok(Self {
            cache: Arc::new(ResponseCache::new()),
            api_limiter: Arc::new(api_limiter),
            contact_limiter: Arc::new(contact_limiter),
            metrics: Arc::new(MetricsCollector::new(
                config.latency_window_size,
                config.slow_request_threshold,
            )),
            security: Arc::new(security),
            client_ip: ClientIpSource::new(config.trust_proxy),
        })
    }

    /// Cache stage for `GET` routes with the given TTL.
    pub fn cached(&self, ttl: Duration) -> ResponseCacheLayer {
        ResponseCacheLayer::new(self.cache.clone(), self.metrics.clone(), ttl)
    }

    /// General API rate limit stage.
    pub fn api_rate_limit(&self) -> RateLimitLayer {
        RateLimitLayer::new(self.api_limiter.clone(), API_POLICY, self.client_ip)
    }

    /// Strict rate limit stage for the contact form.
    pub fn contact_rate_limit(&self) -> RateLimitLayer {
        RateLimitLayer::new(self.contact_limiter.clone(), CONTACT_POLICY, self.client_ip)
    }

    pub fn timing(&self) -> TimingLayer {
        TimingLayer::new(self.metrics.clone())
    }

    pub fn security(&self) -> SecurityLayer {
        SecurityLayer::new(self.security.clone(), self.client_ip)
    }

    /// Wrap `router` in the timing stage, then the security stage outermost.
    pub fn wrap<S>(&self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router.layer(self.timing()).layer(self.security())
    }

    /// Sweep expired cache entries. Returns the number removed.
    pub fn sweep_cache(&self) -> usize {
        let removed = self.cache.cleanup();
        crate::metrics::set_cache_entries(self.cache.len());
        removed
    }

    /// Purge expired windows from both limiters. Returns the number removed.
    pub fn sweep_rate_limits(&self) -> usize {
        self.api_limiter.cleanup() + self.contact_limiter.cleanup()
    }
}
