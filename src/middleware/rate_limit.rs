//! Per-client rate limiting stage.
//!
//! Wraps a shared [`RateLimiter`] and applies it to every request passing
//! through the routes it is layered on. Two policies exist in the router: the
//! general API limiter on `/api` and the strict contact-form limiter on
//! `POST /api/contact`.
//!
//! # Response Headers
//!
//! On rate limit exceeded (429, body `{error, message, retryAfter}`):
//! - `Retry-After`: Seconds until the client's window resets (rounded up)
//! - `X-RateLimit-Limit`: Requests allowed per window
//! - `X-RateLimit-Remaining`: Always `0`
//! - `X-RateLimit-Reset`: Window reset time as Unix epoch milliseconds
//!
//! On allowed requests the three `X-RateLimit-*` headers are attached to the
//! response. When two limiters apply to a route, the inner (more specific)
//! limiter writes first and the outer one leaves its headers alone.

use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::body::Body;
use axum::http::header::{HeaderMap, HeaderValue, RETRY_AFTER};
use axum::http::{Request, Response};
use axum::response::IntoResponse;
use chrono::Utc;
use tower::{Layer, Service};
use tracing::{debug, warn};

use super::ip::ClientIpSource;
use crate::error::AppError;
use crate::limiter::{RateDecision, RateLimiter};
use crate::metrics::record_rate_limited;

pub const RATE_LIMIT_LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";
pub const RATE_LIMIT_RESET_HEADER: &str = "x-ratelimit-reset";

/// Rate limiting layer for Tower middleware stack.
///
/// # Example
///
/// ```rust,ignore
/// let limiter = Arc::new(RateLimiter::new(Duration::from_secs(60), 5)?);
/// let app = Router::new()
///     .route("/api/contact", post(handler))
///     .layer(RateLimitLayer::new(limiter, "contact", ClientIpSource::default()));
/// ```
#[derive(Clone)]
pub struct RateLimitLayer {
    limiter: Arc<RateLimiter>,
    /// Policy name used in logs and metric labels
    policy: &'static str,
    client_ip: ClientIpSource,
}

impl RateLimitLayer {
    pub fn new(limiter: Arc<RateLimiter>, policy: &'static str, client_ip: ClientIpSource) -> Self {
        Self {
            limiter,
            policy,
            client_ip,
        }
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            limiter: self.limiter.clone(),
            policy: self.policy,
            client_ip: self.client_ip,
        }
    }
}

/// Rate limiting service wrapper.
#[derive(Clone)]
pub struct RateLimitService<S> {
    inner: S,
    limiter: Arc<RateLimiter>,
    policy: &'static str,
    client_ip: ClientIpSource,
}

impl<S> Service<Request<Body>> for RateLimitService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let client_ip = self.client_ip.client_id(&req);
        let decision = self.limiter.check(&client_ip);

        if !decision.allowed {
            let retry_after = decision.retry_after_secs();
            warn!(
                client_ip = %client_ip,
                path = %req.uri().path(),
                policy = self.policy,
                retry_after_secs = retry_after,
                "Rate limit exceeded"
            );
            record_rate_limited(self.policy);

            let mut response = AppError::RateLimited { retry_after }.into_response();
            let headers = response.headers_mut();
            headers.insert(RETRY_AFTER, HeaderValue::from(retry_after));
            write_quota_headers(headers, &decision, true);
            return Box::pin(async move { Ok(response) });
        }

        debug!(
            client_ip = %client_ip,
            policy = self.policy,
            remaining = decision.remaining,
            "Request within rate limit"
        );

        let mut inner = self.inner.clone();
        Box::pin(async move {
            let mut response = inner.call(req).await?;
            write_quota_headers(response.headers_mut(), &decision, false);
            Ok(response)
        })
    }
}

/// Write the `X-RateLimit-*` headers. Unless `overwrite` is set, headers an
/// inner limiter already wrote are kept.
fn write_quota_headers(headers: &mut HeaderMap, decision: &RateDecision, overwrite: bool) {
    if !overwrite && headers.contains_key(RATE_LIMIT_LIMIT_HEADER) {
        return;
    }
    headers.insert(RATE_LIMIT_LIMIT_HEADER, HeaderValue::from(decision.limit));
    headers.insert(
        RATE_LIMIT_REMAINING_HEADER,
        HeaderValue::from(decision.remaining),
    );
    headers.insert(
        RATE_LIMIT_RESET_HEADER,
        HeaderValue::from(reset_epoch_millis(decision.reset_after)),
    );
}

/// Wall-clock reset time in Unix epoch milliseconds.
fn reset_epoch_millis(reset_after: Duration) -> i64 {
    let offset = i64::try_from(reset_after.as_millis()).unwrap_or(i64::MAX);
    Utc::now().timestamp_millis().saturating_add(offset)
}
