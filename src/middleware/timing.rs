//! Performance timing stage.
//!
//! Starts a timer when the request enters and, once the inner service has
//! produced a response (from a rate-limit rejection, a cache hit or a
//! handler), records exactly one sample in the [`MetricsCollector`], logs the
//! request and sets `X-Response-Time`.
//!
//! The duration is measured when the response head is ready. Streaming body
//! time is not included.

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::header::HeaderValue;
use axum::http::{Request, Response};
use tokio::time::Instant;
use tower::{Layer, Service};
use tracing::{info, warn};

use crate::metrics::record_request_duration;
use crate::monitoring::{MetricsCollector, duration_millis};

/// Header carrying the measured handling time, e.g. `12.34ms`.
pub const RESPONSE_TIME_HEADER: &str = "x-response-time";

#[derive(Clone)]
pub struct TimingLayer {
    metrics: Arc<MetricsCollector>,
}

impl TimingLayer {
    pub fn new(metrics: Arc<MetricsCollector>) -> Self {
        Self { metrics }
    }
}

impl<S> Layer<S> for TimingLayer {
    type Service = TimingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TimingService {
            inner,
            metrics: self.metrics.clone(),
        }
    }
}

#[derive(Clone)]
pub struct TimingService<S> {
    inner: S,
    metrics: Arc<MetricsCollector>,
}

impl<S> Service<Request<Body>> for TimingService<S>
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
        let start = Instant::now();
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let metrics = self.metrics.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let mut response = inner.call(req).await?;

            let elapsed = start.elapsed();
            let status = response.status();
            let millis = duration_millis(elapsed);

            metrics.record_request(elapsed, status.as_u16() >= 400);
            record_request_duration(method.as_str(), status.as_u16(), elapsed.as_secs_f64());

            if elapsed > metrics.slow_threshold() {
                warn!(
                    method = %method,
                    path = %path,
                    status = status.as_u16(),
                    duration_ms = %format!("{millis:.2}"),
                    threshold_ms = metrics.slow_threshold().as_millis() as u64,
                    "Slow request"
                );
            } else {
                info!(
                    method = %method,
                    path = %path,
                    status = status.as_u16(),
                    duration_ms = %format!("{millis:.2}"),
                    "Request completed"
                );
            }

            if let Ok(value) = HeaderValue::from_str(&format!("{millis:.2}ms")) {
                response.headers_mut().insert(RESPONSE_TIME_HEADER, value);
            }

            Ok(response)
        })
    }
}
