//! Response cache stage for read endpoints.
//!
//! Only `GET` requests are cached. The key is the full original path and query
//! string, so `/api/books?a=1&b=2` and `/api/books?b=2&a=1` are separate
//! entries.
//!
//! - **Hit**: the stored JSON is served with `X-Cache: HIT` and the inner
//!   service is not called.
//! - **Miss**: the inner service runs. A 2xx JSON response is buffered, stored
//!   with this layer's TTL and re-emitted; every miss carries `X-Cache: MISS`.
//!   If the cache was invalidated while the handler ran, the response is
//!   served but not stored.
//!
//! Each route group gets its own layer with its own TTL, all sharing one
//! [`TtlCache`].

use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::OriginalUri;
use axum::http::header::{CONTENT_TYPE, HeaderValue};
use axum::http::{Method, Request, Response, StatusCode};
use axum::response::IntoResponse;
use tower::{Layer, Service};
use tracing::{debug, error};

use crate::cache::TtlCache;
use crate::error::AppError;
use crate::monitoring::MetricsCollector;

pub const CACHE_STATUS_HEADER: &str = "x-cache";

/// A buffered handler response.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub body: Bytes,
    pub content_type: HeaderValue,
}

pub type ResponseCache = TtlCache<CachedResponse>;

#[derive(Clone)]
pub struct ResponseCacheLayer {
    cache: Arc<ResponseCache>,
    metrics: Arc<MetricsCollector>,
    ttl: Duration,
}

impl ResponseCacheLayer {
    pub fn new(cache: Arc<ResponseCache>, metrics: Arc<MetricsCollector>, ttl: Duration) -> Self {
        Self {
            cache,
            metrics,
            ttl,
        }
    }
}

impl<S> Layer<S> for ResponseCacheLayer {
    type Service = ResponseCacheService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ResponseCacheService {
            inner,
            cache: self.cache.clone(),
            metrics: self.metrics.clone(),
            ttl: self.ttl,
        }
    }
}

#[derive(Clone)]
pub struct ResponseCacheService<S> {
    inner: S,
    cache: Arc<ResponseCache>,
    metrics: Arc<MetricsCollector>,
    ttl: Duration,
}

impl<S> Service<Request<Body>> for ResponseCacheService<S>
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
        let mut inner = self.inner.clone();

        if req.method() != Method::GET {
            return Box::pin(async move { inner.call(req).await });
        }

        let key = cache_key(&req);

        if let Some(cached) = self.cache.get(&key) {
            self.metrics.record_cache_hit();
            debug!(key = %key, "Cache hit");
            return Box::pin(async move { Ok(hit_response(cached)) });
        }

        self.metrics.record_cache_miss();
        let cache = self.cache.clone();
        let ttl = self.ttl;
        let generation = cache.generation();

        Box::pin(async move {
            let response = inner.call(req).await?;

            let mut response = match cacheable_content_type(&response) {
                Some(content_type) => {
                    let (mut parts, body) = response.into_parts();
                    match axum::body::to_bytes(body, usize::MAX).await {
                        Ok(body) => {
                            let cached = CachedResponse {
                                body: body.clone(),
                                content_type,
                            };
                            if cache.set_if_generation(key.as_str(), cached, ttl, generation) {
                                debug!(key = %key, ttl_secs = ttl.as_secs(), "Cached response");
                            } else {
                                debug!(key = %key, "Cache invalidated during miss, not storing");
                            }
                            // Length is recomputed from the buffered body
                            parts.headers.remove(axum::http::header::CONTENT_LENGTH);
                            Response::from_parts(parts, Body::from(body))
                        }
                        Err(e) => {
                            error!(key = %key, error = %e, "Failed to buffer response for caching");
                            AppError::Internal(format!("response body error: {e}")).into_response()
                        }
                    }
                }
                None => response,
            };

            response
                .headers_mut()
                .insert(CACHE_STATUS_HEADER, HeaderValue::from_static("MISS"));
            Ok(response)
        })
    }
}

/// Path and query of the request as the client sent it, before any
/// router nesting stripped a prefix.
fn cache_key<B>(req: &Request<B>) -> String {
    let uri = req
        .extensions()
        .get::<OriginalUri>()
        .map_or_else(|| req.uri(), |OriginalUri(uri)| uri);

    uri.path_and_query()
        .map_or_else(|| uri.path().to_string(), |pq| pq.as_str().to_string())
}

/// Content type of a response worth storing: a 2xx with a JSON body.
fn cacheable_content_type(response: &Response<Body>) -> Option<HeaderValue> {
    if !response.status().is_success() {
        return None;
    }
    response
        .headers()
        .get(CONTENT_TYPE)
        .filter(|value| {
            value
                .to_str()
                .map(|ct| ct.starts_with("application/json"))
                .unwrap_or(false)
        })
        .cloned()
}

fn hit_response(cached: CachedResponse) -> Response<Body> {
    let mut response = (StatusCode::OK, Body::from(cached.body)).into_response();
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, cached.content_type);
    headers.insert(CACHE_STATUS_HEADER, HeaderValue::from_static("HIT"));
    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_includes_query() {
        let req = Request::builder()
            .uri("/api/books?status=read")
            .body(Body::empty())
            .unwrap();
        assert_eq!(cache_key(&req), "/api/books?status=read");
    }

    #[test]
    fn test_cache_key_prefers_original_uri() {
        let mut req = Request::builder()
            .uri("/books/3")
            .body(Body::empty())
            .unwrap();
        req.extensions_mut()
            .insert(OriginalUri("/api/books/3".parse().unwrap()));

        assert_eq!(cache_key(&req), "/api/books/3");
    }

    #[test]
    fn test_only_successful_json_is_cacheable() {
        let json = axum::Json(serde_json::json!({"ok": true})).into_response();
        assert!(cacheable_content_type(&json).is_some());

        let text = (StatusCode::OK, "plain").into_response();
        assert!(cacheable_content_type(&text).is_none());

        let not_found = AppError::NotFound("book 9".to_string()).into_response();
        assert!(cacheable_content_type(&not_found).is_none());
    }

    #[test]
    fn test_hit_response_headers() {
        let response = hit_response(CachedResponse {
            body: Bytes::from_static(b"[]"),
            content_type: HeaderValue::from_static("application/json"),
        });

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get(CACHE_STATUS_HEADER).unwrap(), "HIT");
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }
}
