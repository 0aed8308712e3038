//! Application routing configuration with middleware stack.
//!
//! # Middleware Stack (outermost first)
//!
//! ```text
//! Request
//!    │
//!    ▼
//! ┌──────────────────┐
//! │   Request ID     │ ← Adds X-Request-Id header
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │     Tracing      │ ← HTTP request/response spans
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │    Security      │ ← 400 / 403 on validation failure, security headers
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │     Timing       │ ← X-Response-Time, request metrics
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │ Vary, CORS, body │
//! │ limit, panics    │ ← 500 on handler panic
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │  API rate limit  │ ← /api/* only, 429 if exceeded
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │ Contact limit or │ ← strict 429 on POST /api/contact,
//! │ response cache   │   X-Cache on GET projects/books
//! └────────┬─────────┘
//!          ▼
//!      Handler
//! ```
//!
//! # Route Groups
//!
//! - `/health` - Liveness (no rate limit)
//! - `/metrics` - Metrics snapshot and reset (non-production only)
//! - `/api/projects` - Read-only projects, cached for `PROJECTS_CACHE_TTL_SECS`
//! - `/api/books` - Reading list, reads cached for `BOOKS_CACHE_TTL_SECS`
//! - `/api/contact` - Contact form behind the strict limiter

use std::any::Any;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::header::{HeaderValue, VARY};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::AppError;
use crate::handlers;
use crate::middleware::RequestIdLayer;
use crate::state::AppState;

/// Build the application router with all routes and middleware configured.
///
/// The pipeline's stores come from `state.pipeline`, so every router built
/// from clones of one state shares cache, limiters and metrics.
pub fn build_router(state: AppState) -> Router {
    let config = &state.config;
    let pipeline = &state.pipeline;

    // =========================================================================
    // API routes
    // =========================================================================
    let projects = Router::new()
        .route("/projects", get(handlers::list_projects))
        .route("/projects/{id}", get(handlers::get_project))
        .route_layer(pipeline.cached(config.projects_cache_ttl));

    let books = Router::new()
        .route(
            "/books",
            get(handlers::list_books).post(handlers::create_book),
        )
        .route(
            "/books/{id}",
            get(handlers::get_book)
                .patch(handlers::update_book)
                .delete(handlers::delete_book),
        )
        .route_layer(pipeline.cached(config.books_cache_ttl));

    let contact = Router::new()
        .route("/contact", post(handlers::submit_contact))
        .route_layer(pipeline.contact_rate_limit());

    let api = Router::new()
        .merge(projects)
        .merge(books)
        .merge(contact)
        .layer(pipeline.api_rate_limit());

    let mut router = Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api", api);

    if config.metrics_endpoint_enabled() {
        router = router.route(
            "/metrics",
            get(handlers::metrics_snapshot).delete(handlers::reset_metrics),
        );
    } else {
        info!("Metrics endpoint disabled in production");
    }

    // =========================================================================
    // Apply Middleware Stack (order matters - applied bottom to top)
    // =========================================================================

    // 1. Handler panics become a generic 500
    router = router.layer(catch_panic_layer());

    // 2. Request body size limit
    info!(
        max_size_kb = config.max_request_body_size / 1024,
        "Request body size limit configured"
    );
    router = router.layer(DefaultBodyLimit::max(config.max_request_body_size));

    // 3. CORS
    router = router.layer(build_cors_layer(&config.cors_allowed_origins));

    // 4. Responses vary by compression negotiation upstream
    router = router.layer(SetResponseHeaderLayer::if_not_present(
        VARY,
        HeaderValue::from_static("Accept-Encoding"),
    ));

    // 5. Timing, then security outermost of the pipeline stages
    router = pipeline.wrap(router);

    // 6. Tracing
    router = router.layer(TraceLayer::new_for_http());

    // 7. Request ID
    router = router.layer(RequestIdLayer::new());

    info!(
        api_limit = pipeline.api_limiter.max_requests(),
        api_window_secs = pipeline.api_limiter.window().as_secs(),
        contact_limit = pipeline.contact_limiter.max_requests(),
        contact_window_secs = pipeline.contact_limiter.window().as_secs(),
        trust_proxy = pipeline.client_ip.trusts_proxy(),
        "Rate limiting enabled"
    );

    router.with_state(state)
}

pub type PanicHandler = fn(Box<dyn Any + Send + 'static>) -> Response;

/// Turns a handler panic into a generic 500 without leaking the payload.
pub fn catch_panic_layer() -> CatchPanicLayer<PanicHandler> {
    CatchPanicLayer::custom(panic_response as PanicHandler)
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic payload");

    AppError::Internal(format!("handler panicked: {detail}")).into_response()
}

/// Build CORS layer from configuration.
///
/// # Arguments
///
/// * `allowed_origins` - List of allowed origins, or `["*"]` for any origin
fn build_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let allow_any = allowed_origins.iter().any(|o| o == "*");

    if allow_any {
        CorsLayer::new()
            .allow_origin(AnyOrigin)
            .allow_methods(AnyOrigin)
            .allow_headers(AnyOrigin)
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(AnyOrigin)
            .allow_headers(AnyOrigin)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_panic_response_is_generic_500() {
        let response = panic_response(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = panic_response(Box::new(String::from("index out of bounds")));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_build_cors_layer_specific() {
        let origins = vec![
            "https://example.com".to_string(),
            "https://app.example.com".to_string(),
        ];
        let _layer = build_cors_layer(&origins);
    }
}
