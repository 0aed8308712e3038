//! Health and metrics endpoints.
//!
//! # Endpoints
//!
//! - `GET /health` - Liveness with uptime and version
//! - `GET /metrics` - System and application metrics snapshot (non-production)
//! - `DELETE /metrics` - Reset application counters (non-production)
//!
//! `/metrics` serves the in-process collector as JSON. The Prometheus
//! exposition format is served separately on `METRICS_PORT`.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use chrono::Utc;
use tracing::{info, instrument};

use crate::models::HealthResponse;
use crate::monitoring::MetricsSnapshot;
use crate::state::AppState;

/// Health check endpoint.
///
/// # Response Body
///
/// ```json
/// {
///   "status": "healthy",
///   "uptimeSeconds": 3600,
///   "environment": "production",
///   "version": "0.1.0",
///   "timestamp": "2024-01-15T10:30:00Z"
/// }
/// ```
#[instrument(skip(state))]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        uptime_seconds: state.uptime_seconds(),
        environment: state.config.environment.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
    })
}

/// Current metrics snapshot.
///
/// # Response Body
///
/// ```json
/// {
///   "system": {
///     "uptimeSeconds": 3600,
///     "memory": { "residentBytes": 25165824, "virtualBytes": 1073741824 },
///     "timestamp": "2024-01-15T10:30:00Z"
///   },
///   "application": {
///     "requestCount": 1250,
///     "errorCount": 3,
///     "cacheHits": 900,
///     "cacheMisses": 100,
///     "avgResponseTimeMs": 4.2,
///     "slowRequests": 1,
///     "cacheHitRate": 90.0
///   }
/// }
/// ```
#[instrument(skip(state))]
pub async fn metrics_snapshot(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.pipeline.metrics.snapshot())
}

/// Reset application counters. Uptime is unaffected.
#[instrument(skip(state))]
pub async fn reset_metrics(State(state): State<AppState>) -> StatusCode {
    state.pipeline.metrics.reset();
    info!("Application metrics reset");
    StatusCode::NO_CONTENT
}
