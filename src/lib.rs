//! # Portfolio Server
//!
//! JSON API for a personal portfolio site (projects, a reading list and a
//! contact form) behind an in-process request pipeline:
//!
//! - **Security**: request validation against known attack signatures,
//!   hardened response headers
//! - **Rate limiting**: fixed-window quotas per client, a general API limit
//!   and a strict contact-form limit
//! - **Caching**: TTL response cache for read endpoints with `X-Cache`
//! - **Observability**: response timing, latency moving average, cache hit
//!   rate, Prometheus counters, periodic metrics reports
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Axum HTTP Server                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Request ID → Trace → Security → Timing → CORS/limits       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Rate Limit (api / contact) → Response Cache                │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Handlers (health, metrics, projects, books, contact)       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  MemStorage                                                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use portfolio_server::{AppState, Config, build_router};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let state = AppState::new(config)?;
//!     let app = build_router(state.clone());
//!
//!     // Start the server...
//!     state.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod handlers;
pub mod limiter;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod monitoring;
pub mod pipeline;
pub mod routes;
pub mod security;
pub mod state;
pub mod storage;
pub mod utils;
pub mod validation;

// Re-exports for convenience
pub use cache::TtlCache;
pub use config::{Config, Environment};
pub use error::{AppError, AppResult};
pub use limiter::{RateDecision, RateLimitError, RateLimiter};
pub use monitoring::{MetricsCollector, MetricsSnapshot};
pub use pipeline::Pipeline;
pub use routes::build_router;
pub use security::SecurityPolicy;
pub use state::AppState;
pub use storage::MemStorage;
