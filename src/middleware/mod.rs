//! Tower middleware making up the request-processing pipeline.
//!
//! # Architecture
//!
//! ```text
//! Request → Security → Timing → Rate Limit → Response Cache → Handler
//!              ↓                    ↓              ↓
//!         400 / 403            429 + Retry-After  X-Cache: HIT
//! ```
//!
//! Each stage is a `tower::Layer`. Security and timing wrap the whole router;
//! rate limiting and caching are applied per route group so each group can
//! pick its own policy and TTL. See [`crate::pipeline::Pipeline`] for how they
//! are assembled.
//!
//! Response headers added along the way:
//!
//! | Stage | Headers |
//! |-------|---------|
//! | Security | `X-Content-Type-Options`, `X-Frame-Options`, `X-XSS-Protection`, `Referrer-Policy`, `Permissions-Policy`, `Content-Security-Policy`, `Strict-Transport-Security` (production) |
//! | Timing | `X-Response-Time` |
//! | Rate Limit | `X-RateLimit-Limit`, `X-RateLimit-Remaining`, `X-RateLimit-Reset`, `Retry-After` (429 only) |
//! | Cache | `X-Cache` |
//! | Request ID | `X-Request-Id` |

pub mod cache;
pub mod ip;
pub mod rate_limit;
pub mod request_id;
pub mod security;
pub mod timing;

pub use cache::{CACHE_STATUS_HEADER, CachedResponse, ResponseCache, ResponseCacheLayer};
pub use ip::{ClientIpSource, UNKNOWN_IP};
pub use rate_limit::RateLimitLayer;
pub use request_id::{RequestId, RequestIdLayer};
pub use security::SecurityLayer;
pub use timing::{RESPONSE_TIME_HEADER, TimingLayer};
