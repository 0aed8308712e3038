//! Client identity for rate limiting and rejection logs.
//!
//! The rate limiter keys its windows by a client id string. Where that id comes
//! from depends on the deployment:
//!
//! - **Direct** (`TRUST_PROXY=false`, the default): the TCP peer address from
//!   Axum's `ConnectInfo<SocketAddr>` extension. Proxy headers are ignored, so
//!   a client cannot pick its own id.
//! - **Behind a reverse proxy** (`TRUST_PROXY=true`): the first address in
//!   `X-Forwarded-For`, then `X-Real-IP`, then the peer address.
//!
//! # Security Warning: IP Spoofing Risk
//!
//! With `TRUST_PROXY=true` the headers are taken at face value. Only enable it
//! when the service is unreachable except through a proxy that **overwrites**
//! these headers:
//!
//! ```nginx
//! proxy_set_header X-Real-IP $remote_addr;
//! proxy_set_header X-Forwarded-For $remote_addr;
//! ```
//!
//! Otherwise clients can rotate spoofed addresses to escape their quota, or
//! exhaust someone else's.
//!
//! ## The "unknown" Fallback
//!
//! When no identity can be determined (no connect info, e.g. in-process tests
//! driving the router directly), every such request shares the `"unknown"`
//! key and therefore one quota.

use std::borrow::Cow;
use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::http::Request;
use tracing::debug;

/// Fallback id when no client identity can be determined.
pub const UNKNOWN_IP: &str = "unknown";

/// Where a client id was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExtractedIp<'a> {
    /// First entry of `X-Forwarded-For`.
    FromXff(&'a str),
    /// `X-Real-IP` header.
    FromRealIp(&'a str),
    NotFound,
}

/// Read a client address from proxy headers without allocating.
#[inline]
fn extract_ip_from_headers<B>(req: &Request<B>) -> ExtractedIp<'_> {
    // Format: "client, proxy1, proxy2" - we want the first (client) IP
    if let Some(forwarded) = req.headers().get("x-forwarded-for")
        && let Ok(value) = forwarded.to_str()
        && let Some(first_ip) = value.split(',').next().map(str::trim)
        && !first_ip.is_empty()
    {
        return ExtractedIp::FromXff(first_ip);
    }

    if let Some(real_ip) = req.headers().get("x-real-ip")
        && let Ok(value) = real_ip.to_str()
        && !value.trim().is_empty()
    {
        return ExtractedIp::FromRealIp(value.trim());
    }

    ExtractedIp::NotFound
}

/// Peer address recorded by `into_make_service_with_connect_info`.
fn peer_addr<B>(req: &Request<B>) -> Option<SocketAddr> {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
}

/// Resolves the client id of a request according to the proxy setting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientIpSource {
    trust_proxy: bool,
}

impl ClientIpSource {
    pub fn new(trust_proxy: bool) -> Self {
        Self { trust_proxy }
    }

    pub fn trusts_proxy(&self) -> bool {
        self.trust_proxy
    }

    /// Client id for `req`.
    ///
    /// # Returns
    ///
    /// `Cow<'static, str>` - Borrowed for "unknown" (no allocation), owned for
    /// actual addresses. Use `.into_owned()` inside async blocks that outlive
    /// the request reference.
    #[inline]
    pub fn client_id<B>(&self, req: &Request<B>) -> Cow<'static, str> {
        if self.trust_proxy {
            match extract_ip_from_headers(req) {
                ExtractedIp::FromXff(ip) | ExtractedIp::FromRealIp(ip) => {
                    return Cow::Owned(ip.to_string());
                }
                ExtractedIp::NotFound => {
                    debug!("No proxy headers found - request may be bypassing reverse proxy");
                }
            }
        }

        match peer_addr(req) {
            Some(addr) => Cow::Owned(addr.ip().to_string()),
            None => Cow::Borrowed(UNKNOWN_IP),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn with_peer(mut req: Request<Body>, addr: &str) -> Request<Body> {
        let addr: SocketAddr = addr.parse().unwrap();
        req.extensions_mut().insert(ConnectInfo(addr));
        req
    }

    #[test]
    fn test_direct_mode_uses_peer_address() {
        let req = Request::builder()
            .header("x-forwarded-for", "203.0.113.50")
            .body(Body::empty())
            .unwrap();
        let req = with_peer(req, "198.51.100.7:50312");

        let source = ClientIpSource::new(false);
        // Spoofable header is ignored
        assert_eq!(source.client_id(&req), "198.51.100.7");
    }

    #[test]
    fn test_proxy_mode_uses_first_forwarded_ip() {
        let req = Request::builder()
            .header("x-forwarded-for", "  192.168.1.1  , 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        let req = with_peer(req, "10.0.0.1:443");

        assert_eq!(ClientIpSource::new(true).client_id(&req), "192.168.1.1");
    }

    #[test]
    fn test_proxy_mode_xff_priority_over_real_ip() {
        let req = Request::builder()
            .header("x-forwarded-for", "10.0.0.1")
            .header("x-real-ip", "192.168.1.1")
            .body(Body::empty())
            .unwrap();

        assert_eq!(ClientIpSource::new(true).client_id(&req), "10.0.0.1");
    }

    #[test]
    fn test_proxy_mode_falls_back_to_real_ip() {
        let req = Request::builder()
            .header("x-real-ip", "192.168.1.1")
            .body(Body::empty())
            .unwrap();

        assert_eq!(ClientIpSource::new(true).client_id(&req), "192.168.1.1");
    }

    #[test]
    fn test_proxy_mode_without_headers_uses_peer() {
        let req = with_peer(Request::builder().body(Body::empty()).unwrap(), "[::1]:8080");

        assert_eq!(ClientIpSource::new(true).client_id(&req), "::1");
    }

    #[test]
    fn test_unknown_is_borrowed() {
        let req = Request::builder().body(Body::empty()).unwrap();

        let ip = ClientIpSource::default().client_id(&req);
        assert_eq!(ip, UNKNOWN_IP);
        // No allocation for the shared fallback
        assert!(matches!(ip, Cow::Borrowed(_)));
    }

    #[test]
    fn test_empty_forwarded_header_is_skipped() {
        let req = Request::builder()
            .header("x-forwarded-for", " ")
            .header("x-real-ip", "192.168.1.9")
            .body(Body::empty())
            .unwrap();

        assert_eq!(ClientIpSource::new(true).client_id(&req), "192.168.1.9");
    }
}
