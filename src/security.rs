//! Security headers and request-signature rejection.
//!
//! [`SecurityPolicy`] is consulted by the outermost pipeline stage. It has two
//! jobs:
//!
//! - **Validation**: reject requests with no `User-Agent`, and requests whose
//!   `User-Agent`, URL or `Referer` match a known scanner or script-injection
//!   signature.
//! - **Headers**: stamp a fixed set of browser security headers on every
//!   response, adding HSTS in production.
//!
//! Signature matching is a best-effort heuristic against noisy scanners. It is
//! trivially bypassed (a spoofed `User-Agent`, percent-encoding) and is not a
//! security boundary.

use axum::http::header::{
    CONTENT_SECURITY_POLICY, REFERER, REFERRER_POLICY, STRICT_TRANSPORT_SECURITY,
    USER_AGENT, X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS, X_XSS_PROTECTION,
};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Request};
use regex::{RegexSet, RegexSetBuilder};

use crate::error::AppError;

/// Signatures checked against the User-Agent, URL and Referer.
pub const BLOCKED_SIGNATURES: &[&str] = &[
    "sqlmap",
    "nikto",
    "nessus",
    "openvas",
    "nmap",
    "<script",
    "javascript:",
    "vbscript:",
];

const CONTENT_SECURITY_POLICY_VALUE: &str = concat!(
    "default-src 'self'; ",
    "img-src 'self' data: https:; ",
    "script-src 'self' 'unsafe-inline' 'unsafe-eval' https://cdnjs.cloudflare.com; ",
    "style-src 'self' 'unsafe-inline' https://fonts.googleapis.com https://cdnjs.cloudflare.com; ",
    "font-src 'self' https://fonts.gstatic.com https://cdnjs.cloudflare.com; ",
    "connect-src 'self' ws: wss:; ",
    "media-src 'self'; ",
    "object-src 'none'; ",
    "base-uri 'self'; ",
    "form-action 'self'",
);

const HSTS_VALUE: &str = "max-age=31536000; includeSubDomains";

/// Which part of the request carried a blocked signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchedField {
    UserAgent,
    Url,
    Referer,
}

impl MatchedField {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchedField::UserAgent => "user-agent",
            MatchedField::Url => "url",
            MatchedField::Referer => "referer",
        }
    }
}

/// A blocked signature found in a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureMatch {
    pub field: MatchedField,
    pub signature: &'static str,
}

#[derive(Debug, Clone)]
pub struct SecurityPolicy {
    production: bool,
    signatures: RegexSet,
}

impl SecurityPolicy {
    /// Build the policy. HSTS is only emitted when `production` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the signature set fails to compile.
    pub fn new(production: bool) -> Result<Self, regex::Error> {
        let signatures = RegexSetBuilder::new(BLOCKED_SIGNATURES.iter().map(|s| regex::escape(s)))
            .case_insensitive(true)
            .build()?;

        Ok(Self {
            production,
            signatures,
        })
    }

    pub fn is_production(&self) -> bool {
        self.production
    }

    /// Validate an inbound request.
    ///
    /// # Errors
    ///
    /// - `AppError::MissingUserAgent` if the `User-Agent` header is absent or empty
    /// - `AppError::Forbidden` if any inspected field matches a blocked signature
    pub fn validate<B>(&self, req: &Request<B>) -> Result<(), AppError> {
        let user_agent = match req.headers().get(USER_AGENT) {
            Some(value) if !value.is_empty() => String::from_utf8_lossy(value.as_bytes()),
            _ => return Err(AppError::MissingUserAgent),
        };

        if let Some(found) = self.find_signature(req, &user_agent) {
            return Err(AppError::Forbidden(format!(
                "'{}' in {}",
                found.signature,
                found.field.as_str()
            )));
        }

        Ok(())
    }

    /// First blocked signature carried by the request, checking the
    /// User-Agent, then the URL, then the Referer.
    pub fn find_signature<B>(&self, req: &Request<B>, user_agent: &str) -> Option<SignatureMatch> {
        let url = req
            .uri()
            .path_and_query()
            .map_or_else(|| req.uri().path(), |pq| pq.as_str());
        let referer = req
            .headers()
            .get(REFERER)
            .map(|value| String::from_utf8_lossy(value.as_bytes()))
            .unwrap_or_default();

        [
            (MatchedField::UserAgent, user_agent),
            (MatchedField::Url, url),
            (MatchedField::Referer, &*referer),
        ]
        .into_iter()
        .find_map(|(field, haystack)| {
            self.match_signature(haystack)
                .map(|signature| SignatureMatch { field, signature })
        })
    }

    /// The first blocked signature contained in `haystack`, if any.
    pub fn match_signature(&self, haystack: &str) -> Option<&'static str> {
        self.signatures
            .matches(haystack)
            .iter()
            .next()
            .and_then(|index| BLOCKED_SIGNATURES.get(index).copied())
    }

    /// Insert the security headers, replacing any value a handler set.
    pub fn apply_headers(&self, headers: &mut HeaderMap) {
        headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
        headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
        headers.insert(X_XSS_PROTECTION, HeaderValue::from_static("1; mode=block"));
        headers.insert(
            REFERRER_POLICY,
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        );
        headers.insert(
            HeaderName::from_static("permissions-policy"),
            HeaderValue::from_static("camera=(), microphone=(), geolocation=()"),
        );
        headers.insert(
            CONTENT_SECURITY_POLICY,
            HeaderValue::from_static(CONTENT_SECURITY_POLICY_VALUE),
        );

        if self.production {
            headers.insert(STRICT_TRANSPORT_SECURITY, HeaderValue::from_static(HSTS_VALUE));
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn policy() -> SecurityPolicy {
        SecurityPolicy::new(false).unwrap()
    }

    fn request(uri: &str, user_agent: Option<&str>, referer: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(ua) = user_agent {
            builder = builder.header(USER_AGENT, ua);
        }
        if let Some(referer) = referer {
            builder = builder.header(REFERER, referer);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_ordinary_browser_request_passes() {
        let req = request(
            "/api/books?status=read",
            Some("Mozilla/5.0 (X11; Linux x86_64) Firefox/128.0"),
            Some("https://example.com/books"),
        );
        assert!(policy().validate(&req).is_ok());
    }

    #[test]
    fn test_missing_user_agent_is_rejected() {
        let req = request("/api/books", None, None);
        assert!(matches!(
            policy().validate(&req),
            Err(AppError::MissingUserAgent)
        ));
    }

    #[test]
    fn test_empty_user_agent_is_rejected() {
        let req = request("/api/books", Some(""), None);
        assert!(matches!(
            policy().validate(&req),
            Err(AppError::MissingUserAgent)
        ));
    }

    #[test]
    fn test_scanner_user_agent_is_forbidden() {
        let req = request("/", Some("sqlmap/1.7.2#stable (https://sqlmap.org)"), None);
        assert!(matches!(
            policy().validate(&req),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        let policy = policy();
        assert_eq!(
            policy.match_signature("Mozilla/5.0 (compatible; Nmap Scripting Engine)"),
            Some("nmap")
        );
        assert_eq!(policy.match_signature("<SCRIPT src=x>"), Some("<script"));
        assert_eq!(policy.match_signature("NIKTO/2.5.0"), Some("nikto"));
        assert_eq!(policy.match_signature("JavaScript:alert(1)"), Some("javascript:"));
        assert_eq!(policy.match_signature("curl/8.5.0"), None);
    }

    #[test]
    fn test_script_scheme_in_query_is_forbidden() {
        let req = request(
            "/api/books?next=JavaScript:alert(1)",
            Some("curl/8.5.0"),
            None,
        );
        let found = policy().find_signature(&req, "curl/8.5.0").unwrap();
        assert_eq!(found.field, MatchedField::Url);
        assert_eq!(found.signature, "javascript:");
        assert!(policy().validate(&req).is_err());
    }

    #[test]
    fn test_referer_is_inspected() {
        let req = request(
            "/api/projects",
            Some("Mozilla/5.0"),
            Some("vbscript:msgbox(1)"),
        );
        let found = policy().find_signature(&req, "Mozilla/5.0").unwrap();
        assert_eq!(found.field, MatchedField::Referer);
        assert_eq!(found.signature, "vbscript:");
    }

    #[test]
    fn test_user_agent_checked_before_url() {
        let req = request("/?x=nessus", Some("openvas"), None);
        let found = policy().find_signature(&req, "openvas").unwrap();
        assert_eq!(found.field, MatchedField::UserAgent);
    }

    #[test]
    fn test_headers_without_hsts_outside_production() {
        let mut headers = HeaderMap::new();
        policy().apply_headers(&mut headers);

        assert_eq!(headers.get(X_CONTENT_TYPE_OPTIONS).unwrap(), "nosniff");
        assert_eq!(headers.get(X_FRAME_OPTIONS).unwrap(), "DENY");
        assert_eq!(headers.get(X_XSS_PROTECTION).unwrap(), "1; mode=block");
        assert_eq!(
            headers.get(REFERRER_POLICY).unwrap(),
            "strict-origin-when-cross-origin"
        );
        assert_eq!(
            headers.get("permissions-policy").unwrap(),
            "camera=(), microphone=(), geolocation=()"
        );
        let csp = headers.get(CONTENT_SECURITY_POLICY).unwrap().to_str().unwrap();
        assert!(csp.starts_with("default-src 'self'; "));
        assert!(csp.contains("object-src 'none'"));
        assert!(csp.ends_with("form-action 'self'"));
        assert!(headers.get(STRICT_TRANSPORT_SECURITY).is_none());
    }

    #[test]
    fn test_production_adds_hsts() {
        let mut headers = HeaderMap::new();
        SecurityPolicy::new(true).unwrap().apply_headers(&mut headers);

        assert_eq!(
            headers.get(STRICT_TRANSPORT_SECURITY).unwrap(),
            "max-age=31536000; includeSubDomains"
        );
    }

    #[test]
    fn test_apply_headers_overwrites_handler_values() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static("SAMEORIGIN"));

        policy().apply_headers(&mut headers);

        assert_eq!(headers.get_all(X_FRAME_OPTIONS).iter().count(), 1);
        assert_eq!(headers.get(X_FRAME_OPTIONS).unwrap(), "DENY");
    }
}
