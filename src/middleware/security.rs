//! Outermost pipeline stage: request validation and security headers.
//!
//! ```text
//! Request → validate ─┬─ ok ──→ inner service ──┐
//!                     └─ rejected (400 / 403) ──┴─→ security headers → Response
//! ```
//!
//! Rejected requests never reach the timing stage, so they are not counted in
//! request metrics. They are logged at `warn` with the client id and counted in
//! `portfolio_blocked_requests_total`.

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{Request, Response};
use axum::response::IntoResponse;
use tower::{Layer, Service};
use tracing::warn;

use super::ip::ClientIpSource;
use crate::error::AppError;
use crate::metrics::record_blocked_request;
use crate::security::SecurityPolicy;

#[derive(Clone)]
pub struct SecurityLayer {
    policy: Arc<SecurityPolicy>,
    client_ip: ClientIpSource,
}

impl SecurityLayer {
    pub fn new(policy: Arc<SecurityPolicy>, client_ip: ClientIpSource) -> Self {
        Self { policy, client_ip }
    }
}

impl<S> Layer<S> for SecurityLayer {
    type Service = SecurityService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SecurityService {
            inner,
            policy: self.policy.clone(),
            client_ip: self.client_ip,
        }
    }
}

#[derive(Clone)]
pub struct SecurityService<S> {
    inner: S,
    policy: Arc<SecurityPolicy>,
    client_ip: ClientIpSource,
}

impl<S> Service<Request<Body>> for SecurityService<S>
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
        let policy = self.policy.clone();

        if let Err(rejection) = policy.validate(&req) {
            let client_ip = self.client_ip.client_id(&req);
            let user_agent = req
                .headers()
                .get(axum::http::header::USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("");

            let reason = match &rejection {
                AppError::MissingUserAgent => "missing_user_agent",
                _ => "blocked_signature",
            };
            warn!(
                client_ip = %client_ip,
                path = %req.uri().path(),
                user_agent = %user_agent,
                reason = %rejection,
                "Blocked request"
            );
            record_blocked_request(reason);

            let mut response = rejection.into_response();
            policy.apply_headers(response.headers_mut());
            return Box::pin(async move { Ok(response) });
        }

        let mut inner = self.inner.clone();

        Box::pin(async move {
            let mut response = inner.call(req).await?;
            policy.apply_headers(response.headers_mut());
            Ok(response)
        })
    }
}
