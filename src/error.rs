use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Application-wide error types with appropriate HTTP status codes.
///
/// # Rejections
///
/// The pipeline produces three kinds of early rejection that never reach a
/// handler:
///
/// - `MissingUserAgent` - request carried no `User-Agent` header (400)
/// - `Forbidden` - request matched a scanner/exploit signature (403)
/// - `RateLimited` - client exhausted its quota for the current window (429)
///
/// Everything a handler returns is one of the remaining variants.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Request is missing a User-Agent header")]
    MissingUserAgent,

    #[error("Request matched a blocked signature: {0}")]
    Forbidden(String),

    #[error("Rate limit exceeded, retry after {retry_after}s")]
    RateLimited { retry_after: u64 },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Error response body for API endpoints.
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(rename = "retryAfter", skip_serializing_if = "Option::is_none")]
    retry_after: Option<u64>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message, retry_after) = match &self {
            // Rejections are expected traffic; the stage that produced them logs
            // with client context, so only trace here.
            AppError::MissingUserAgent => {
                tracing::debug!(error = %self, "Request rejected");
                (
                    StatusCode::BAD_REQUEST,
                    "invalid_request",
                    "Invalid request".to_string(),
                    None,
                )
            }
            AppError::Forbidden(_) => {
                tracing::debug!(error = %self, "Request rejected");
                (
                    StatusCode::FORBIDDEN,
                    "forbidden",
                    "Forbidden".to_string(),
                    None,
                )
            }
            AppError::RateLimited { retry_after } => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                "Too many requests. Please try again later.".to_string(),
                Some(*retry_after),
            ),

            // Internal errors - never expose internal details to clients
            AppError::Internal(_) => {
                tracing::error!(error = %self, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred. Please try again later.".to_string(),
                    None,
                )
            }
            AppError::ConfigError(_) => {
                tracing::error!(error = %self, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "config_error",
                    "Service configuration error.".to_string(),
                    None,
                )
            }

            // Client errors - safe to show the message as it's user-facing
            AppError::SerializationError(e) => (
                StatusCode::BAD_REQUEST,
                "serialization_error",
                sanitize_serde_error(e),
                None,
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone(), None),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", msg.clone(), None)
            }
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
            retry_after,
        };

        (status, axum::Json(body)).into_response()
    }
}

/// Sanitize serde error messages to avoid leaking internal type information.
///
/// Serde errors can contain internal struct/field names which shouldn't be
/// exposed to external clients. This function extracts the useful parts.
fn sanitize_serde_error(e: &serde_json::Error) -> String {
    let msg = e.to_string();

    if msg.contains("missing field")
        && let Some(start) = msg.find('`')
        && let Some(end) = msg[start + 1..].find('`')
    {
        let field = &msg[start + 1..start + 1 + end];
        return format!("Missing required field: {field}");
    }

    if msg.contains("unknown variant") {
        return "Unsupported value in request body".to_string();
    }

    if msg.contains("invalid type") {
        return "Invalid data type in request body".to_string();
    }

    if msg.contains("EOF while parsing") || msg.contains("expected") {
        return "Malformed JSON in request body".to_string();
    }

    "Invalid request format".to_string()
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_rate_limited_body_carries_retry_after() {
        let response = AppError::RateLimited { retry_after: 42 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let body = body_json(response).await;
        assert_eq!(body["retryAfter"], 42);
        assert_eq!(
            body["message"],
            "Too many requests. Please try again later."
        );
    }

    #[tokio::test]
    async fn test_internal_error_is_not_leaked() {
        let response = AppError::Internal("db password=hunter2".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert!(!body["message"].as_str().unwrap().contains("hunter2"));
        assert!(body.get("retryAfter").is_none());
    }

    #[tokio::test]
    async fn test_rejection_statuses() {
        assert_eq!(
            AppError::MissingUserAgent.into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Forbidden("sqlmap".to_string())
                .into_response()
                .status(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_sanitize_missing_field() {
        #[derive(Debug, serde::Deserialize)]
        #[allow(dead_code)]
        struct Probe {
            title: String,
        }

        let err = serde_json::from_str::<Probe>("{}").unwrap_err();
        assert_eq!(sanitize_serde_error(&err), "Missing required field: title");
    }

    #[test]
    fn test_sanitize_malformed_json() {
        let err = serde_json::from_str::<Value>("{\"a\":").unwrap_err();
        assert_eq!(sanitize_serde_error(&err), "Malformed JSON in request body");
    }
}
