//! Shared utilities for handlers.

use axum::body::Bytes;
use serde::de::DeserializeOwned;

use crate::error::AppResult;

/// Deserialize a JSON request body.
///
/// Handlers take the raw body instead of `axum::Json` so that malformed
/// input, wrong content types and schema errors all produce the same
/// sanitized `AppError::SerializationError` response.
pub fn parse_json<T: DeserializeOwned>(body: &Bytes) -> AppResult<T> {
    Ok(serde_json::from_slice(body)?)
}
