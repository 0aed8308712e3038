//! Contact form endpoint.
//!
//! `POST /api/contact` sits behind the strict contact-form rate limiter in
//! addition to the general API limiter.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use tracing::{info, instrument};

use super::util::parse_json;
use crate::error::AppResult;
use crate::middleware::RequestId;
use crate::models::{ContactResponse, NewContact};
use crate::state::AppState;
use crate::validation::validate_new_contact;

/// Store a contact-form submission.
///
/// # Response Body (201)
///
/// ```json
/// { "success": true, "message": "Your message has been sent successfully!" }
/// ```
#[instrument(skip_all)]
pub async fn submit_contact(
    State(state): State<AppState>,
    request_id: RequestId,
    body: Bytes,
) -> AppResult<(StatusCode, Json<ContactResponse>)> {
    let submission: NewContact = parse_json(&body)?;
    validate_new_contact(&submission)?;

    let contact = state.storage.create_contact(submission).await;
    info!(
        contact_id = contact.id,
        request_id = %request_id,
        "Contact message received"
    );

    Ok((
        StatusCode::CREATED,
        Json(ContactResponse {
            success: true,
            message: "Your message has been sent successfully!".to_string(),
        }),
    ))
}
