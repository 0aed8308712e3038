use crate::error::{AppError, AppResult};
use crate::models::{BookPatch, NewBook, NewContact};

// =============================================================================
// Validation Constants
// =============================================================================

/// Maximum length for short text fields (titles, names, authors).
pub const MAX_SHORT_TEXT_LENGTH: usize = 255;

/// Maximum length for free text (contact messages, reviews).
pub const MAX_LONG_TEXT_LENGTH: usize = 5000;

/// Maximum length for an email address (RFC 5321 path limit).
pub const MAX_EMAIL_LENGTH: usize = 254;

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

/// Validate a required text field: non-empty and at most `max_len` bytes.
pub fn validate_required_text(value: &str, field: &str, max_len: usize) -> AppResult<()> {
    if value.is_empty() {
        return Err(AppError::BadRequest(format!("{field} is required")));
    }
    validate_optional_text(Some(value), field, max_len)
}

/// Validate an optional text field's length and reject control characters
/// other than newlines and tabs.
pub fn validate_optional_text(value: Option<&str>, field: &str, max_len: usize) -> AppResult<()> {
    let Some(value) = value else {
        return Ok(());
    };

    if value.len() > max_len {
        return Err(AppError::BadRequest(format!(
            "{field} cannot exceed {max_len} characters"
        )));
    }

    if let Some(pos) = value
        .chars()
        .position(|c| c.is_control() && c != '\n' && c != '\r' && c != '\t')
    {
        return Err(AppError::BadRequest(format!(
            "{field} contains invalid control character at position {pos}"
        )));
    }

    Ok(())
}

/// Validate the shape of an email address.
///
/// Rules:
/// - Exactly one `@` with a non-empty local part
/// - Domain contains a dot, and does not start or end with one
/// - No whitespace
pub fn validate_email(email: &str) -> AppResult<()> {
    let invalid = || AppError::BadRequest("Invalid email".to_string());

    if email.is_empty() || email.len() > MAX_EMAIL_LENGTH {
        return Err(invalid());
    }
    if email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }

    let Some((local, domain)) = email.split_once('@') else {
        return Err(invalid());
    };

    if local.is_empty()
        || domain.contains('@')
        || !domain.contains('.')
        || domain.starts_with('.')
        || domain.ends_with('.')
        || domain.contains("..")
    {
        return Err(invalid());
    }

    Ok(())
}

/// Validate an optional star rating.
pub fn validate_rating(rating: Option<u8>) -> AppResult<()> {
    match rating {
        Some(r) if !(MIN_RATING..=MAX_RATING).contains(&r) => Err(AppError::BadRequest(format!(
            "rating must be between {MIN_RATING} and {MAX_RATING}"
        ))),
        _ => Ok(()),
    }
}

/// Parse a numeric record id from a path segment.
pub fn parse_id(raw: &str, resource_type: &str) -> AppResult<u32> {
    raw.parse::<u32>()
        .map_err(|_| AppError::BadRequest(format!("Invalid {resource_type} id '{raw}'")))
}

pub fn validate_new_book(book: &NewBook) -> AppResult<()> {
    validate_required_text(&book.title, "title", MAX_SHORT_TEXT_LENGTH)?;
    validate_required_text(&book.author, "author", MAX_SHORT_TEXT_LENGTH)?;
    validate_optional_text(book.cover_url.as_deref(), "coverUrl", MAX_LONG_TEXT_LENGTH)?;
    validate_optional_text(book.genre.as_deref(), "genre", MAX_SHORT_TEXT_LENGTH)?;
    validate_optional_text(book.review.as_deref(), "review", MAX_LONG_TEXT_LENGTH)?;
    validate_rating(book.rating)
}

/// Fields present in a patch follow the same rules as a new book.
pub fn validate_book_patch(patch: &BookPatch) -> AppResult<()> {
    if let Some(title) = &patch.title {
        validate_required_text(title, "title", MAX_SHORT_TEXT_LENGTH)?;
    }
    if let Some(author) = &patch.author {
        validate_required_text(author, "author", MAX_SHORT_TEXT_LENGTH)?;
    }
    validate_optional_text(patch.cover_url.as_deref(), "coverUrl", MAX_LONG_TEXT_LENGTH)?;
    validate_optional_text(patch.genre.as_deref(), "genre", MAX_SHORT_TEXT_LENGTH)?;
    validate_optional_text(patch.review.as_deref(), "review", MAX_LONG_TEXT_LENGTH)?;
    validate_rating(patch.rating)
}

pub fn validate_new_contact(contact: &NewContact) -> AppResult<()> {
    validate_required_text(&contact.name, "name", MAX_SHORT_TEXT_LENGTH)?;
    validate_email(&contact.email)?;
    validate_required_text(&contact.message, "message", MAX_LONG_TEXT_LENGTH)
}
