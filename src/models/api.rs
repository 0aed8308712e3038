use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Book, BookStatus};

/// Request to add a book to the reading list.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBook {
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub cover_url: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub rating: Option<u8>,
    #[serde(default)]
    pub review: Option<String>,
    /// Defaults to `read`
    #[serde(default)]
    pub status: BookStatus,
}

/// Partial update of a book. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookPatch {
    pub title: Option<String>,
    pub author: Option<String>,
    pub cover_url: Option<String>,
    pub genre: Option<String>,
    pub rating: Option<u8>,
    pub review: Option<String>,
    pub status: Option<BookStatus>,
}

impl BookPatch {
    /// Apply the present fields to `book`.
    pub fn apply(self, book: &mut Book) {
        if let Some(title) = self.title {
            book.title = title;
        }
        if let Some(author) = self.author {
            book.author = author;
        }
        if let Some(cover_url) = self.cover_url {
            book.cover_url = Some(cover_url);
        }
        if let Some(genre) = self.genre {
            book.genre = Some(genre);
        }
        if let Some(rating) = self.rating {
            book.rating = Some(rating);
        }
        if let Some(review) = self.review {
            book.review = Some(review);
        }
        if let Some(status) = self.status {
            book.status = status;
        }
    }
}

/// Contact-form submission.
#[derive(Debug, Clone, Deserialize)]
pub struct NewContact {
    pub name: String,
    pub email: String,
    pub message: String,
}

/// Response after a contact-form submission was stored.
#[derive(Debug, Serialize)]
pub struct ContactResponse {
    pub success: bool,
    pub message: String,
}

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Service status (always "healthy" while the process serves requests)
    pub status: String,
    pub uptime_seconds: u64,
    pub environment: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
}
