//! Reading list endpoints.
//!
//! # Endpoints
//!
//! - `GET /api/books` - List all books (cached)
//! - `GET /api/books/{id}` - Get one book (cached)
//! - `POST /api/books` - Add a book
//! - `PATCH /api/books/{id}` - Update some fields of a book
//! - `DELETE /api/books/{id}` - Remove a book
//!
//! Every successful mutation drops all cached responses whose key contains
//! `/api/books`, so the next read reflects the change.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use tracing::{info, instrument};

use super::util::parse_json;
use crate::error::{AppError, AppResult};
use crate::models::{Book, BookPatch, NewBook};
use crate::state::AppState;
use crate::validation::{parse_id, validate_book_patch, validate_new_book};

const BOOKS_CACHE_PATTERN: &str = "/api/books";

#[instrument(skip(state))]
pub async fn list_books(State(state): State<AppState>) -> Json<Vec<Book>> {
    Json(state.storage.books().await)
}

#[instrument(skip(state))]
pub async fn get_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Book>> {
    let id = parse_id(&id, "book")?;

    state
        .storage
        .book(id)
        .await
        .map(Json)
        .ok_or_else(book_not_found)
}

#[instrument(skip(state, body))]
pub async fn create_book(
    State(state): State<AppState>,
    body: Bytes,
) -> AppResult<(StatusCode, Json<Book>)> {
    let new_book: NewBook = parse_json(&body)?;
    validate_new_book(&new_book)?;

    let book = state.storage.create_book(new_book).await;
    invalidate_books(&state);
    info!(book_id = book.id, "Book added");

    Ok((StatusCode::CREATED, Json(book)))
}

#[instrument(skip(state, body))]
pub async fn update_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> AppResult<Json<Book>> {
    let id = parse_id(&id, "book")?;
    let patch: BookPatch = parse_json(&body)?;
    validate_book_patch(&patch)?;

    let book = state
        .storage
        .update_book(id, patch)
        .await
        .ok_or_else(book_not_found)?;
    invalidate_books(&state);
    info!(book_id = id, "Book updated");

    Ok(Json(book))
}

#[instrument(skip(state))]
pub async fn delete_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let id = parse_id(&id, "book")?;

    if !state.storage.delete_book(id).await {
        return Err(book_not_found());
    }
    invalidate_books(&state);
    info!(book_id = id, "Book deleted");

    Ok(StatusCode::NO_CONTENT)
}

fn invalidate_books(state: &AppState) {
    let removed = state.pipeline.cache.invalidate(Some(BOOKS_CACHE_PATTERN));
    tracing::debug!(removed, "Invalidated cached book responses");
}

fn book_not_found() -> AppError {
    AppError::NotFound("Book not found".to_string())
}
