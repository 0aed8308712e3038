//! Project endpoints (read-only).
//!
//! # Endpoints
//!
//! - `GET /api/projects` - List all projects
//! - `GET /api/projects/{id}` - Get one project
//!
//! Both are served through the response cache with `PROJECTS_CACHE_TTL_SECS`.

use axum::Json;
use axum::extract::{Path, State};
use tracing::instrument;

use crate::error::{AppError, AppResult};
use crate::models::Project;
use crate::state::AppState;
use crate::validation::parse_id;

#[instrument(skip(state))]
pub async fn list_projects(State(state): State<AppState>) -> Json<Vec<Project>> {
    Json(state.storage.projects().await)
}

#[instrument(skip(state))]
pub async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Project>> {
    let id = parse_id(&id, "project")?;

    state
        .storage
        .project(id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Project not found".to_string()))
}
