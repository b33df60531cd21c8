//! `/tasks` CRUD handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use huddle_core::task::{Task, TaskPatch};

use crate::error::ApiError;
use crate::server::AppState;

/// Any integer is a well-formed id; ids below 1 simply never exist.
fn parse_id(raw: &str) -> Result<u64, ApiError> {
    let id: i64 = raw
        .parse()
        .map_err(|_| ApiError::BadRequest("Invalid task ID".into()))?;
    u64::try_from(id).map_err(|_| ApiError::NotFound)
}

/// POST /tasks
pub async fn create(
    State(state): State<AppState>,
    body: Result<Json<TaskPatch>, JsonRejection>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    let Json(patch) = body?;
    let task = state.tasks.create(patch);
    Ok((StatusCode::CREATED, Json(task)))
}

/// GET /tasks
pub async fn list(State(state): State<AppState>) -> Json<Vec<Task>> {
    Json(state.tasks.list())
}

/// GET /tasks/{id}
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Task>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(state.tasks.get(id)?))
}

/// PUT /tasks/{id}
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<TaskPatch>, JsonRejection>,
) -> Result<Json<Task>, ApiError> {
    let id = parse_id(&id)?;
    let Json(patch) = body?;
    Ok(Json(state.tasks.update(id, &patch)?))
}

/// DELETE /tasks/{id}
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    state.tasks.delete(id)?;
    Ok(StatusCode::NO_CONTENT)
}
