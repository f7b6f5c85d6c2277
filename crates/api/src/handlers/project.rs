//! Handlers for the `/auth/projects` resource.
//!
//! Create and rename take the title as a bare JSON string body.

use archytex_core::project::{validate_title, Project};
use archytex_core::timeout::with_timeout;
use archytex_core::types::ProjectId;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/auth/projects
pub async fn create(
    user: AuthUser,
    State(state): State<AppState>,
    Json(title): Json<String>,
) -> AppResult<(StatusCode, Json<DataResponse<ProjectId>>)> {
    let title = title.trim();
    validate_title(title)?;

    let project = with_timeout(
        state.config.store_timeout(),
        "create project",
        state.store.create_project(user.user_id, title),
    )
    .await?;

    tracing::info!(user_id = %user.user_id, project_id = %project.id, "Project created");
    Ok((StatusCode::CREATED, Json(DataResponse { data: project.id })))
}

/// GET /api/auth/projects/{id}
pub async fn get_by_id(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<DataResponse<Project>>> {
    let id: ProjectId = id.parse()?;
    let project = with_timeout(
        state.config.store_timeout(),
        "get project",
        state.store.get_project(user.user_id, id),
    )
    .await?;
    Ok(Json(DataResponse { data: project }))
}

/// PATCH /api/auth/projects/{id}
pub async fn rename(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(title): Json<String>,
) -> AppResult<StatusCode> {
    let id: ProjectId = id.parse()?;
    let title = title.trim();
    validate_title(title)?;

    with_timeout(
        state.config.store_timeout(),
        "rename project",
        state.store.rename_project(user.user_id, id, title),
    )
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/auth/projects/{id}
pub async fn delete(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let id: ProjectId = id.parse()?;
    with_timeout(
        state.config.store_timeout(),
        "delete project",
        state.store.delete_project(user.user_id, id),
    )
    .await?;

    tracing::info!(user_id = %user.user_id, project_id = %id, "Project deleted");
    Ok(StatusCode::NO_CONTENT)
}
