//! Handlers for `/auth/projects/{id}/renders`.

use archytex_core::render_params::RenderParams;
use archytex_core::types::{ProjectId, RenderId};
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Largest accepted scene payload.
pub const MAX_SCENE_BYTES: usize = 64 * 1024 * 1024;

/// Query string of a render request. Fields are parsed by hand so a bad
/// value yields a JSON error naming the field.
#[derive(Debug, Deserialize)]
pub struct RenderQuery {
    pub width: Option<String>,
    pub height: Option<String>,
    pub samples: Option<String>,
}

fn parse_field(name: &str, value: Option<&str>) -> Result<u32, AppError> {
    value
        .and_then(|v| v.trim().parse().ok())
        .ok_or_else(|| AppError::BadRequest(format!("invalid {name} field")))
}

/// POST /api/auth/projects/{id}/renders?width&height&samples
///
/// The request body is the scene, forwarded to the worker unchanged.
pub async fn create(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<RenderQuery>,
    scene: Bytes,
) -> AppResult<(StatusCode, Json<DataResponse<RenderId>>)> {
    let project: ProjectId = id.parse()?;
    let params = RenderParams {
        width: parse_field("width", query.width.as_deref())?,
        height: parse_field("height", query.height.as_deref())?,
        samples: parse_field("samples", query.samples.as_deref())?,
        scene: scene.to_vec(),
    };

    let render = state
        .dispatcher
        .dispatch(user.user_id, project, &params)
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: render })))
}

/// DELETE /api/auth/projects/{id}/renders/{render}
pub async fn delete(
    user: AuthUser,
    State(state): State<AppState>,
    Path((id, render)): Path<(String, String)>,
) -> AppResult<StatusCode> {
    let project: ProjectId = id.parse()?;
    let render: RenderId = render.parse()?;
    state
        .dispatcher
        .delete_render(user.user_id, project, render)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn render_fields_must_be_unsigned_integers() {
        assert_eq!(parse_field("width", Some("512")).unwrap(), 512);
        assert_eq!(parse_field("width", Some(" 8 ")).unwrap(), 8);
        for bad in [None, Some(""), Some("-4"), Some("4.0"), Some("wide")] {
            assert_matches!(
                parse_field("width", bad),
                Err(AppError::BadRequest(msg)) if msg == "invalid width field"
            );
        }
    }
}
