//! Session-token authentication extractor for Axum handlers.

use archytex_core::error::CoreError;
use archytex_core::timeout::with_timeout;
use archytex_core::types::UserId;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::AppError;
use crate::state::AppState;

/// Authenticated user resolved from a `Bearer` session token in the
/// `Authorization` header.
///
/// ```ignore
/// async fn my_handler(user: AuthUser) -> AppResult<Json<()>> {
///     tracing::info!(user_id = %user.user_id, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub user_id: UserId,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::Core(CoreError::Unauthorized(
                    "Missing Authorization header".into(),
                ))
            })?;

        let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
            AppError::Core(CoreError::Unauthorized(
                "Invalid Authorization format. Expected: Bearer <token>".into(),
            ))
        })?;

        let user_id = resolve_session(state, token.trim()).await?;
        Ok(AuthUser { user_id })
    }
}

/// Resolve a session token under the configured store deadline.
pub async fn resolve_session(state: &AppState, token: &str) -> Result<UserId, CoreError> {
    with_timeout(
        state.config.store_timeout(),
        "resolve session",
        state.sessions.resolve(token),
    )
    .await
}
