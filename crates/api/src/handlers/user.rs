//! Handler for the signed-in user's profile.

use archytex_core::account::UserProfile;
use archytex_core::timeout::with_timeout;
use axum::extract::State;
use axum::Json;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/auth/user
pub async fn get_profile(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<UserProfile>>> {
    let profile = with_timeout(
        state.config.store_timeout(),
        "user profile",
        state.store.user_profile(user.user_id),
    )
    .await?;
    Ok(Json(DataResponse { data: profile }))
}
