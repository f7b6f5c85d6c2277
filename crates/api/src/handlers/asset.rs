//! Handler for the public asset catalog.

use archytex_core::account::{AssetCatalog, AssetKind};
use archytex_core::timeout::with_timeout;
use axum::extract::State;
use axum::Json;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/assets
pub async fn list(State(state): State<AppState>) -> AppResult<Json<DataResponse<AssetCatalog>>> {
    let limit = state.config.store_timeout();
    let (props, textures) = tokio::try_join!(
        with_timeout(limit, "list props", state.store.list_assets(AssetKind::Prop)),
        with_timeout(
            limit,
            "list textures",
            state.store.list_assets(AssetKind::Texture)
        ),
    )?;
    Ok(Json(DataResponse {
        data: AssetCatalog { props, textures },
    }))
}
