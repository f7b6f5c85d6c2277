pub mod health;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the `/api` route tree.
///
/// ```text
/// /ws                                      live updates; first frame carries the session token
/// /assets                                  prop and texture catalog
///
/// /auth/ws                                 live updates; Bearer session token
/// /auth/user                               profile of the signed-in user
/// /auth/projects                           create
/// /auth/projects/{id}                      get, rename, delete
/// /auth/projects/{id}/renders              dispatch a render (scene in body)
/// /auth/projects/{id}/renders/{render}     delete a render
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/assets", get(handlers::asset::list))
        .nest("/auth", auth_routes())
}

fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::auth_ws_handler))
        .route("/user", get(handlers::user::get_profile))
        .route("/projects", post(handlers::project::create))
        .route(
            "/projects/{id}",
            get(handlers::project::get_by_id)
                .patch(handlers::project::rename)
                .delete(handlers::project::delete),
        )
        .route(
            "/projects/{id}/renders",
            post(handlers::render::create)
                .layer(DefaultBodyLimit::max(handlers::render::MAX_SCENE_BYTES)),
        )
        .route(
            "/projects/{id}/renders/{render}",
            delete(handlers::render::delete),
        )
}
