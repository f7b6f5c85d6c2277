#![allow(dead_code)]

use std::sync::Arc;

use archytex_api::config::ServerConfig;
use archytex_api::router::build_app_router;
use archytex_api::state::AppState;
use archytex_core::types::UserId;
use archytex_db::{MemoryDocumentStore, MemorySessionGate};
use archytex_render::{MemorySideStore, MemoryWorkQueue};
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        store_timeout_secs: 1,
        subscriber_capacity: 4,
        ..ServerConfig::default()
    }
}

/// In-memory backends behind a test app, for seeding and inspection.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryDocumentStore>,
    pub sessions: Arc<MemorySessionGate>,
    pub side_store: Arc<MemorySideStore>,
    pub queue: Arc<MemoryWorkQueue>,
}

impl TestApp {
    /// A fresh router over the same state; `oneshot` consumes the router.
    pub fn app(&self) -> Router {
        self.router.clone()
    }

    /// Create a user with a live session and return `(user, token)`.
    pub async fn login(&self, token: &str) -> (UserId, String) {
        let user = UserId::new();
        self.sessions.insert(token, user).await;
        (user, token.to_string())
    }
}

/// Build the full application router, with all middleware layers, over
/// in-memory stores.
pub fn build_test_app() -> TestApp {
    let config = test_config();
    let store = Arc::new(MemoryDocumentStore::new());
    let sessions = Arc::new(MemorySessionGate::new());
    let side_store = Arc::new(MemorySideStore::new());
    let queue = Arc::new(MemoryWorkQueue::new());

    let state = AppState::new(
        config.clone(),
        store.clone(),
        sessions.clone(),
        side_store.clone(),
        queue.clone(),
    );
    let router = build_app_router(state.clone(), &config);

    TestApp {
        router,
        state,
        store,
        sessions,
        side_store,
        queue,
    }
}

pub async fn send(
    app: Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Body,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    app.oneshot(builder.body(body).unwrap()).await.unwrap()
}

pub async fn get(app: Router, uri: &str, token: Option<&str>) -> Response<Body> {
    send(app, Method::GET, uri, token, Body::empty()).await
}

pub async fn post_json(
    app: Router,
    uri: &str,
    token: Option<&str>,
    json: serde_json::Value,
) -> Response<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("Content-Type", "application/json");
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    app.oneshot(builder.body(Body::from(json.to_string())).unwrap())
        .await
        .unwrap()
}

pub async fn patch_json(
    app: Router,
    uri: &str,
    token: Option<&str>,
    json: serde_json::Value,
) -> Response<Body> {
    let request = Request::builder()
        .method(Method::PATCH)
        .uri(uri)
        .header("Content-Type", "application/json")
        .header("Authorization", format!("Bearer {}", token.unwrap_or_default()))
        .body(Body::from(json.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
