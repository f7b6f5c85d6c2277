use std::sync::Arc;

use archytex_core::types::UserId;
use archytex_db::{DocumentStore, MemorySessionGate, SessionGate};
use archytex_events::UpdateFeed;
use archytex_render::{RenderDispatcher, SideStore, WorkQueue};

use crate::config::ServerConfig;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheap to clone; every backend is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Projects and renders, plus their change feed.
    pub store: Arc<dyn DocumentStore>,
    /// Bearer credential to user resolution.
    pub sessions: Arc<dyn SessionGate>,
    /// Render job parameter store (health checks only; writes go through
    /// the dispatcher).
    pub side_store: Arc<dyn SideStore>,
    /// Render job queue (health checks only).
    pub queue: Arc<dyn WorkQueue>,
    /// Live subscription factory.
    pub feed: Arc<UpdateFeed>,
    pub dispatcher: Arc<RenderDispatcher>,
    pub config: Arc<ServerConfig>,
    /// WebSocket connection registry.
    pub ws_manager: Arc<WsManager>,
}

impl AppState {
    /// Wire the feed, dispatcher and connection registry around the given
    /// backends.
    pub fn new(
        config: ServerConfig,
        store: Arc<dyn DocumentStore>,
        sessions: Arc<dyn SessionGate>,
        side_store: Arc<dyn SideStore>,
        queue: Arc<dyn WorkQueue>,
    ) -> Self {
        let feed = UpdateFeed::new(Arc::clone(&store), config.feed_config());
        let dispatcher = RenderDispatcher::new(
            Arc::clone(&store),
            Arc::clone(&side_store),
            Arc::clone(&queue),
            config.dispatch_config(),
        );
        Self {
            store,
            sessions,
            side_store,
            queue,
            feed: Arc::new(feed),
            dispatcher: Arc::new(dispatcher),
            config: Arc::new(config),
            ws_manager: Arc::new(WsManager::new()),
        }
    }
}

/// In-memory session gate for runs without a database.
///
/// With `DEV_SESSION_TOKEN` set, that token resolves to a freshly generated
/// user; otherwise every authenticated route answers 401.
pub async fn memory_sessions(config: &ServerConfig) -> (Arc<MemorySessionGate>, Option<UserId>) {
    let gate = Arc::new(MemorySessionGate::new());
    let Some(token) = config.dev_session_token.as_deref() else {
        tracing::warn!("DEV_SESSION_TOKEN not set, in-memory session gate accepts no tokens");
        return (gate, None);
    };
    let user = UserId::new();
    gate.insert(token, user).await;
    tracing::info!(user_id = %user, "Seeded development session");
    (gate, Some(user))
}
