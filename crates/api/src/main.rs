use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use archytex_db::{
    DocumentStore, MemoryDocumentStore, PgDocumentStore, PgSessionGate, SessionGate,
};
use archytex_render::{
    MemorySideStore, MemoryWorkQueue, RedisSideStore, RedisWorkQueue, SideStore, WorkQueue,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use archytex_api::config::ServerConfig;
use archytex_api::router::build_app_router;
use archytex_api::state::{memory_sessions, AppState};
use archytex_api::ws;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "archytex_api=debug,archytex_events=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Document store ---
    let (store, sessions): (Arc<dyn DocumentStore>, Arc<dyn SessionGate>) =
        match &config.database_url {
            Some(database_url) => {
                let pool = archytex_db::create_pool(database_url)
                    .await
                    .expect("Failed to connect to database");
                tracing::info!("Database connection pool created");

                archytex_db::health_check(&pool)
                    .await
                    .expect("Database health check failed");
                tracing::info!("Database health check passed");

                archytex_db::run_migrations(&pool)
                    .await
                    .expect("Failed to run database migrations");
                tracing::info!("Database migrations applied");

                let store: Arc<dyn DocumentStore> = Arc::new(PgDocumentStore::new(pool.clone()));
                let sessions: Arc<dyn SessionGate> = Arc::new(PgSessionGate::new(pool));
                (store, sessions)
            }
            None => {
                tracing::warn!("DATABASE_URL not set, using in-memory document store");
                let store: Arc<dyn DocumentStore> = Arc::new(MemoryDocumentStore::new());
                let (sessions, _) = memory_sessions(&config).await;
                let sessions: Arc<dyn SessionGate> = sessions;
                (store, sessions)
            }
        };

    // --- Side store and work queue ---
    let (side_store, queue): (Arc<dyn SideStore>, Arc<dyn WorkQueue>) = match &config.redis_url {
        Some(redis_url) => {
            let side_store = RedisSideStore::connect(redis_url, None)
                .await
                .expect("Failed to connect side store to Redis");
            let queue = RedisWorkQueue::connect(redis_url)
                .await
                .expect("Failed to connect work queue to Redis");
            tracing::info!(queue = %config.render_queue, "Redis side store and work queue connected");
            let side_store: Arc<dyn SideStore> = Arc::new(side_store);
            let queue: Arc<dyn WorkQueue> = Arc::new(queue);
            (side_store, queue)
        }
        None => {
            tracing::warn!("REDIS_URL not set, render jobs stay in memory");
            let side_store: Arc<dyn SideStore> = Arc::new(MemorySideStore::new());
            let queue: Arc<dyn WorkQueue> = Arc::new(MemoryWorkQueue::new());
            (side_store, queue)
        }
    };

    // --- App state ---
    let state = AppState::new(config.clone(), store, sessions, side_store, queue);
    let ws_manager = Arc::clone(&state.ws_manager);

    // --- Heartbeat ---
    let background = CancellationToken::new();
    let heartbeat_handle = ws::start_heartbeat(
        Arc::clone(&ws_manager),
        ws::HEARTBEAT_INTERVAL,
        background.clone(),
    );

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    // Open WebSocket sessions hold the drain open; close them once the
    // signal arrives.
    let shutdown_manager = Arc::clone(&ws_manager);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let ws_count = shutdown_manager.connection_count().await;
            tracing::info!(ws_count, "Closing WebSocket connections");
            shutdown_manager.shutdown_all().await;
        })
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    background.cancel();
    let drain = Duration::from_secs(config.shutdown_timeout_secs);
    let _ = tokio::time::timeout(drain, heartbeat_handle).await;
    tracing::info!("Heartbeat task stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
