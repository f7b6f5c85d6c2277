use std::time::Duration;

use archytex_events::FeedConfig;
use archytex_render::{DispatchConfig, DEFAULT_QUEUE};

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Graceful shutdown timeout in seconds (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Deadline for each document-store, side-store and queue call (default: `5`).
    pub store_timeout_secs: u64,
    /// Snapshots buffered per live subscription (default: `16`).
    pub subscriber_capacity: usize,
    /// Queue render jobs are published to (default: `archyrt:dispatch`).
    pub render_queue: String,
    /// PostgreSQL URL. Without it the server runs on in-memory stores.
    pub database_url: Option<String>,
    /// Redis URL for the side store and work queue. Without it both are
    /// in-memory.
    pub redis_url: Option<String>,
    /// Session token accepted for one generated user when running on the
    /// in-memory session gate. Ignored with `DATABASE_URL`.
    pub dev_session_token: Option<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                    |
    /// |-------------------------|----------------------------|
    /// | `HOST`                  | `0.0.0.0`                  |
    /// | `PORT`                  | `3000`                     |
    /// | `CORS_ORIGINS`          | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `30`                       |
    /// | `STORE_TIMEOUT_SECS`    | `5`                        |
    /// | `SUBSCRIBER_CAPACITY`   | `16`                       |
    /// | `RENDER_QUEUE`          | `archyrt:dispatch`         |
    /// | `DATABASE_URL`          | unset (in-memory)          |
    /// | `REDIS_URL`             | unset (in-memory)          |
    /// | `DEV_SESSION_TOKEN`     | unset                      |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let store_timeout_secs: u64 = std::env::var("STORE_TIMEOUT_SECS")
            .unwrap_or_else(|_| "5".into())
            .parse()
            .expect("STORE_TIMEOUT_SECS must be a valid u64");

        let subscriber_capacity: usize = std::env::var("SUBSCRIBER_CAPACITY")
            .unwrap_or_else(|_| "16".into())
            .parse()
            .expect("SUBSCRIBER_CAPACITY must be a valid usize");

        let render_queue = std::env::var("RENDER_QUEUE").unwrap_or_else(|_| DEFAULT_QUEUE.into());

        let database_url = std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty());
        let redis_url = std::env::var("REDIS_URL").ok().filter(|s| !s.is_empty());
        let dev_session_token = std::env::var("DEV_SESSION_TOKEN")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            store_timeout_secs,
            subscriber_capacity,
            render_queue,
            database_url,
            redis_url,
            dev_session_token,
        }
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }

    pub fn feed_config(&self) -> FeedConfig {
        FeedConfig {
            channel_capacity: self.subscriber_capacity.max(1),
            store_timeout: self.store_timeout(),
        }
    }

    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            store_timeout: self.store_timeout(),
            queue: self.render_queue.clone(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3000,
            cors_origins: vec!["http://localhost:5173".into()],
            request_timeout_secs: 30,
            shutdown_timeout_secs: 30,
            store_timeout_secs: 5,
            subscriber_capacity: 16,
            render_queue: DEFAULT_QUEUE.into(),
            database_url: None,
            redis_url: None,
            dev_session_token: None,
        }
    }
}
