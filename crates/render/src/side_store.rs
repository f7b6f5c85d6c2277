//! Key/value side store holding render job parameters.
//!
//! The worker reads `archyrt:{render}:width`, `:height`, `:samples` and
//! `:scene` after taking a job off the queue.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use archytex_core::error::CoreError;
use archytex_core::types::RenderId;
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use tokio::sync::RwLock;

use crate::redis_error;

/// Side-store key of one job parameter.
pub fn param_key(render: RenderId, field: &str) -> String {
    format!("archyrt:{}:{field}", render.as_uuid().simple())
}

#[async_trait]
pub trait SideStore: Send + Sync {
    async fn set(&self, key: &str, value: &[u8]) -> Result<(), CoreError>;

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CoreError>;

    async fn health_check(&self) -> Result<(), CoreError>;
}

/// Redis-backed side store sharing one multiplexed connection.
#[derive(Clone)]
pub struct RedisSideStore {
    conn: MultiplexedConnection,
    /// Expiry applied to every key; `None` keeps keys until the worker
    /// removes them.
    ttl: Option<Duration>,
}

impl RedisSideStore {
    pub async fn connect(redis_url: &str, ttl: Option<Duration>) -> Result<Self, CoreError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| CoreError::Internal(format!("Invalid Redis URL: {e}")))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| redis_error("connect side store", e))?;
        Ok(Self::new(conn, ttl))
    }

    pub fn new(conn: MultiplexedConnection, ttl: Option<Duration>) -> Self {
        Self { conn, ttl }
    }
}

#[async_trait]
impl SideStore for RedisSideStore {
    async fn set(&self, key: &str, value: &[u8]) -> Result<(), CoreError> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = self.ttl {
            cmd.arg("EX").arg(ttl.as_secs().max(1));
        }
        cmd.query_async::<()>(&mut conn)
            .await
            .map_err(|e| redis_error("side store SET", e))?;
        tracing::trace!(key, bytes = value.len(), "Side store entry written");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CoreError> {
        let mut conn = self.conn.clone();
        redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_error("side store GET", e))
    }

    async fn health_check(&self) -> Result<(), CoreError> {
        let mut conn = self.conn.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map(|_| ())
            .map_err(|e| redis_error("side store PING", e))
    }
}

/// In-memory side store with failure injection.
#[derive(Default)]
pub struct MemorySideStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
    unavailable: AtomicBool,
    stalled: AtomicBool,
}

impl MemorySideStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with `DownstreamUnavailable` (`false`) or
    /// succeed again (`true`).
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Make every call hang until the caller's deadline passes.
    pub fn set_stalled(&self, stalled: bool) {
        self.stalled.store(stalled, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    async fn gate(&self, operation: &str) -> Result<(), CoreError> {
        if self.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CoreError::DownstreamUnavailable(format!(
                "{operation}: side store offline"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl SideStore for MemorySideStore {
    async fn set(&self, key: &str, value: &[u8]) -> Result<(), CoreError> {
        self.gate("side store SET").await?;
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CoreError> {
        self.gate("side store GET").await?;
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn health_check(&self) -> Result<(), CoreError> {
        self.gate("side store PING").await
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn param_keys_follow_worker_layout() {
        let render = RenderId::new();
        let key = param_key(render, "width");
        assert!(key.starts_with("archyrt:"));
        assert!(key.ends_with(":width"));
        assert_eq!(key.split(':').count(), 3);
    }

    #[tokio::test]
    async fn memory_store_round_trips_bytes() {
        let store = MemorySideStore::new();
        store.set("k", b"\x00scene").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some(&b"\x00scene"[..]));
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn offline_memory_store_is_unavailable() {
        let store = MemorySideStore::new();
        store.set_available(false);
        assert_matches!(
            store.set("k", b"v").await,
            Err(CoreError::DownstreamUnavailable(_))
        );
        assert!(store.is_empty().await);
    }
}
