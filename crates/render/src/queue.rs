//! Work queue carrying job references to the render worker.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

use archytex_core::error::CoreError;
use archytex_core::types::{ProjectId, RenderId, UserId};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use tokio::sync::RwLock;

use crate::redis_error;

/// Queue the render worker consumes from.
pub const DEFAULT_QUEUE: &str = "archyrt:dispatch";

/// Identifies one render job: `"{render}#{user}#{project}"` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobReference {
    pub render: RenderId,
    pub user: UserId,
    pub project: ProjectId,
}

impl JobReference {
    pub fn encode(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for JobReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}#{}#{}",
            self.render.as_uuid().simple(),
            self.user.as_uuid().simple(),
            self.project.as_uuid().simple()
        )
    }
}

impl FromStr for JobReference {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('#');
        let (Some(render), Some(user), Some(project), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(CoreError::Validation(format!(
                "Malformed job reference: {s:?}"
            )));
        };
        Ok(Self {
            render: render.parse()?,
            user: user.parse()?,
            project: project.parse()?,
        })
    }
}

#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Hand `payload` to the consumers of `queue`.
    async fn publish(&self, queue: &str, payload: &[u8]) -> Result<(), CoreError>;

    async fn health_check(&self) -> Result<(), CoreError>;
}

/// Work queue backed by a Redis list: producers `RPUSH`, the worker pops
/// from the other end.
#[derive(Clone)]
pub struct RedisWorkQueue {
    conn: MultiplexedConnection,
}

impl RedisWorkQueue {
    pub async fn connect(redis_url: &str) -> Result<Self, CoreError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| CoreError::Internal(format!("Invalid Redis URL: {e}")))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| redis_error("connect work queue", e))?;
        Ok(Self::new(conn))
    }

    pub fn new(conn: MultiplexedConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl WorkQueue for RedisWorkQueue {
    async fn publish(&self, queue: &str, payload: &[u8]) -> Result<(), CoreError> {
        let mut conn = self.conn.clone();
        let depth: i64 = redis::cmd("RPUSH")
            .arg(queue)
            .arg(payload)
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_error("work queue RPUSH", e))?;
        tracing::debug!(queue, depth, "Job published");
        Ok(())
    }

    async fn health_check(&self) -> Result<(), CoreError> {
        let mut conn = self.conn.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map(|_| ())
            .map_err(|e| redis_error("work queue PING", e))
    }
}

/// In-memory work queue recording every publication.
#[derive(Default)]
pub struct MemoryWorkQueue {
    published: RwLock<Vec<(String, Vec<u8>)>>,
    unavailable: AtomicBool,
}

impl MemoryWorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Everything published so far, as `(queue, payload)` pairs.
    pub async fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.published.read().await.clone()
    }

    /// Job references published to `queue`, in order.
    pub async fn jobs(&self, queue: &str) -> Vec<JobReference> {
        self.published
            .read()
            .await
            .iter()
            .filter(|(q, _)| q == queue)
            .filter_map(|(_, payload)| std::str::from_utf8(payload).ok()?.parse().ok())
            .collect()
    }

    fn check_available(&self, operation: &str) -> Result<(), CoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(CoreError::DownstreamUnavailable(format!(
                "{operation}: work queue offline"
            )))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl WorkQueue for MemoryWorkQueue {
    async fn publish(&self, queue: &str, payload: &[u8]) -> Result<(), CoreError> {
        self.check_available("publish job")?;
        self.published
            .write()
            .await
            .push((queue.to_string(), payload.to_vec()));
        Ok(())
    }

    async fn health_check(&self) -> Result<(), CoreError> {
        self.check_available("work queue health")
    }
}
