//! Render job dispatch.
//!
//! A render request becomes a pending render record in the document store,
//! four parameter entries in the [`SideStore`] and one [`JobReference`] on
//! the [`WorkQueue`], where the external render worker picks it up.

pub mod dispatcher;
pub mod queue;
pub mod side_store;

pub use dispatcher::{DispatchConfig, RenderDispatcher};
pub use queue::{JobReference, MemoryWorkQueue, RedisWorkQueue, WorkQueue, DEFAULT_QUEUE};
pub use side_store::{param_key, MemorySideStore, RedisSideStore, SideStore};

/// Map a Redis failure onto the shared error type. Every Redis failure is
/// an unreachable or misbehaving dependency from the caller's point of view.
pub(crate) fn redis_error(operation: &str, err: redis::RedisError) -> archytex_core::error::CoreError {
    tracing::warn!(operation, error = %err, "Redis request failed");
    archytex_core::error::CoreError::DownstreamUnavailable(format!("{operation}: {err}"))
}
