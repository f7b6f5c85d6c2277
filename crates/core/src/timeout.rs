//! Deadlines for calls into external stores.

use std::future::Future;
use std::time::Duration;

use crate::error::CoreError;

/// Default deadline for a single document-store, side-store or queue call.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Await `fut`, failing with [`CoreError::DownstreamUnavailable`] once
/// `limit` elapses. `operation` names the call in the error message.
pub async fn with_timeout<T, F>(limit: Duration, operation: &str, fut: F) -> Result<T, CoreError>
where
    F: Future<Output = Result<T, CoreError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(CoreError::DownstreamUnavailable(format!(
            "{operation} timed out after {}ms",
            limit.as_millis()
        ))),
    }
}
