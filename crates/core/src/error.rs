use crate::types::RenderId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// A store or queue timed out or could not be reached. Callers may retry.
    #[error("Downstream unavailable: {0}")]
    DownstreamUnavailable(String),

    /// The render record was written but staging or publishing its job
    /// failed and the record could not be removed again.
    #[error("Render {render_id} was recorded but its job was not handed off: {reason}")]
    DispatchIncomplete { render_id: RenderId, reason: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Whether the caller may reasonably retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::DownstreamUnavailable(_))
    }
}
