//! Storage seams consumed by the feed adapter, the dispatcher and the API.

use archytex_core::account::{Asset, AssetKind, UserProfile};
use archytex_core::error::CoreError;
use archytex_core::project::{Project, Render, RenderProgress};
use archytex_core::types::{ProjectId, RenderId, UserId};
use archytex_core::updates::Updates;
use async_trait::async_trait;
use futures::stream::BoxStream;

/// A notification that a watched user's document changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// One committed mutation, tagged with the operation that caused it.
    Mutated(String),
    /// The feed skipped `n` notifications; state changed at least once.
    Lagged(u64),
}

/// Live change notifications for a single user.
///
/// The stream owns the underlying subscription resource; dropping it
/// releases the subscription. End-of-stream means the upstream feed ended.
pub type ChangeStream = BoxStream<'static, Result<Change, CoreError>>;

/// CRUD and change-feed primitives over users' projects and renders.
///
/// Every operation is scoped to the owning user: a project or render that
/// exists but belongs to someone else is reported as
/// [`CoreError::NotFound`], never as a distinct error.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn create_project(&self, user: UserId, title: &str) -> Result<Project, CoreError>;

    async fn get_project(&self, user: UserId, project: ProjectId) -> Result<Project, CoreError>;

    async fn rename_project(
        &self,
        user: UserId,
        project: ProjectId,
        title: &str,
    ) -> Result<(), CoreError>;

    async fn delete_project(&self, user: UserId, project: ProjectId) -> Result<(), CoreError>;

    /// Append a pending render named `"{title}-{n}"`, where `n` is the
    /// project's next render sequence number.
    async fn create_render(&self, user: UserId, project: ProjectId) -> Result<Render, CoreError>;

    /// Remove a render from the project's list. A render id that is not in
    /// that project yields `NotFound` and changes nothing.
    async fn delete_render(
        &self,
        user: UserId,
        project: ProjectId,
        render: RenderId,
    ) -> Result<(), CoreError>;

    /// Record worker-side progress for a render.
    async fn update_render(
        &self,
        user: UserId,
        project: ProjectId,
        render: RenderId,
        progress: &RenderProgress,
    ) -> Result<(), CoreError>;

    /// Read the user's current state, projected to client fields.
    async fn snapshot(&self, user: UserId) -> Result<Updates, CoreError>;

    /// Open a change-notification subscription for the user's document.
    async fn watch(&self, user: UserId) -> Result<ChangeStream, CoreError>;

    /// Profile of the user account. A user without an account record is
    /// `NotFound`.
    async fn user_profile(&self, user: UserId) -> Result<UserProfile, CoreError>;

    /// Catalog entries of one kind, ordered by name.
    async fn list_assets(&self, kind: AssetKind) -> Result<Vec<Asset>, CoreError>;

    async fn health_check(&self) -> Result<(), CoreError>;
}

/// Resolves a bearer credential to the user it was issued to.
///
/// Fails closed: unknown, expired or malformed credentials yield
/// [`CoreError::Unauthorized`].
#[async_trait]
pub trait SessionGate: Send + Sync {
    async fn resolve(&self, credential: &str) -> Result<UserId, CoreError>;
}
