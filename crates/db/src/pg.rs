//! PostgreSQL-backed [`DocumentStore`] and [`SessionGate`].
//!
//! Mutations fire row triggers that `pg_notify` the owning user's channel
//! (see the migrations). [`PgDocumentStore::watch`] opens a dedicated
//! [`PgListener`] connection on that channel; dropping the returned stream
//! closes the connection. A lost listener connection ends the stream instead
//! of reconnecting, since notifications sent while it was down are gone.

use std::collections::HashMap;

use archytex_core::account::{Asset, AssetKind, UserProfile};
use archytex_core::error::CoreError;
use archytex_core::project::{self, Project, Render, RenderProgress};
use archytex_core::types::{ProjectId, RenderId, UserId};
use archytex_core::updates::{ProjectUpdate, RenderUpdate, Updates};
use async_trait::async_trait;
use futures::StreamExt;
use sqlx::postgres::PgListener;

use crate::repositories::{AssetRepo, ProjectRepo, RenderRepo, SessionRepo, UserRepo};
use crate::store::{Change, ChangeStream, DocumentStore, SessionGate};
use crate::DbPool;

/// Name of the notification channel carrying changes for one user.
pub fn change_channel(user: UserId) -> String {
    format!("user_changes_{}", user.as_uuid().simple())
}

/// Classify a sqlx error at the store boundary.
///
/// Connection-level failures are transient and surface as
/// [`CoreError::DownstreamUnavailable`]; anything else is internal.
pub(crate) fn classify(operation: &str, err: sqlx::Error) -> CoreError {
    match err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => {
            tracing::warn!(operation, error = %err, "Document store unreachable");
            CoreError::DownstreamUnavailable(format!("{operation}: {err}"))
        }
        other => {
            tracing::error!(operation, error = %other, "Document store error");
            CoreError::Internal(format!("{operation}: {other}"))
        }
    }
}

#[derive(Clone)]
pub struct PgDocumentStore {
    pool: DbPool,
}

impl PgDocumentStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn create_project(&self, user: UserId, title: &str) -> Result<Project, CoreError> {
        let id = ProjectId::new();
        let path = project::new_storage_path();
        let row = ProjectRepo::create(&self.pool, user.as_uuid(), id.as_uuid(), title, &path)
            .await
            .map_err(|e| classify("create project", e))?;
        Ok(row.into_project(Vec::new()))
    }

    async fn get_project(&self, user: UserId, project: ProjectId) -> Result<Project, CoreError> {
        let row = ProjectRepo::find_for_user(&self.pool, user.as_uuid(), project.as_uuid())
            .await
            .map_err(|e| classify("get project", e))?
            .ok_or_else(|| CoreError::not_found(ProjectId::ENTITY, project))?;
        let renders = RenderRepo::list_for_project(&self.pool, row.id)
            .await
            .map_err(|e| classify("list renders", e))?
            .into_iter()
            .map(Render::from)
            .collect();
        Ok(row.into_project(renders))
    }

    async fn rename_project(
        &self,
        user: UserId,
        project: ProjectId,
        title: &str,
    ) -> Result<(), CoreError> {
        let renamed = ProjectRepo::rename(&self.pool, user.as_uuid(), project.as_uuid(), title)
            .await
            .map_err(|e| classify("rename project", e))?;
        if renamed {
            Ok(())
        } else {
            Err(CoreError::not_found(ProjectId::ENTITY, project))
        }
    }

    async fn delete_project(&self, user: UserId, project: ProjectId) -> Result<(), CoreError> {
        let deleted = ProjectRepo::delete(&self.pool, user.as_uuid(), project.as_uuid())
            .await
            .map_err(|e| classify("delete project", e))?;
        if deleted {
            Ok(())
        } else {
            Err(CoreError::not_found(ProjectId::ENTITY, project))
        }
    }

    async fn create_render(&self, user: UserId, project: ProjectId) -> Result<Render, CoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| classify("create render", e))?;

        let (title, seq) = ProjectRepo::next_render_seq(&mut tx, user.as_uuid(), project.as_uuid())
            .await
            .map_err(|e| classify("create render", e))?
            .ok_or_else(|| CoreError::not_found(ProjectId::ENTITY, project))?;

        let render = Render::pending(project::render_name(&title, seq));
        RenderRepo::insert(&mut tx, project.as_uuid(), &render)
            .await
            .map_err(|e| classify("create render", e))?;

        tx.commit()
            .await
            .map_err(|e| classify("create render", e))?;
        Ok(render)
    }

    async fn delete_render(
        &self,
        user: UserId,
        project: ProjectId,
        render: RenderId,
    ) -> Result<(), CoreError> {
        let deleted = RenderRepo::delete(
            &self.pool,
            user.as_uuid(),
            project.as_uuid(),
            render.as_uuid(),
        )
        .await
        .map_err(|e| classify("delete render", e))?;
        if deleted {
            Ok(())
        } else {
            Err(CoreError::not_found(RenderId::ENTITY, render))
        }
    }

    async fn update_render(
        &self,
        user: UserId,
        project: ProjectId,
        render: RenderId,
        progress: &RenderProgress,
    ) -> Result<(), CoreError> {
        progress.validate()?;
        let updated = RenderRepo::update_progress(
            &self.pool,
            user.as_uuid(),
            project.as_uuid(),
            render.as_uuid(),
            progress,
        )
        .await
        .map_err(|e| classify("update render", e))?;
        if updated {
            Ok(())
        } else {
            Err(CoreError::not_found(RenderId::ENTITY, render))
        }
    }

    async fn snapshot(&self, user: UserId) -> Result<Updates, CoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| classify("snapshot", e))?;
        // Both reads must see the same committed state.
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(|e| classify("snapshot", e))?;

        let heads = ProjectRepo::list_heads(&mut tx, user.as_uuid())
            .await
            .map_err(|e| classify("snapshot", e))?;
        let rows = RenderRepo::list_for_user(&mut tx, user.as_uuid())
            .await
            .map_err(|e| classify("snapshot", e))?;
        tx.commit().await.map_err(|e| classify("snapshot", e))?;

        let mut renders: HashMap<uuid::Uuid, Vec<RenderUpdate>> = HashMap::new();
        for row in rows {
            renders
                .entry(row.project_id)
                .or_default()
                .push(RenderUpdate::from(row));
        }

        let projects = heads
            .into_iter()
            .map(|head| ProjectUpdate {
                id: ProjectId::from_uuid(head.id),
                title: head.title,
                created: head.created,
                renders: renders.remove(&head.id).unwrap_or_default(),
            })
            .collect();
        Ok(Updates { projects })
    }

    async fn watch(&self, user: UserId) -> Result<ChangeStream, CoreError> {
        let channel = change_channel(user);
        let mut listener = PgListener::connect_with(&self.pool)
            .await
            .map_err(|e| classify("open change feed", e))?;
        listener
            .listen(&channel)
            .await
            .map_err(|e| classify("open change feed", e))?;
        tracing::debug!(user_id = %user, channel = %channel, "Change feed opened");

        let stream = futures::stream::unfold(Some(listener), move |listener| async move {
            let mut listener = listener?;
            match listener.try_recv().await {
                Ok(Some(notification)) => {
                    let change = Change::Mutated(notification.payload().to_string());
                    Some((Ok(change), Some(listener)))
                }
                Ok(None) => {
                    tracing::warn!(user_id = %user, "Change feed connection lost");
                    None
                }
                Err(e) => Some((Err(classify("change feed", e)), None)),
            }
        });
        Ok(stream.boxed())
    }

    async fn user_profile(&self, user: UserId) -> Result<UserProfile, CoreError> {
        UserRepo::find_profile(&self.pool, user.as_uuid())
            .await
            .map_err(|e| classify("user profile", e))?
            .map(UserProfile::from)
            .ok_or_else(|| CoreError::not_found(UserId::ENTITY, user))
    }

    async fn list_assets(&self, kind: AssetKind) -> Result<Vec<Asset>, CoreError> {
        let rows = AssetRepo::list(&self.pool, kind)
            .await
            .map_err(|e| classify("list assets", e))?;
        Ok(rows.into_iter().map(Asset::from).collect())
    }

    async fn health_check(&self) -> Result<(), CoreError> {
        crate::health_check(&self.pool)
            .await
            .map_err(|e| classify("health check", e))
    }
}

/// Session-table backed [`SessionGate`]: the bearer credential is the
/// session id.
#[derive(Clone)]
pub struct PgSessionGate {
    pool: DbPool,
}

impl PgSessionGate {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionGate for PgSessionGate {
    async fn resolve(&self, credential: &str) -> Result<UserId, CoreError> {
        if credential.is_empty() {
            return Err(CoreError::Unauthorized("Missing session token".into()));
        }
        SessionRepo::find_user(&self.pool, credential)
            .await
            .map_err(|e| classify("resolve session", e))?
            .map(UserId::from_uuid)
            .ok_or_else(|| CoreError::Unauthorized("Invalid or expired token".into()))
    }
}
