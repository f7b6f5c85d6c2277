//! In-process [`DocumentStore`] and [`SessionGate`] implementations.
//!
//! Used by unit and integration tests across the workspace, and by the API
//! binary when no `DATABASE_URL` is configured. Each user gets a
//! `broadcast` channel that carries one [`Change`] per committed mutation;
//! a watcher that falls behind sees [`Change::Lagged`] instead of growing
//! the buffer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use archytex_core::account::{Asset, AssetKind, UserProfile};
use archytex_core::error::CoreError;
use archytex_core::project::{self, Project, Render, RenderProgress};
use archytex_core::types::{ProjectId, RenderId, UserId};
use archytex_core::updates::Updates;
use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::{broadcast, RwLock};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;

use crate::store::{Change, ChangeStream, DocumentStore, SessionGate};

/// Default per-user change buffer.
const DEFAULT_FEED_CAPACITY: usize = 64;

struct UserDocument {
    projects: Vec<Project>,
    render_seq: HashMap<ProjectId, i64>,
    feed: broadcast::Sender<Change>,
}

impl UserDocument {
    fn new(capacity: usize) -> Self {
        let (feed, _) = broadcast::channel(capacity);
        Self {
            projects: Vec::new(),
            render_seq: HashMap::new(),
            feed,
        }
    }

    fn project_mut(&mut self, id: ProjectId) -> Result<&mut Project, CoreError> {
        self.projects
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| CoreError::not_found(ProjectId::ENTITY, id))
    }

    fn notify(&self, operation: &str) {
        // No receivers just means nobody is watching.
        let _ = self.feed.send(Change::Mutated(operation.to_string()));
    }
}

/// In-memory document store keyed by user.
pub struct MemoryDocumentStore {
    users: RwLock<HashMap<UserId, UserDocument>>,
    profiles: RwLock<HashMap<UserId, UserProfile>>,
    assets: RwLock<Vec<(AssetKind, Asset)>>,
    feed_capacity: usize,
    available: AtomicBool,
    fail_render_deletes: AtomicBool,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::with_feed_capacity(DEFAULT_FEED_CAPACITY)
    }

    /// Create a store whose per-user change buffer holds `capacity` entries.
    pub fn with_feed_capacity(capacity: usize) -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            profiles: RwLock::new(HashMap::new()),
            assets: RwLock::new(Vec::new()),
            feed_capacity: capacity.max(1),
            available: AtomicBool::new(true),
            fail_render_deletes: AtomicBool::new(false),
        }
    }

    /// Simulate the store going down (`false`) or coming back (`true`).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Make `delete_render` fail with `DownstreamUnavailable`.
    pub fn set_fail_render_deletes(&self, fail: bool) {
        self.fail_render_deletes.store(fail, Ordering::SeqCst);
    }

    /// Create or replace the account record of `user`.
    pub async fn insert_user(&self, user: UserId, profile: UserProfile) {
        self.profiles.write().await.insert(user, profile);
    }

    /// Add an entry to the asset catalog.
    pub async fn insert_asset(&self, kind: AssetKind, asset: Asset) {
        self.assets.write().await.push((kind, asset));
    }

    /// Number of open change-feed subscriptions for `user`.
    pub async fn active_watchers(&self, user: UserId) -> usize {
        self.users
            .read()
            .await
            .get(&user)
            .map_or(0, |doc| doc.feed.receiver_count())
    }

    /// End every open change feed for `user`, as if the upstream died.
    pub async fn close_feed(&self, user: UserId) {
        let mut users = self.users.write().await;
        if let Some(doc) = users.get_mut(&user) {
            // Dropping the old sender ends all existing streams.
            let (feed, _) = broadcast::channel(self.feed_capacity);
            doc.feed = feed;
        }
    }

    fn check_available(&self, operation: &str) -> Result<(), CoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(CoreError::DownstreamUnavailable(format!(
                "{operation}: document store offline"
            )))
        }
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn create_project(&self, user: UserId, title: &str) -> Result<Project, CoreError> {
        self.check_available("create project")?;
        let mut users = self.users.write().await;
        let doc = users
            .entry(user)
            .or_insert_with(|| UserDocument::new(self.feed_capacity));
        let project = Project::new(title);
        doc.projects.push(project.clone());
        doc.notify("INSERT");
        Ok(project)
    }

    async fn get_project(&self, user: UserId, project: ProjectId) -> Result<Project, CoreError> {
        self.check_available("get project")?;
        self.users
            .read()
            .await
            .get(&user)
            .and_then(|doc| doc.projects.iter().find(|p| p.id == project))
            .cloned()
            .ok_or_else(|| CoreError::not_found(ProjectId::ENTITY, project))
    }

    async fn rename_project(
        &self,
        user: UserId,
        project: ProjectId,
        title: &str,
    ) -> Result<(), CoreError> {
        self.check_available("rename project")?;
        let mut users = self.users.write().await;
        let doc = users
            .get_mut(&user)
            .ok_or_else(|| CoreError::not_found(ProjectId::ENTITY, project))?;
        doc.project_mut(project)?.title = title.to_string();
        doc.notify("UPDATE");
        Ok(())
    }

    async fn delete_project(&self, user: UserId, project: ProjectId) -> Result<(), CoreError> {
        self.check_available("delete project")?;
        let mut users = self.users.write().await;
        let doc = users
            .get_mut(&user)
            .ok_or_else(|| CoreError::not_found(ProjectId::ENTITY, project))?;
        let before = doc.projects.len();
        doc.projects.retain(|p| p.id != project);
        if doc.projects.len() == before {
            return Err(CoreError::not_found(ProjectId::ENTITY, project));
        }
        doc.render_seq.remove(&project);
        doc.notify("DELETE");
        Ok(())
    }

    async fn create_render(&self, user: UserId, project: ProjectId) -> Result<Render, CoreError> {
        self.check_available("create render")?;
        let mut users = self.users.write().await;
        let doc = users
            .get_mut(&user)
            .ok_or_else(|| CoreError::not_found(ProjectId::ENTITY, project))?;
        let title = doc.project_mut(project)?.title.clone();

        let seq = doc.render_seq.entry(project).or_insert(0);
        *seq += 1;
        let render = Render::pending(project::render_name(&title, *seq));

        doc.project_mut(project)?.renders.push(render.clone());
        doc.notify("INSERT");
        Ok(render)
    }

    async fn delete_render(
        &self,
        user: UserId,
        project: ProjectId,
        render: RenderId,
    ) -> Result<(), CoreError> {
        self.check_available("delete render")?;
        if self.fail_render_deletes.load(Ordering::SeqCst) {
            return Err(CoreError::DownstreamUnavailable(
                "delete render: document store offline".into(),
            ));
        }
        let mut users = self.users.write().await;
        let doc = users
            .get_mut(&user)
            .ok_or_else(|| CoreError::not_found(ProjectId::ENTITY, project))?;
        let target = doc.project_mut(project)?;
        let before = target.renders.len();
        target.renders.retain(|r| r.id != render);
        if target.renders.len() == before {
            return Err(CoreError::not_found(RenderId::ENTITY, render));
        }
        doc.notify("DELETE");
        Ok(())
    }

    async fn update_render(
        &self,
        user: UserId,
        project: ProjectId,
        render: RenderId,
        progress: &RenderProgress,
    ) -> Result<(), CoreError> {
        self.check_available("update render")?;
        progress.validate()?;
        let mut users = self.users.write().await;
        let doc = users
            .get_mut(&user)
            .ok_or_else(|| CoreError::not_found(ProjectId::ENTITY, project))?;
        let target = doc
            .project_mut(project)?
            .renders
            .iter_mut()
            .find(|r| r.id == render)
            .ok_or_else(|| CoreError::not_found(RenderId::ENTITY, render))?;
        progress.apply(target);
        doc.notify("UPDATE");
        Ok(())
    }

    async fn snapshot(&self, user: UserId) -> Result<Updates, CoreError> {
        self.check_available("snapshot")?;
        Ok(self
            .users
            .read()
            .await
            .get(&user)
            .map(|doc| Updates::from_projects(&doc.projects))
            .unwrap_or_default())
    }

    async fn watch(&self, user: UserId) -> Result<ChangeStream, CoreError> {
        self.check_available("open change feed")?;
        let mut users = self.users.write().await;
        let receiver = users
            .entry(user)
            .or_insert_with(|| UserDocument::new(self.feed_capacity))
            .feed
            .subscribe();

        let stream = BroadcastStream::new(receiver).map(|item| match item {
            Ok(change) => Ok(change),
            Err(BroadcastStreamRecvError::Lagged(n)) => Ok(Change::Lagged(n)),
        });
        Ok(stream.boxed())
    }

    async fn user_profile(&self, user: UserId) -> Result<UserProfile, CoreError> {
        self.check_available("user profile")?;
        self.profiles
            .read()
            .await
            .get(&user)
            .cloned()
            .ok_or_else(|| CoreError::not_found(UserId::ENTITY, user))
    }

    async fn list_assets(&self, kind: AssetKind) -> Result<Vec<Asset>, CoreError> {
        self.check_available("list assets")?;
        let mut assets: Vec<Asset> = self
            .assets
            .read()
            .await
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, asset)| asset.clone())
            .collect();
        assets.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(assets)
    }

    async fn health_check(&self) -> Result<(), CoreError> {
        self.check_available("health check")
    }
}

/// In-memory token → user table.
#[derive(Default)]
pub struct MemorySessionGate {
    sessions: RwLock<HashMap<String, UserId>>,
}

impl MemorySessionGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, token: impl Into<String>, user: UserId) {
        self.sessions.write().await.insert(token.into(), user);
    }

    pub async fn revoke(&self, token: &str) {
        self.sessions.write().await.remove(token);
    }
}

#[async_trait]
impl SessionGate for MemorySessionGate {
    async fn resolve(&self, credential: &str) -> Result<UserId, CoreError> {
        self.sessions
            .read()
            .await
            .get(credential)
            .copied()
            .ok_or_else(|| CoreError::Unauthorized("Invalid or expired token".into()))
    }
}
