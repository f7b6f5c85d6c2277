//! Render Dispatcher: turns a render request into a pending render record
//! plus a queued job for the external worker.
//!
//! Order of effects:
//!
//! 1. validate the parameters (nothing is written on rejection),
//! 2. append a pending render to the project,
//! 3. stage width, height, samples and scene in the side store,
//! 4. publish the job reference.
//!
//! The render record always exists before its job reference can be seen by
//! the worker. If staging fails nothing has been published yet, so the record
//! is removed again; only when that removal fails too does the caller get
//! [`CoreError::DispatchIncomplete`]. A failed or timed-out publish leaves
//! the hand-off state unknown (the job may already be queued), so the record
//! is kept and the caller gets [`CoreError::DispatchIncomplete`].

use std::sync::Arc;
use std::time::Duration;

use archytex_core::error::CoreError;
use archytex_core::render_params::RenderParams;
use archytex_core::timeout::{with_timeout, DEFAULT_STORE_TIMEOUT};
use archytex_core::types::{ProjectId, RenderId, UserId};
use archytex_db::DocumentStore;

use crate::queue::{JobReference, WorkQueue, DEFAULT_QUEUE};
use crate::side_store::{param_key, SideStore};

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Deadline applied to every store, side-store and queue call.
    pub store_timeout: Duration,
    /// Queue job references are published to.
    pub queue: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            store_timeout: DEFAULT_STORE_TIMEOUT,
            queue: DEFAULT_QUEUE.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct RenderDispatcher {
    store: Arc<dyn DocumentStore>,
    side_store: Arc<dyn SideStore>,
    queue: Arc<dyn WorkQueue>,
    config: DispatchConfig,
}

impl RenderDispatcher {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        side_store: Arc<dyn SideStore>,
        queue: Arc<dyn WorkQueue>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            store,
            side_store,
            queue,
            config,
        }
    }

    /// Queue a render of `project` for `user` and return the new render id.
    pub async fn dispatch(
        &self,
        user: UserId,
        project: ProjectId,
        params: &RenderParams,
    ) -> Result<RenderId, CoreError> {
        params.validate()?;

        let render = with_timeout(
            self.config.store_timeout,
            "create render",
            self.store.create_render(user, project),
        )
        .await?;

        let job = JobReference {
            render: render.id,
            user,
            project,
        };
        if let Err(cause) = self.stage(&job, params).await {
            return Err(self.roll_back(&job, cause).await);
        }
        if let Err(cause) = self.publish(&job).await {
            tracing::error!(
                user_id = %user,
                render_id = %job.render,
                error = %cause,
                "Render job publish failed, keeping render record",
            );
            return Err(CoreError::DispatchIncomplete {
                render_id: job.render,
                reason: cause.to_string(),
            });
        }

        tracing::info!(
            user_id = %user,
            project_id = %project,
            render_id = %render.id,
            name = %render.name,
            width = params.width,
            height = params.height,
            samples = params.samples,
            "Render dispatched",
        );
        Ok(render.id)
    }

    /// Remove a render from `user`'s `project`.
    ///
    /// Staged parameters and an already queued job are left alone; the
    /// worker finds no record and drops the job.
    pub async fn delete_render(
        &self,
        user: UserId,
        project: ProjectId,
        render: RenderId,
    ) -> Result<(), CoreError> {
        with_timeout(
            self.config.store_timeout,
            "delete render",
            self.store.delete_render(user, project, render),
        )
        .await?;
        tracing::info!(user_id = %user, project_id = %project, render_id = %render, "Render deleted");
        Ok(())
    }

    async fn stage(&self, job: &JobReference, params: &RenderParams) -> Result<(), CoreError> {
        let width = params.width.to_string();
        let height = params.height.to_string();
        let samples = params.samples.to_string();
        let entries: [(&str, &[u8]); 4] = [
            ("width", width.as_bytes()),
            ("height", height.as_bytes()),
            ("samples", samples.as_bytes()),
            ("scene", &params.scene),
        ];
        for (field, value) in entries {
            let key = param_key(job.render, field);
            with_timeout(
                self.config.store_timeout,
                "stage render parameter",
                self.side_store.set(&key, value),
            )
            .await?;
        }
        Ok(())
    }

    async fn publish(&self, job: &JobReference) -> Result<(), CoreError> {
        with_timeout(
            self.config.store_timeout,
            "publish render job",
            self.queue.publish(&self.config.queue, job.encode().as_bytes()),
        )
        .await
    }

    /// Undo the render record after staging failed and pick the error the
    /// caller sees.
    async fn roll_back(&self, job: &JobReference, cause: CoreError) -> CoreError {
        tracing::warn!(
            user_id = %job.user,
            render_id = %job.render,
            error = %cause,
            "Staging render parameters failed, removing render record",
        );
        let removed = with_timeout(
            self.config.store_timeout,
            "remove undispatched render",
            self.store.delete_render(job.user, job.project, job.render),
        )
        .await;

        match removed {
            Ok(()) => match cause {
                CoreError::DownstreamUnavailable(_) => cause,
                other => CoreError::DownstreamUnavailable(format!("staging render parameters failed: {other}")),
            },
            Err(e) => {
                tracing::error!(
                    user_id = %job.user,
                    render_id = %job.render,
                    error = %e,
                    "Render record left without a queued job",
                );
                CoreError::DispatchIncomplete {
                    render_id: job.render,
                    reason: cause.to_string(),
                }
            }
        }
    }
}
