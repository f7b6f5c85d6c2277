//! Render dispatch against in-memory stores.

use std::sync::Arc;
use std::time::Duration;

use archytex_core::error::CoreError;
use archytex_core::render_params::RenderParams;
use archytex_core::types::{ProjectId, RenderId, UserId};
use archytex_db::{DocumentStore, MemoryDocumentStore};
use archytex_render::{
    param_key, DispatchConfig, MemorySideStore, MemoryWorkQueue, RenderDispatcher, SideStore,
    WorkQueue, DEFAULT_QUEUE,
};
use assert_matches::assert_matches;
use async_trait::async_trait;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Harness {
    store: Arc<MemoryDocumentStore>,
    side_store: Arc<MemorySideStore>,
    queue: Arc<MemoryWorkQueue>,
    dispatcher: RenderDispatcher,
    user: UserId,
    project: ProjectId,
}

/// Enqueues the job, then never acknowledges it.
struct UnacknowledgedQueue(Arc<MemoryWorkQueue>);

#[async_trait]
impl WorkQueue for UnacknowledgedQueue {
    async fn publish(&self, queue: &str, payload: &[u8]) -> Result<(), CoreError> {
        self.0.publish(queue, payload).await?;
        std::future::pending().await
    }

    async fn health_check(&self) -> Result<(), CoreError> {
        self.0.health_check().await
    }
}

async fn harness() -> Harness {
    let queue = Arc::new(MemoryWorkQueue::new());
    harness_with_queue(queue.clone(), queue).await
}

async fn harness_with_queue(
    queue: Arc<MemoryWorkQueue>,
    publisher: Arc<dyn WorkQueue>,
) -> Harness {
    let store = Arc::new(MemoryDocumentStore::new());
    let side_store = Arc::new(MemorySideStore::new());
    let dispatcher = RenderDispatcher::new(
        store.clone(),
        side_store.clone(),
        publisher,
        DispatchConfig {
            store_timeout: Duration::from_secs(1),
            ..DispatchConfig::default()
        },
    );
    let user = UserId::new();
    let project = store.create_project(user, "Cabin").await.unwrap().id;
    Harness {
        store,
        side_store,
        queue,
        dispatcher,
        user,
        project,
    }
}

fn params(width: u32, height: u32, samples: u32) -> RenderParams {
    RenderParams {
        width,
        height,
        samples,
        scene: b"scene-bytes".to_vec(),
    }
}

async fn render_count(h: &Harness) -> usize {
    h.store
        .get_project(h.user, h.project)
        .await
        .unwrap()
        .renders
        .len()
}

// ---------------------------------------------------------------------------
// Successful dispatch
// ---------------------------------------------------------------------------

#[tokio::test]
async fn dispatch_records_stages_and_publishes() {
    let h = harness().await;

    let render = h
        .dispatcher
        .dispatch(h.user, h.project, &params(512, 512, 16))
        .await
        .unwrap();

    let project = h.store.get_project(h.user, h.project).await.unwrap();
    assert_eq!(project.renders.len(), 1);
    let record = project.render(render).unwrap();
    assert_eq!(record.name, "Cabin-1");
    assert_eq!(record.status, 0.0);
    assert!(record.finished.is_none());

    let get = |field: &'static str| {
        let side_store = h.side_store.clone();
        async move { side_store.get(&param_key(render, field)).await.unwrap() }
    };
    assert_eq!(get("width").await.as_deref(), Some(&b"512"[..]));
    assert_eq!(get("height").await.as_deref(), Some(&b"512"[..]));
    assert_eq!(get("samples").await.as_deref(), Some(&b"16"[..]));
    assert_eq!(get("scene").await.as_deref(), Some(&b"scene-bytes"[..]));

    let jobs = h.queue.jobs(DEFAULT_QUEUE).await;
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].render, render);
    assert_eq!(jobs[0].user, h.user);
    assert_eq!(jobs[0].project, h.project);
}

#[tokio::test]
async fn render_names_keep_counting_after_deletes() {
    let h = harness().await;
    let first = h
        .dispatcher
        .dispatch(h.user, h.project, &params(8, 8, 1))
        .await
        .unwrap();
    h.dispatcher
        .delete_render(h.user, h.project, first)
        .await
        .unwrap();
    let second = h
        .dispatcher
        .dispatch(h.user, h.project, &params(8, 8, 1))
        .await
        .unwrap();

    let project = h.store.get_project(h.user, h.project).await.unwrap();
    assert_eq!(project.render(second).unwrap().name, "Cabin-2");
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn dimensions_not_divisible_by_four_create_nothing() {
    let h = harness().await;

    let err = h
        .dispatcher
        .dispatch(h.user, h.project, &params(501, 502, 16))
        .await
        .unwrap_err();

    assert_matches!(err, CoreError::Validation(_));
    assert_eq!(render_count(&h).await, 0);
    assert!(h.side_store.is_empty().await);
    assert!(h.queue.published().await.is_empty());
}

#[tokio::test]
async fn foreign_project_is_not_found() {
    let h = harness().await;
    let stranger = UserId::new();

    let err = h
        .dispatcher
        .dispatch(stranger, h.project, &params(8, 8, 1))
        .await
        .unwrap_err();

    assert_matches!(err, CoreError::NotFound { .. });
    assert!(h.queue.published().await.is_empty());
}

// ---------------------------------------------------------------------------
// Downstream failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn side_store_failure_rolls_back_the_render() {
    let h = harness().await;
    h.side_store.set_available(false);

    let err = h
        .dispatcher
        .dispatch(h.user, h.project, &params(8, 8, 1))
        .await
        .unwrap_err();

    assert_matches!(err, CoreError::DownstreamUnavailable(_));
    assert_eq!(render_count(&h).await, 0);
    assert!(h.queue.published().await.is_empty());
}

#[tokio::test]
async fn queue_failure_keeps_the_render_and_reports_incomplete_dispatch() {
    let h = harness().await;
    h.queue.set_available(false);

    let err = h
        .dispatcher
        .dispatch(h.user, h.project, &params(8, 8, 1))
        .await
        .unwrap_err();

    let project = h.store.get_project(h.user, h.project).await.unwrap();
    assert_eq!(project.renders.len(), 1);
    assert_matches!(err, CoreError::DispatchIncomplete { render_id, .. } if render_id == project.renders[0].id);
}

#[tokio::test(start_paused = true)]
async fn unacknowledged_publish_keeps_the_render_its_job_points_at() {
    let queue = Arc::new(MemoryWorkQueue::new());
    let h = harness_with_queue(queue.clone(), Arc::new(UnacknowledgedQueue(queue))).await;

    let err = h
        .dispatcher
        .dispatch(h.user, h.project, &params(512, 512, 16))
        .await
        .unwrap_err();

    let jobs = h.queue.jobs(DEFAULT_QUEUE).await;
    assert_eq!(jobs.len(), 1);
    let project = h.store.get_project(h.user, h.project).await.unwrap();
    assert!(project.render(jobs[0].render).is_some());
    assert_matches!(err, CoreError::DispatchIncomplete { render_id, .. } if render_id == jobs[0].render);
}

#[tokio::test]
async fn failed_rollback_reports_incomplete_dispatch() {
    let h = harness().await;
    h.side_store.set_available(false);
    h.store.set_fail_render_deletes(true);

    let err = h
        .dispatcher
        .dispatch(h.user, h.project, &params(8, 8, 1))
        .await
        .unwrap_err();

    let project = h.store.get_project(h.user, h.project).await.unwrap();
    assert_eq!(project.renders.len(), 1);
    assert_matches!(err, CoreError::DispatchIncomplete { render_id, .. } if render_id == project.renders[0].id);
    assert!(h.queue.published().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn stalled_side_store_times_out() {
    let h = harness().await;
    h.side_store.set_stalled(true);

    let err = h
        .dispatcher
        .dispatch(h.user, h.project, &params(8, 8, 1))
        .await
        .unwrap_err();

    assert_matches!(err, CoreError::DownstreamUnavailable(_));
    assert!(err.is_retryable());
    assert_eq!(render_count(&h).await, 0);
}

#[tokio::test]
async fn offline_document_store_is_unavailable() {
    let h = harness().await;
    h.store.set_available(false);

    let err = h
        .dispatcher
        .dispatch(h.user, h.project, &params(8, 8, 1))
        .await
        .unwrap_err();

    assert_matches!(err, CoreError::DownstreamUnavailable(_));
    assert!(h.queue.published().await.is_empty());
}

// ---------------------------------------------------------------------------
// Delete
// ---------------------------------------------------------------------------

#[tokio::test]
async fn deleting_a_foreign_render_changes_nothing() {
    let h = harness().await;
    h.dispatcher
        .dispatch(h.user, h.project, &params(8, 8, 1))
        .await
        .unwrap();

    let err = h
        .dispatcher
        .delete_render(h.user, h.project, RenderId::new())
        .await
        .unwrap_err();

    assert_matches!(err, CoreError::NotFound { .. });
    assert_eq!(render_count(&h).await, 1);
}
