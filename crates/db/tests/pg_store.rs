//! Integration tests for the PostgreSQL document store.
//!
//! These need a live database (`DATABASE_URL`); run them with
//! `cargo test -p archytex-db -- --ignored`.

use std::time::Duration;

use archytex_core::error::CoreError;
use archytex_core::project::RenderProgress;
use archytex_core::types::UserId;
use archytex_core::account::AssetKind;
use archytex_db::repositories::{AssetRepo, SessionRepo, UserRepo};
use archytex_db::{Change, DocumentStore, PgDocumentStore, PgSessionGate, SessionGate};
use assert_matches::assert_matches;
use futures::StreamExt;
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn new_user(pool: &PgPool, name: &str) -> UserId {
    let id = UserId::new();
    UserRepo::create(pool, id.as_uuid(), name, &format!("{name}@example.com"))
        .await
        .unwrap();
    id
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
async fn project_lifecycle(pool: PgPool) {
    let store = PgDocumentStore::new(pool.clone());
    let user = new_user(&pool, "alice").await;

    let project = store.create_project(user, "Cabin").await.unwrap();
    store.rename_project(user, project.id, "Lodge").await.unwrap();

    let fetched = store.get_project(user, project.id).await.unwrap();
    assert_eq!(fetched.title, "Lodge");
    assert!(!fetched.path.is_empty());

    store.delete_project(user, project.id).await.unwrap();
    let err = store.get_project(user, project.id).await.unwrap_err();
    assert_matches!(err, CoreError::NotFound { .. });
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
async fn renders_are_scoped_to_owner_and_project(pool: PgPool) {
    let store = PgDocumentStore::new(pool.clone());
    let alice = new_user(&pool, "alice").await;
    let bob = new_user(&pool, "bob").await;

    let cabin = store.create_project(alice, "Cabin").await.unwrap();
    let barn = store.create_project(alice, "Barn").await.unwrap();

    let render = store.create_render(alice, cabin.id).await.unwrap();
    assert_eq!(render.name, "Cabin-1");

    let err = store.create_render(bob, cabin.id).await.unwrap_err();
    assert_matches!(err, CoreError::NotFound { .. });

    let err = store.delete_render(alice, barn.id, render.id).await.unwrap_err();
    assert_matches!(err, CoreError::NotFound { .. });
    assert_eq!(store.get_project(alice, cabin.id).await.unwrap().renders.len(), 1);

    let snapshot = store.snapshot(bob).await.unwrap();
    assert!(snapshot.projects.is_empty());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
async fn snapshot_reflects_worker_progress(pool: PgPool) {
    let store = PgDocumentStore::new(pool.clone());
    let user = new_user(&pool, "alice").await;
    let project = store.create_project(user, "Cabin").await.unwrap();
    let render = store.create_render(user, project.id).await.unwrap();

    let done = RenderProgress {
        status: 1.0,
        finished: Some(chrono::Utc::now()),
        icon: Some("cabin.png".into()),
    };
    store
        .update_render(user, project.id, render.id, &done)
        .await
        .unwrap();

    let snapshot = store.snapshot(user).await.unwrap();
    let r = &snapshot.projects[0].renders[0];
    assert_eq!(r.status, 1.0);
    assert!(r.finished.is_some());
    assert_eq!(r.icon, "cabin.png");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
async fn watch_receives_only_own_notifications(pool: PgPool) {
    let store = PgDocumentStore::new(pool.clone());
    let alice = new_user(&pool, "alice").await;
    let bob = new_user(&pool, "bob").await;

    let mut feed = store.watch(alice).await.unwrap();

    store.create_project(bob, "Elsewhere").await.unwrap();
    store.create_project(alice, "Cabin").await.unwrap();

    let change = tokio::time::timeout(Duration::from_secs(5), feed.next())
        .await
        .expect("notification within 5s")
        .unwrap()
        .unwrap();
    assert_eq!(change, Change::Mutated("INSERT".into()));

    // Bob's insert must not have produced a second notification.
    let extra = tokio::time::timeout(Duration::from_millis(300), feed.next()).await;
    assert!(extra.is_err());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
async fn watch_ends_when_listener_connection_drops(pool: PgPool) {
    let store = PgDocumentStore::new(pool.clone());
    let user = new_user(&pool, "alice").await;
    let mut feed = store.watch(user).await.unwrap();

    let terminated: Vec<(bool,)> = sqlx::query_as(
        "SELECT pg_terminate_backend(pid) FROM pg_stat_activity
         WHERE query LIKE '%' || $1 || '%' AND pid <> pg_backend_pid()",
    )
    .bind(archytex_db::pg::change_channel(user))
    .fetch_all(&pool)
    .await
    .unwrap();
    assert_eq!(terminated, vec![(true,)]);

    // Either straight to end-of-stream or one error first; never a silent
    // reconnect that keeps the stream open.
    let mut items = Vec::new();
    loop {
        let next = tokio::time::timeout(Duration::from_secs(5), feed.next())
            .await
            .expect("feed must end within 5s of losing its connection");
        match next {
            Some(item) => items.push(item),
            None => break,
        }
    }
    assert!(items.len() <= 1);
    assert!(items.iter().all(|item| item.is_err()));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
async fn profile_and_asset_catalog(pool: PgPool) {
    let store = PgDocumentStore::new(pool.clone());
    let user = new_user(&pool, "alice").await;

    let profile = store.user_profile(user).await.unwrap();
    assert_eq!(profile.username, "alice");
    assert_eq!(profile.email, "alice@example.com");
    assert_eq!(profile.coins, 0.0);
    assert_matches!(
        store.user_profile(UserId::new()).await.unwrap_err(),
        CoreError::NotFound { .. }
    );

    AssetRepo::create(&pool, AssetKind::Prop, "table", "Table").await.unwrap();
    AssetRepo::create(&pool, AssetKind::Prop, "chair", "Chair").await.unwrap();
    AssetRepo::create(&pool, AssetKind::Texture, "brick", "Brick").await.unwrap();

    let props = store.list_assets(AssetKind::Prop).await.unwrap();
    let ids: Vec<_> = props.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, ["chair", "table"]);
    assert_eq!(store.list_assets(AssetKind::Texture).await.unwrap().len(), 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
async fn session_gate_resolves_and_expires(pool: PgPool) {
    let gate = PgSessionGate::new(pool.clone());
    let user = new_user(&pool, "alice").await;

    SessionRepo::create(&pool, "live-token", user.as_uuid(), None)
        .await
        .unwrap();
    let past = chrono::Utc::now() - chrono::Duration::hours(1);
    SessionRepo::create(&pool, "stale-token", user.as_uuid(), Some(past))
        .await
        .unwrap();

    assert_eq!(gate.resolve("live-token").await.unwrap(), user);
    assert_matches!(
        gate.resolve("stale-token").await.unwrap_err(),
        CoreError::Unauthorized(_)
    );
    assert_matches!(
        gate.resolve("").await.unwrap_err(),
        CoreError::Unauthorized(_)
    );
}
