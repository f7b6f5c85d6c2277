//! Integration tests for render dispatch and deletion over HTTP.

mod common;

use archytex_core::types::RenderId;
use archytex_db::DocumentStore;
use archytex_render::DEFAULT_QUEUE;
use axum::body::Body;
use axum::http::{Method, StatusCode};
use common::{body_json, send};

fn renders_uri(project: impl std::fmt::Display) -> String {
    format!("/api/auth/projects/{project}/renders")
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

#[tokio::test]
async fn dispatch_creates_pending_render_and_queues_job() {
    let test = common::build_test_app();
    let (user, token) = test.login("alice-session").await;
    let project = test.store.create_project(user, "Cabin").await.unwrap();

    let response = send(
        test.app(),
        Method::POST,
        &format!("{}?width=512&height=512&samples=16", renders_uri(project.id)),
        Some(&token),
        Body::from("scene-bytes"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let render: RenderId = body_json(response).await["data"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap();

    let stored = test.store.get_project(user, project.id).await.unwrap();
    assert_eq!(stored.renders.len(), 1);
    let record = stored.render(render).unwrap();
    assert_eq!(record.name, "Cabin-1");
    assert_eq!(record.status, 0.0);
    assert!(record.finished.is_none());

    let jobs = test.queue.jobs(DEFAULT_QUEUE).await;
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].render, render);
    assert_eq!(test.side_store.len().await, 4);
}

#[tokio::test]
async fn dimensions_must_be_divisible_by_four() {
    let test = common::build_test_app();
    let (user, token) = test.login("alice-session").await;
    let project = test.store.create_project(user, "Cabin").await.unwrap();

    let response = send(
        test.app(),
        Method::POST,
        &format!("{}?width=501&height=502&samples=16", renders_uri(project.id)),
        Some(&token),
        Body::from("scene-bytes"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
    assert!(json["error"]
        .as_str()
        .unwrap()
        .contains("divisible by 4"));
    assert!(test
        .store
        .get_project(user, project.id)
        .await
        .unwrap()
        .renders
        .is_empty());
    assert!(test.queue.published().await.is_empty());
}

#[tokio::test]
async fn non_numeric_field_names_the_field() {
    let test = common::build_test_app();
    let (user, token) = test.login("alice-session").await;
    let project = test.store.create_project(user, "Cabin").await.unwrap();

    let response = send(
        test.app(),
        Method::POST,
        &format!("{}?width=512&height=tall&samples=16", renders_uri(project.id)),
        Some(&token),
        Body::empty(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "BAD_REQUEST");
    assert_eq!(json["error"], "invalid height field");
}

#[tokio::test]
async fn side_store_outage_leaves_no_render_behind() {
    let test = common::build_test_app();
    let (user, token) = test.login("alice-session").await;
    let project = test.store.create_project(user, "Cabin").await.unwrap();
    test.side_store.set_available(false);

    let response = send(
        test.app(),
        Method::POST,
        &format!("{}?width=8&height=8&samples=1", renders_uri(project.id)),
        Some(&token),
        Body::from("scene"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let stored = test.store.get_project(user, project.id).await.unwrap();
    assert!(stored.renders.is_empty());
    assert!(test.queue.published().await.is_empty());
}

#[tokio::test]
async fn queue_outage_is_bad_gateway_and_keeps_the_render() {
    let test = common::build_test_app();
    let (user, token) = test.login("alice-session").await;
    let project = test.store.create_project(user, "Cabin").await.unwrap();
    test.queue.set_available(false);

    let response = send(
        test.app(),
        Method::POST,
        &format!("{}?width=8&height=8&samples=1", renders_uri(project.id)),
        Some(&token),
        Body::from("scene"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_json(response).await["code"], "DISPATCH_INCOMPLETE");
    let stored = test.store.get_project(user, project.id).await.unwrap();
    assert_eq!(stored.renders.len(), 1);
}

#[tokio::test]
async fn failed_rollback_is_bad_gateway() {
    let test = common::build_test_app();
    let (user, token) = test.login("alice-session").await;
    let project = test.store.create_project(user, "Cabin").await.unwrap();
    test.side_store.set_available(false);
    test.store.set_fail_render_deletes(true);

    let response = send(
        test.app(),
        Method::POST,
        &format!("{}?width=8&height=8&samples=1", renders_uri(project.id)),
        Some(&token),
        Body::from("scene"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_json(response).await["code"], "DISPATCH_INCOMPLETE");
}

// ---------------------------------------------------------------------------
// Delete
// ---------------------------------------------------------------------------

#[tokio::test]
async fn delete_render() {
    let test = common::build_test_app();
    let (user, token) = test.login("alice-session").await;
    let project = test.store.create_project(user, "Cabin").await.unwrap();
    let render = test.store.create_render(user, project.id).await.unwrap();

    let response = send(
        test.app(),
        Method::DELETE,
        &format!("{}/{}", renders_uri(project.id), render.id),
        Some(&token),
        Body::empty(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let stored = test.store.get_project(user, project.id).await.unwrap();
    assert!(stored.renders.is_empty());
}

#[tokio::test]
async fn deleting_unknown_render_is_not_found_and_changes_nothing() {
    let test = common::build_test_app();
    let (user, token) = test.login("alice-session").await;
    let project = test.store.create_project(user, "Cabin").await.unwrap();
    test.store.create_render(user, project.id).await.unwrap();

    let response = send(
        test.app(),
        Method::DELETE,
        &format!("{}/{}", renders_uri(project.id), RenderId::new()),
        Some(&token),
        Body::empty(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let stored = test.store.get_project(user, project.id).await.unwrap();
    assert_eq!(stored.renders.len(), 1);
}
