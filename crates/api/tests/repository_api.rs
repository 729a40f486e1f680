//! HTTP tests for repositories.

mod common;

use axum::http::StatusCode;
use common::{body_json, create_repository, get, post_json};
use serde_json::json;

#[tokio::test]
async fn create_returns_the_full_bundle() {
    let app = common::build_test_app(common::test_state());
    let bundle = create_repository(&app, "launch").await;

    assert_eq!(bundle["repository"]["name"], "launch");
    assert_eq!(bundle["repository"]["status"], "created");
    assert_eq!(bundle["branch"]["name"], "main");
    assert_eq!(bundle["video"]["version"], "v1");
    assert_eq!(bundle["video"]["file_name"], "launch.mp4");
    assert_eq!(bundle["commit"]["description"], "Initial video upload");
    assert_eq!(bundle["commit"]["change_set"], json!([]));
}

#[tokio::test]
async fn detail_includes_branches_and_videos() {
    let app = common::build_test_app(common::test_state());
    let id = create_repository(&app, "launch").await["repository"]["id"]
        .as_i64()
        .unwrap();

    let response = get(app, &format!("/api/v1/repos/{id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let detail = body_json(response).await["data"].clone();
    assert_eq!(detail["id"], id);
    assert_eq!(detail["branches"].as_array().unwrap().len(), 1);
    assert_eq!(detail["videos"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn list_returns_every_repository() {
    let app = common::build_test_app(common::test_state());
    create_repository(&app, "one").await;
    create_repository(&app, "two").await;

    let response = get(app, "/api/v1/repos").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn blank_name_returns_400() {
    let app = common::build_test_app(common::test_state());
    let response = post_json(
        app,
        "/api/v1/repos",
        json!({ "name": "  ", "author_id": 1, "file_name": "x.mp4" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn status_updates_are_validated() {
    let app = common::build_test_app(common::test_state());
    let id = create_repository(&app, "launch").await["repository"]["id"]
        .as_i64()
        .unwrap();

    let response = post_json(
        app.clone(),
        &format!("/api/v1/repos/{id}/status"),
        json!({ "status": "ready" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["status"], "ready");

    let response = post_json(
        app.clone(),
        &format!("/api/v1/repos/{id}/status"),
        json!({ "status": "exploded" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = post_json(
        app,
        "/api/v1/repos/9999/status",
        json!({ "status": "ready" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_repository_returns_404() {
    let app = common::build_test_app(common::test_state());
    let response = get(app, "/api/v1/repos/9999").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
