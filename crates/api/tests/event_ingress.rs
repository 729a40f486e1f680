//! External results posted over HTTP reach commits through the bus.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use axum::Router;
use common::{body_json, create_repository, get, post_json};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use vidgit_api::background;
use vidgit_api::state::AppState;
use vidgit_events::topics;

struct Running {
    app: Router,
    state: AppState,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl Running {
    fn start() -> Self {
        let state = common::test_state();
        let cancel = CancellationToken::new();
        let tracker = TaskTracker::new();
        background::spawn_all(&state, &tracker, &cancel).unwrap();
        Self {
            app: common::build_test_app(state.clone()),
            state,
            cancel,
            tracker,
        }
    }

    async fn stop(self) {
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}

/// Poll `uri` until `pick` finds a non-null value in the response.
async fn wait_for(app: &Router, uri: &str, pick: impl Fn(&Value) -> Value) -> Value {
    for _ in 0..100 {
        let response = get(app.clone(), uri).await;
        if response.status() == StatusCode::OK {
            let value = pick(&body_json(response).await);
            if !value.is_null() {
                return value;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    Value::Null
}

#[tokio::test]
async fn posted_render_result_updates_the_commit() {
    let running = Running::start();
    let commit_id = create_repository(&running.app, "launch").await["commit"]["commit_id"].clone();

    let response = post_json(
        running.app.clone(),
        "/api/v1/events/video.processed",
        json!({
            "key": commit_id,
            "payload": {
                "commit_id": commit_id,
                "playlist_url": "https://cdn.example/launch.m3u8",
                "duration": 42.5,
            },
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["topic"], "video.processed");
    assert!(json["data"]["receivers"].as_u64().unwrap() >= 1);

    let uri = format!("/api/v1/commit/{}", commit_id.as_str().unwrap());
    let playlist = wait_for(&running.app, &uri, |body| body["data"]["playlist_url"].clone()).await;
    assert_eq!(playlist, "https://cdn.example/launch.m3u8");

    running.stop().await;
}

#[tokio::test]
async fn posted_metadata_result_is_stored() {
    let running = Running::start();
    let commit_id = create_repository(&running.app, "launch").await["commit"]["commit_id"].clone();

    let response = post_json(
        running.app.clone(),
        "/api/v1/events/video.metadata.results",
        json!({ "payload": { "commitId": commit_id, "metaData": { "fps": 25 } } }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let uri = format!("/api/v1/commit-metadata/{}", commit_id.as_str().unwrap());
    let fps = wait_for(&running.app, &uri, |body| body["data"]["metadata"]["fps"].clone()).await;
    assert_eq!(fps, 25);

    running.stop().await;
}

#[tokio::test]
async fn undecodable_result_is_dead_lettered() {
    let running = Running::start();
    let mut bus = running.state.event_bus.subscribe();

    let response = post_json(
        running.app.clone(),
        "/api/v1/events/video.processed",
        json!({ "key": "c-1", "payload": { "playlist_url": 7 } }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let dead = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let message = bus.recv().await.unwrap();
            if message.topic == topics::dead_letter(topics::VIDEO_PROCESSED) {
                return message;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(dead.key.as_deref(), Some("c-1"));

    running.stop().await;
}

#[tokio::test]
async fn only_inbound_topics_are_accepted() {
    let running = Running::start();

    for topic in ["commit.created", "video.processed.dlq", "anything"] {
        let response = post_json(
            running.app.clone(),
            &format!("/api/v1/events/{topic}"),
            json!({ "payload": {} }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "topic {topic}");
        assert_eq!(body_json(response).await["code"], "BAD_REQUEST");
    }

    running.stop().await;
}
