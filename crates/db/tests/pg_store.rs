//! Integration tests for [`PgStore`] against a real database.
//!
//! Run with `DATABASE_URL` pointing at a Postgres server and `--ignored`.

use assert_matches::assert_matches;
use sqlx::PgPool;
use vidgit_core::change::{Change, ChangeSpec, OperationKind};
use vidgit_core::commit::NewCommit;
use vidgit_core::error::CoreError;
use vidgit_core::processor::{apply_change, EditOperation};
use vidgit_core::repository::NewRepository;
use vidgit_core::timecode::Timecode;
use vidgit_db::{CommitStore, PgStore, RepositoryStore, TimelineStore};

fn new_repository() -> NewRepository {
    NewRepository {
        name: "demo".to_string(),
        description: None,
        author_id: 1,
        file_name: "demo.mp4".to_string(),
    }
}

fn insert(video_id: i64, start_s: i64, end_s: i64, at_s: i64) -> Change {
    Change::from_spec(ChangeSpec {
        video_id,
        operation: OperationKind::Insert,
        source_video_id: Some(video_id),
        start: Timecode::from_millis(start_s * 1000),
        end: Timecode::from_millis(end_s * 1000),
        at: Timecode::from_millis(at_s * 1000),
    })
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_bootstrap_and_repository_bundle(pool: PgPool) {
    vidgit_db::health_check(&pool).await.unwrap();
    let store = PgStore::new(pool);

    let bundle = store.create_repository(&new_repository()).await.unwrap();
    assert_eq!(bundle.branch.repository_id, bundle.repository.id);
    assert!(bundle.commit.parent_commit_id.is_none());

    let detail = store
        .get_repository(bundle.repository.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(detail.videos[0].id, bundle.video.id);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_change_and_revert_round_trip(pool: PgPool) {
    let store = PgStore::new(pool);
    let video_id = store
        .create_repository(&new_repository())
        .await
        .unwrap()
        .video
        .id;

    let mut timelines = vec![store.load_timeline(video_id).await.unwrap()];
    let mut changes = Vec::new();
    for (start, end, at) in [(0, 10, 0), (2, 5, 4), (0, 1, 13)] {
        let change = insert(video_id, start, end, at);
        let before = timelines.last().unwrap().clone();
        let after =
            apply_change(&before, &EditOperation::from_change(&change, None).unwrap()).unwrap();
        store.commit_change(&change, &before, &after).await.unwrap();
        timelines.push(after);
        changes.push(change);
    }
    assert_eq!(store.load_timeline(video_id).await.unwrap(), timelines[3]);
    assert_eq!(store.list_history(video_id).await.unwrap().len(), 3);

    let err = store
        .revert_head(video_id, changes[0].change_id)
        .await
        .unwrap_err();
    assert_matches!(CoreError::from(err), CoreError::Conflict(_));

    for k in (0..3).rev() {
        let outcome = store
            .revert_head(video_id, changes[k].change_id)
            .await
            .unwrap();
        assert_eq!(outcome.restored, timelines[k]);
        assert_eq!(store.load_timeline(video_id).await.unwrap(), timelines[k]);
    }

    let err = store
        .revert_head(video_id, changes[0].change_id)
        .await
        .unwrap_err();
    assert_matches!(CoreError::from(err), CoreError::NoHistory { .. });
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_commit_chain_and_idempotent_playlist(pool: PgPool) {
    let store = PgStore::new(pool);
    let bundle = store.create_repository(&new_repository()).await.unwrap();

    let commit = store
        .append_commit(&NewCommit {
            video_id: bundle.video.id,
            branch_id: bundle.branch.id,
            description: "trim".to_string(),
            change_set: vec![serde_json::json!({ "op": "delete" })],
        })
        .await
        .unwrap();
    assert_eq!(commit.parent_commit_id, Some(bundle.commit.commit_id));

    let first = store
        .update_playlist(commit.commit_id, "https://cdn/p.m3u8", 12.5)
        .await
        .unwrap()
        .unwrap();
    let again = store
        .update_playlist(commit.commit_id, "https://cdn/p.m3u8", 12.5)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.updated_at, again.updated_at);

    let listed = store.list_commits(bundle.video.id).await.unwrap();
    assert_eq!(listed[0].commit_id, commit.commit_id);
}
