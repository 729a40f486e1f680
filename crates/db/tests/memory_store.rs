//! Integration tests for the in-memory store.
//!
//! Exercises the same trait surface the services use:
//! - Repository creation bundle
//! - Atomic change commit and head revert
//! - Commit chain parent resolution and referential checks
//! - Idempotent render-result and metadata writes

use assert_matches::assert_matches;
use vidgit_core::change::{Change, ChangeSpec, OperationKind};
use vidgit_core::commit::{NewCommit, INITIAL_COMMIT_DESCRIPTION};
use vidgit_core::error::CoreError;
use vidgit_core::processor::{apply_change, EditOperation};
use vidgit_core::repository::{NewRepository, RepositoryBundle, DEFAULT_BRANCH_NAME};
use vidgit_core::timecode::Timecode;
use vidgit_core::timeline::Timeline;
use vidgit_db::{CommitStore, MemoryStore, RepositoryStore, StoreError, TimelineStore};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn new_repository(name: &str) -> NewRepository {
    NewRepository {
        name: name.to_string(),
        description: Some("raw footage".to_string()),
        author_id: 1,
        file_name: format!("{name}.mp4"),
    }
}

async fn seeded(store: &MemoryStore) -> RepositoryBundle {
    store.create_repository(&new_repository("demo")).await.unwrap()
}

fn secs(s: i64) -> Timecode {
    Timecode::from_millis(s * 1000)
}

fn insert(video_id: i64, source: i64, start: i64, end: i64, at: i64) -> Change {
    Change::from_spec(ChangeSpec {
        video_id,
        operation: OperationKind::Insert,
        source_video_id: Some(source),
        start: secs(start),
        end: secs(end),
        at: secs(at),
    })
}

/// Apply a change through the store the way the timeline service does.
async fn apply(store: &MemoryStore, change: &Change) -> Timeline {
    let before = store.load_timeline(change.video_id).await.unwrap();
    let op = EditOperation::from_change(change, None).unwrap();
    let after = apply_change(&before, &op).unwrap();
    store.commit_change(change, &before, &after).await.unwrap();
    after
}

fn unwrap_core(err: StoreError) -> CoreError {
    err.into()
}

// ---------------------------------------------------------------------------
// Repositories
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_repository_builds_full_bundle() {
    let store = MemoryStore::new();
    let bundle = seeded(&store).await;

    assert_eq!(bundle.repository.status, "created");
    assert_eq!(bundle.branch.name, DEFAULT_BRANCH_NAME);
    assert_eq!(bundle.video.repository_id, bundle.repository.id);
    assert_eq!(bundle.commit.description, INITIAL_COMMIT_DESCRIPTION);
    assert_eq!(bundle.commit.parent_commit_id, None);
    assert_eq!(bundle.commit.change_set, serde_json::json!([]));

    let detail = store
        .get_repository(bundle.repository.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(detail.branches.len(), 1);
    assert_eq!(detail.videos.len(), 1);
}

#[tokio::test]
async fn list_and_update_repository_status() {
    let store = MemoryStore::new();
    let first = seeded(&store).await;
    store.create_repository(&new_repository("second")).await.unwrap();

    let all = store.list_repositories().await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].name, "second");

    let updated = store
        .update_repository_status(first.repository.id, "ready")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.status, "ready");
    assert!(store
        .update_repository_status(9999, "ready")
        .await
        .unwrap()
        .is_none());
    assert!(store.get_repository(9999).await.unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Timeline and history
// ---------------------------------------------------------------------------

#[tokio::test]
async fn commit_change_persists_timeline_and_history() {
    let store = MemoryStore::new();
    let video_id = seeded(&store).await.video.id;

    let first = insert(video_id, video_id, 0, 10, 0);
    let after = apply(&store, &first).await;

    assert_eq!(store.load_timeline(video_id).await.unwrap(), after);
    assert_eq!(store.find_change(first.change_id).await.unwrap(), Some(first.clone()));

    let head = store.history_head(video_id).await.unwrap().unwrap();
    assert_eq!(head.change_id, first.change_id);
    assert!(head.is_root());
    assert_eq!(head.base_snapshot, Some(vec![]));
}

#[tokio::test]
async fn commit_change_rejects_stale_before() {
    let store = MemoryStore::new();
    let video_id = seeded(&store).await.video.id;
    apply(&store, &insert(video_id, video_id, 0, 10, 0)).await;

    let stale = Timeline::empty(video_id);
    let change = insert(video_id, video_id, 0, 1, 0);
    let op = EditOperation::from_change(&change, None).unwrap();
    let after = apply_change(&stale, &op).unwrap();

    let err = store.commit_change(&change, &stale, &after).await.unwrap_err();
    assert_matches!(unwrap_core(err), CoreError::Conflict(_));
    assert_eq!(store.list_history(video_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn commit_change_for_unknown_video_is_not_found() {
    let store = MemoryStore::new();
    let change = insert(77, 1, 0, 1, 0);
    let empty = Timeline::empty(77);
    let err = store.commit_change(&change, &empty, &empty).await.unwrap_err();
    assert_matches!(unwrap_core(err), CoreError::NotFound { entity: "Video", .. });
}

#[tokio::test]
async fn revert_head_walks_back_to_base() {
    let store = MemoryStore::new();
    let video_id = seeded(&store).await.video.id;

    let c1 = insert(video_id, video_id, 0, 10, 0);
    let t1 = apply(&store, &c1).await;
    let c2 = insert(video_id, 2, 2, 5, 4);
    apply(&store, &c2).await;

    let outcome = store.revert_head(video_id, c2.change_id).await.unwrap();
    assert_eq!(outcome.restored, t1);
    assert_eq!(outcome.new_head, Some(c1.change_id));
    assert_eq!(store.load_timeline(video_id).await.unwrap(), t1);

    let outcome = store.revert_head(video_id, c1.change_id).await.unwrap();
    assert!(outcome.restored.is_empty());
    assert_eq!(outcome.new_head, None);

    let err = store.revert_head(video_id, c1.change_id).await.unwrap_err();
    assert_matches!(unwrap_core(err), CoreError::NoHistory { .. });
}

#[tokio::test]
async fn revert_of_non_head_conflicts_and_changes_nothing() {
    let store = MemoryStore::new();
    let video_id = seeded(&store).await.video.id;

    let c1 = insert(video_id, video_id, 0, 10, 0);
    apply(&store, &c1).await;
    let t2 = apply(&store, &insert(video_id, 2, 0, 1, 0)).await;

    let err = store.revert_head(video_id, c1.change_id).await.unwrap_err();
    assert_matches!(unwrap_core(err), CoreError::Conflict(_));
    assert_eq!(store.load_timeline(video_id).await.unwrap(), t2);
    assert_eq!(store.list_history(video_id).await.unwrap().len(), 2);
}

// ---------------------------------------------------------------------------
// Commits
// ---------------------------------------------------------------------------

#[tokio::test]
async fn commits_chain_to_previous_commit() {
    let store = MemoryStore::new();
    let bundle = seeded(&store).await;
    let input = |description: &str| NewCommit {
        video_id: bundle.video.id,
        branch_id: bundle.branch.id,
        description: description.to_string(),
        change_set: vec![serde_json::json!({ "op": "insert" })],
    };

    let c1 = store.append_commit(&input("c1")).await.unwrap();
    let c2 = store.append_commit(&input("c2")).await.unwrap();

    assert_eq!(c1.parent_commit_id, Some(bundle.commit.commit_id));
    assert_eq!(c2.parent_commit_id, Some(c1.commit_id));

    let chain = store.list_commits(bundle.video.id).await.unwrap();
    let ids: Vec<_> = chain.iter().map(|c| c.commit_id).collect();
    assert_eq!(ids, vec![c2.commit_id, c1.commit_id, bundle.commit.commit_id]);
}

#[tokio::test]
async fn commit_requires_branch_and_video_of_same_repository() {
    let store = MemoryStore::new();
    let a = seeded(&store).await;
    let b = store.create_repository(&new_repository("other")).await.unwrap();

    let mixed = NewCommit {
        video_id: a.video.id,
        branch_id: b.branch.id,
        description: "cross".to_string(),
        change_set: vec![serde_json::json!(1)],
    };
    let err = store.append_commit(&mixed).await.unwrap_err();
    assert_matches!(unwrap_core(err), CoreError::Validation(_));

    let missing = NewCommit {
        branch_id: 9999,
        ..mixed
    };
    let err = store.append_commit(&missing).await.unwrap_err();
    assert_matches!(unwrap_core(err), CoreError::NotFound { entity: "Branch", .. });
}

#[tokio::test]
async fn update_playlist_is_idempotent() {
    let store = MemoryStore::new();
    let commit_id = seeded(&store).await.commit.commit_id;

    let first = store
        .update_playlist(commit_id, "https://cdn/p.m3u8", 12.5)
        .await
        .unwrap()
        .unwrap();
    let again = store
        .update_playlist(commit_id, "https://cdn/p.m3u8", 12.5)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first, again);
    assert_eq!(again.playlist_url.as_deref(), Some("https://cdn/p.m3u8"));

    assert!(store
        .update_playlist(uuid::Uuid::now_v7(), "x", 1.0)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn metadata_upsert_replaces_and_requires_commit() {
    let store = MemoryStore::new();
    let commit_id = seeded(&store).await.commit.commit_id;

    let saved = store
        .upsert_metadata(commit_id, &serde_json::json!({ "fps": 24 }))
        .await
        .unwrap();
    let replaced = store
        .upsert_metadata(commit_id, &serde_json::json!({ "fps": 30 }))
        .await
        .unwrap();
    assert_eq!(replaced.created_at, saved.created_at);
    assert_eq!(
        store.find_metadata(commit_id).await.unwrap().unwrap().metadata["fps"],
        30
    );

    let err = store
        .upsert_metadata(uuid::Uuid::now_v7(), &serde_json::json!({}))
        .await
        .unwrap_err();
    assert_matches!(unwrap_core(err), CoreError::NotFound { entity: "Commit", .. });
}
