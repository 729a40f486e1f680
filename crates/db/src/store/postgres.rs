//! Postgres-backed [`Store`](super::Store).

use async_trait::async_trait;
use vidgit_core::change::Change;
use vidgit_core::commit::{Commit, CommitMetadata, NewCommit, INITIAL_COMMIT_DESCRIPTION};
use vidgit_core::error::CoreError;
use vidgit_core::history::{restore_target, HistoryNode, RevertOutcome};
use vidgit_core::repository::{
    ensure_same_repository, NewRepository, Repository, RepositoryBundle, RepositoryDetail,
    Video, DEFAULT_BRANCH_NAME,
};
use vidgit_core::timeline::{Segment, Timeline};
use vidgit_core::types::{ChangeId, CommitId, DbId};

use super::{CommitStore, RepositoryStore, TimelineStore};
use crate::error::StoreError;
use crate::repositories::{
    BranchRepo, ChangeRepo, CommitMetadataRepo, CommitRepo, HistoryRepo, RepositoryRepo,
    SegmentRepo, VideoRepo,
};
use crate::DbPool;

/// Store over a Postgres pool. Cheap to clone.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

fn to_timeline(video_id: DbId, segments: Vec<Segment>) -> Result<Timeline, StoreError> {
    Timeline::new(video_id, segments).map_err(|e| {
        StoreError::Corrupt(format!("segments of video {video_id} do not form a timeline: {e}"))
    })
}

// ---------------------------------------------------------------------------
// Timeline
// ---------------------------------------------------------------------------

#[async_trait]
impl TimelineStore for PgStore {
    async fn find_video(&self, video_id: DbId) -> Result<Option<Video>, StoreError> {
        Ok(VideoRepo::find_by_id(&self.pool, video_id).await?)
    }

    async fn load_timeline(&self, video_id: DbId) -> Result<Timeline, StoreError> {
        let segments = SegmentRepo::list_by_video(&self.pool, video_id).await?;
        to_timeline(video_id, segments)
    }

    async fn find_change(&self, change_id: ChangeId) -> Result<Option<Change>, StoreError> {
        ChangeRepo::find_by_id(&self.pool, change_id).await
    }

    async fn history_head(&self, video_id: DbId) -> Result<Option<HistoryNode>, StoreError> {
        Ok(HistoryRepo::head(&self.pool, video_id).await?)
    }

    async fn find_history_node(
        &self,
        change_id: ChangeId,
    ) -> Result<Option<HistoryNode>, StoreError> {
        Ok(HistoryRepo::find_by_id(&self.pool, change_id).await?)
    }

    async fn list_history(&self, video_id: DbId) -> Result<Vec<HistoryNode>, StoreError> {
        Ok(HistoryRepo::list_by_video(&self.pool, video_id).await?)
    }

    async fn commit_change(
        &self,
        change: &Change,
        before: &Timeline,
        after: &Timeline,
    ) -> Result<HistoryNode, StoreError> {
        let video_id = change.video_id;
        let mut tx = self.pool.begin().await?;

        VideoRepo::lock(&mut *tx, video_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Video", video_id))?;

        let stored = SegmentRepo::list_by_video(&mut *tx, video_id).await?;
        if stored.as_slice() != before.segments() {
            return Err(CoreError::Conflict(format!(
                "Timeline of video {video_id} changed while the edit was computed"
            ))
            .into());
        }

        let head = HistoryRepo::head(&mut *tx, video_id).await?;
        let node = HistoryNode::for_change(change, head.map(|h| h.change_id), before, after);

        SegmentRepo::replace_all(&mut *tx, video_id, after.segments()).await?;
        ChangeRepo::create(&mut *tx, change).await?;
        HistoryRepo::create(&mut *tx, &node).await?;

        tx.commit().await?;

        tracing::debug!(
            video_id,
            change_id = %change.change_id,
            parent_change_id = ?node.parent_change_id,
            segments = after.len(),
            "Change committed"
        );
        Ok(node)
    }

    async fn revert_head(
        &self,
        video_id: DbId,
        expected_head: ChangeId,
    ) -> Result<RevertOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        VideoRepo::lock(&mut *tx, video_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Video", video_id))?;

        let head = HistoryRepo::head(&mut *tx, video_id)
            .await?
            .ok_or(CoreError::NoHistory { video_id })?;
        if head.change_id != expected_head {
            return Err(CoreError::Conflict(format!(
                "Change {expected_head} is not the head of video {video_id}; only the head can be reverted"
            ))
            .into());
        }

        let parent = match head.parent_change_id {
            Some(parent_id) => HistoryRepo::find_by_id(&mut *tx, parent_id).await?,
            None => None,
        };
        let restored = restore_target(&head, parent.as_ref())?;

        HistoryRepo::delete(&mut *tx, head.change_id).await?;
        SegmentRepo::replace_all(&mut *tx, video_id, restored.segments()).await?;

        tx.commit().await?;

        tracing::debug!(
            video_id,
            change_id = %head.change_id,
            new_head = ?head.parent_change_id,
            "History head reverted"
        );
        Ok(RevertOutcome {
            new_head: head.parent_change_id,
            reverted: head,
            restored,
        })
    }
}

// ---------------------------------------------------------------------------
// Commits
// ---------------------------------------------------------------------------

#[async_trait]
impl CommitStore for PgStore {
    async fn append_commit(&self, input: &NewCommit) -> Result<Commit, StoreError> {
        let mut tx = self.pool.begin().await?;

        let video = VideoRepo::lock(&mut *tx, input.video_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Video", input.video_id))?;
        let branch = BranchRepo::find_by_id(&mut *tx, input.branch_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Branch", input.branch_id))?;
        ensure_same_repository(&branch, &video)?;

        let parent = CommitRepo::latest_id_for_video(&mut *tx, input.video_id).await?;
        let commit = CommitRepo::create(&mut *tx, uuid::Uuid::now_v7(), parent, input).await?;

        tx.commit().await?;
        Ok(commit)
    }

    async fn find_commit(&self, commit_id: CommitId) -> Result<Option<Commit>, StoreError> {
        Ok(CommitRepo::find_by_id(&self.pool, commit_id).await?)
    }

    async fn list_commits(&self, video_id: DbId) -> Result<Vec<Commit>, StoreError> {
        Ok(CommitRepo::list_by_video(&self.pool, video_id).await?)
    }

    async fn update_playlist(
        &self,
        commit_id: CommitId,
        playlist_url: &str,
        duration: f64,
    ) -> Result<Option<Commit>, StoreError> {
        Ok(CommitRepo::update_playlist(&self.pool, commit_id, playlist_url, duration).await?)
    }

    async fn upsert_metadata(
        &self,
        commit_id: CommitId,
        metadata: &serde_json::Value,
    ) -> Result<CommitMetadata, StoreError> {
        let mut tx = self.pool.begin().await?;
        CommitRepo::find_by_id(&mut *tx, commit_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Commit", commit_id))?;
        let saved = CommitMetadataRepo::upsert(&mut *tx, commit_id, metadata).await?;
        tx.commit().await?;
        Ok(saved)
    }

    async fn find_metadata(
        &self,
        commit_id: CommitId,
    ) -> Result<Option<CommitMetadata>, StoreError> {
        Ok(CommitMetadataRepo::find_by_commit(&self.pool, commit_id).await?)
    }
}

// ---------------------------------------------------------------------------
// Repositories
// ---------------------------------------------------------------------------

#[async_trait]
impl RepositoryStore for PgStore {
    async fn create_repository(
        &self,
        input: &NewRepository,
    ) -> Result<RepositoryBundle, StoreError> {
        let mut tx = self.pool.begin().await?;

        let repository = RepositoryRepo::create(&mut *tx, input).await?;
        let branch = BranchRepo::create(&mut *tx, repository.id, DEFAULT_BRANCH_NAME).await?;
        let video = VideoRepo::create(
            &mut *tx,
            repository.id,
            &input.name,
            input.description.as_deref(),
            &input.file_name,
        )
        .await?;
        let initial = NewCommit {
            video_id: video.id,
            branch_id: branch.id,
            description: INITIAL_COMMIT_DESCRIPTION.to_string(),
            change_set: Vec::new(),
        };
        let commit = CommitRepo::create(&mut *tx, uuid::Uuid::now_v7(), None, &initial).await?;

        tx.commit().await?;

        tracing::info!(
            repository_id = repository.id,
            video_id = video.id,
            branch_id = branch.id,
            "Repository created"
        );
        Ok(RepositoryBundle {
            repository,
            branch,
            video,
            commit,
        })
    }

    async fn list_repositories(&self) -> Result<Vec<Repository>, StoreError> {
        Ok(RepositoryRepo::list(&self.pool).await?)
    }

    async fn get_repository(&self, id: DbId) -> Result<Option<RepositoryDetail>, StoreError> {
        let Some(repository) = RepositoryRepo::find_by_id(&self.pool, id).await? else {
            return Ok(None);
        };
        let branches = BranchRepo::list_by_repository(&self.pool, id).await?;
        let videos = VideoRepo::list_by_repository(&self.pool, id).await?;
        Ok(Some(RepositoryDetail {
            repository,
            branches,
            videos,
        }))
    }

    async fn update_repository_status(
        &self,
        id: DbId,
        status: &str,
    ) -> Result<Option<Repository>, StoreError> {
        Ok(RepositoryRepo::update_status(&self.pool, id, status).await?)
    }
}
