//! Storage traits the service layer depends on.
//!
//! The traits are split by concern; [`Store`] bundles them so services hold a
//! single `Arc<dyn Store>`. Every mutating method is one atomic unit: a
//! Postgres transaction in [`postgres::PgStore`], one critical section in
//! [`memory::MemoryStore`].

use async_trait::async_trait;
use vidgit_core::change::Change;
use vidgit_core::commit::{Commit, CommitMetadata, NewCommit};
use vidgit_core::history::{HistoryNode, RevertOutcome};
use vidgit_core::repository::{
    NewRepository, Repository, RepositoryBundle, RepositoryDetail, Video,
};
use vidgit_core::timeline::Timeline;
use vidgit_core::types::{ChangeId, CommitId, DbId};

use crate::error::StoreError;

pub mod memory;
pub mod postgres;

/// Segments, changes and the history chain of videos.
#[async_trait]
pub trait TimelineStore: Send + Sync {
    async fn find_video(&self, video_id: DbId) -> Result<Option<Video>, StoreError>;

    /// The current timeline of a video (empty if it has no segments).
    async fn load_timeline(&self, video_id: DbId) -> Result<Timeline, StoreError>;

    async fn find_change(&self, change_id: ChangeId) -> Result<Option<Change>, StoreError>;

    async fn history_head(&self, video_id: DbId) -> Result<Option<HistoryNode>, StoreError>;

    async fn find_history_node(
        &self,
        change_id: ChangeId,
    ) -> Result<Option<HistoryNode>, StoreError>;

    /// A video's history chain, head first.
    async fn list_history(&self, video_id: DbId) -> Result<Vec<HistoryNode>, StoreError>;

    /// Atomically replace the video's segments with `after`, store `change`
    /// and append a history node after the current head.
    ///
    /// Fails with `Conflict` if the stored timeline no longer equals `before`.
    async fn commit_change(
        &self,
        change: &Change,
        before: &Timeline,
        after: &Timeline,
    ) -> Result<HistoryNode, StoreError>;

    /// Atomically remove the head of a video's chain and restore the
    /// timeline it replaced.
    ///
    /// Fails with `NoHistory` for an empty chain and `Conflict` when the
    /// head is not `expected_head`.
    async fn revert_head(
        &self,
        video_id: DbId,
        expected_head: ChangeId,
    ) -> Result<RevertOutcome, StoreError>;
}

/// The commit chain and commit metadata.
#[async_trait]
pub trait CommitStore: Send + Sync {
    /// Insert a commit whose parent is the video's latest commit.
    ///
    /// The branch and the video must exist and belong to the same repository.
    async fn append_commit(&self, input: &NewCommit) -> Result<Commit, StoreError>;

    async fn find_commit(&self, commit_id: CommitId) -> Result<Option<Commit>, StoreError>;

    /// A video's commits, newest first.
    async fn list_commits(&self, video_id: DbId) -> Result<Vec<Commit>, StoreError>;

    /// Set render output. Returns `None` for an unknown commit.
    async fn update_playlist(
        &self,
        commit_id: CommitId,
        playlist_url: &str,
        duration: f64,
    ) -> Result<Option<Commit>, StoreError>;

    /// Insert or replace a commit's metadata. `NotFound` for an unknown commit.
    async fn upsert_metadata(
        &self,
        commit_id: CommitId,
        metadata: &serde_json::Value,
    ) -> Result<CommitMetadata, StoreError>;

    async fn find_metadata(
        &self,
        commit_id: CommitId,
    ) -> Result<Option<CommitMetadata>, StoreError>;
}

/// Repositories with their branches and videos.
#[async_trait]
pub trait RepositoryStore: Send + Sync {
    /// Create a repository, its default branch, its video and the video's
    /// initial commit.
    async fn create_repository(
        &self,
        input: &NewRepository,
    ) -> Result<RepositoryBundle, StoreError>;

    async fn list_repositories(&self) -> Result<Vec<Repository>, StoreError>;

    async fn get_repository(&self, id: DbId) -> Result<Option<RepositoryDetail>, StoreError>;

    /// Returns `None` if the repository does not exist.
    async fn update_repository_status(
        &self,
        id: DbId,
        status: &str,
    ) -> Result<Option<Repository>, StoreError>;
}

/// Everything the services need from storage.
pub trait Store: TimelineStore + CommitStore + RepositoryStore {}

impl<T: TimelineStore + CommitStore + RepositoryStore> Store for T {}
