//! In-memory [`Store`](super::Store) for tests and local runs.
//!
//! All state sits behind one mutex, so every trait method is a single
//! critical section and gets the same atomicity the Postgres transactions
//! give. Nothing survives a restart.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use vidgit_core::change::Change;
use vidgit_core::commit::{Commit, CommitMetadata, NewCommit, INITIAL_COMMIT_DESCRIPTION};
use vidgit_core::error::CoreError;
use vidgit_core::history::{HistoryChain, HistoryNode, RevertOutcome};
use vidgit_core::repository::{
    ensure_same_repository, Branch, NewRepository, Repository, RepositoryBundle,
    RepositoryDetail, Video, DEFAULT_BRANCH_NAME, INITIAL_REPOSITORY_STATUS,
    INITIAL_VIDEO_VERSION,
};
use vidgit_core::timeline::Timeline;
use vidgit_core::types::{ChangeId, CommitId, DbId};

use super::{CommitStore, RepositoryStore, TimelineStore};
use crate::error::StoreError;

#[derive(Debug, Default)]
struct Inner {
    last_id: DbId,
    repositories: BTreeMap<DbId, Repository>,
    branches: BTreeMap<DbId, Branch>,
    videos: BTreeMap<DbId, Video>,
    timelines: HashMap<DbId, Timeline>,
    changes: HashMap<ChangeId, Change>,
    history: HistoryChain,
    commits: HashMap<CommitId, Commit>,
    /// Commit ids per video, oldest first.
    commit_chains: HashMap<DbId, Vec<CommitId>>,
    metadata: HashMap<CommitId, CommitMetadata>,
}

impl Inner {
    fn next_id(&mut self) -> DbId {
        self.last_id += 1;
        self.last_id
    }

    fn video(&self, video_id: DbId) -> Result<&Video, StoreError> {
        self.videos
            .get(&video_id)
            .ok_or_else(|| CoreError::not_found("Video", video_id).into())
    }

    fn timeline(&self, video_id: DbId) -> Timeline {
        self.timelines
            .get(&video_id)
            .cloned()
            .unwrap_or_else(|| Timeline::empty(video_id))
    }

    fn insert_commit(
        &mut self,
        input: &NewCommit,
        parent_commit_id: Option<CommitId>,
    ) -> Commit {
        let now = Utc::now();
        let commit = Commit {
            commit_id: uuid::Uuid::now_v7(),
            description: input.description.clone(),
            change_set: serde_json::Value::Array(input.change_set.clone()),
            branch_id: input.branch_id,
            video_id: input.video_id,
            parent_commit_id,
            playlist_url: None,
            duration: None,
            created_at: now,
            updated_at: now,
        };
        self.commit_chains
            .entry(commit.video_id)
            .or_default()
            .push(commit.commit_id);
        self.commits.insert(commit.commit_id, commit.clone());
        commit
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Corrupt("memory store lock poisoned".to_string()))
    }
}

// ---------------------------------------------------------------------------
// Timeline
// ---------------------------------------------------------------------------

#[async_trait]
impl TimelineStore for MemoryStore {
    async fn find_video(&self, video_id: DbId) -> Result<Option<Video>, StoreError> {
        Ok(self.lock()?.videos.get(&video_id).cloned())
    }

    async fn load_timeline(&self, video_id: DbId) -> Result<Timeline, StoreError> {
        Ok(self.lock()?.timeline(video_id))
    }

    async fn find_change(&self, change_id: ChangeId) -> Result<Option<Change>, StoreError> {
        Ok(self.lock()?.changes.get(&change_id).cloned())
    }

    async fn history_head(&self, video_id: DbId) -> Result<Option<HistoryNode>, StoreError> {
        Ok(self.lock()?.history.head(video_id).cloned())
    }

    async fn find_history_node(
        &self,
        change_id: ChangeId,
    ) -> Result<Option<HistoryNode>, StoreError> {
        Ok(self.lock()?.history.get(&change_id).cloned())
    }

    async fn list_history(&self, video_id: DbId) -> Result<Vec<HistoryNode>, StoreError> {
        Ok(self
            .lock()?
            .history
            .chain(video_id)
            .into_iter()
            .cloned()
            .collect())
    }

    async fn commit_change(
        &self,
        change: &Change,
        before: &Timeline,
        after: &Timeline,
    ) -> Result<HistoryNode, StoreError> {
        let video_id = change.video_id;
        let mut inner = self.lock()?;
        inner.video(video_id)?;

        if inner.timeline(video_id) != *before {
            return Err(CoreError::Conflict(format!(
                "Timeline of video {video_id} changed while the edit was computed"
            ))
            .into());
        }

        let node = inner.history.record_change(change, before, after);
        inner.changes.insert(change.change_id, change.clone());
        inner.timelines.insert(video_id, after.clone());
        Ok(node)
    }

    async fn revert_head(
        &self,
        video_id: DbId,
        expected_head: ChangeId,
    ) -> Result<RevertOutcome, StoreError> {
        let mut inner = self.lock()?;
        inner.video(video_id)?;

        let plan = inner.history.plan_revert(video_id)?;
        if plan.reverted.change_id != expected_head {
            return Err(CoreError::Conflict(format!(
                "Change {expected_head} is not the head of video {video_id}; only the head can be reverted"
            ))
            .into());
        }

        let outcome = inner.history.revert_head(video_id)?;
        inner.timelines.insert(video_id, outcome.restored.clone());
        Ok(outcome)
    }
}

// ---------------------------------------------------------------------------
// Commits
// ---------------------------------------------------------------------------

#[async_trait]
impl CommitStore for MemoryStore {
    async fn append_commit(&self, input: &NewCommit) -> Result<Commit, StoreError> {
        let mut inner = self.lock()?;
        let video = inner.video(input.video_id)?;
        let branch = inner
            .branches
            .get(&input.branch_id)
            .ok_or_else(|| CoreError::not_found("Branch", input.branch_id))?;
        ensure_same_repository(branch, video)?;

        let parent = inner
            .commit_chains
            .get(&input.video_id)
            .and_then(|chain| chain.last().copied());
        Ok(inner.insert_commit(input, parent))
    }

    async fn find_commit(&self, commit_id: CommitId) -> Result<Option<Commit>, StoreError> {
        Ok(self.lock()?.commits.get(&commit_id).cloned())
    }

    async fn list_commits(&self, video_id: DbId) -> Result<Vec<Commit>, StoreError> {
        let inner = self.lock()?;
        let Some(chain) = inner.commit_chains.get(&video_id) else {
            return Ok(Vec::new());
        };
        Ok(chain
            .iter()
            .rev()
            .filter_map(|id| inner.commits.get(id).cloned())
            .collect())
    }

    async fn update_playlist(
        &self,
        commit_id: CommitId,
        playlist_url: &str,
        duration: f64,
    ) -> Result<Option<Commit>, StoreError> {
        let mut inner = self.lock()?;
        let Some(commit) = inner.commits.get_mut(&commit_id) else {
            return Ok(None);
        };
        let unchanged =
            commit.playlist_url.as_deref() == Some(playlist_url) && commit.duration == Some(duration);
        if !unchanged {
            commit.playlist_url = Some(playlist_url.to_string());
            commit.duration = Some(duration);
            commit.updated_at = Utc::now();
        }
        Ok(Some(commit.clone()))
    }

    async fn upsert_metadata(
        &self,
        commit_id: CommitId,
        metadata: &serde_json::Value,
    ) -> Result<CommitMetadata, StoreError> {
        let mut inner = self.lock()?;
        if !inner.commits.contains_key(&commit_id) {
            return Err(CoreError::not_found("Commit", commit_id).into());
        }

        let now = Utc::now();
        let entry = inner
            .metadata
            .entry(commit_id)
            .or_insert_with(|| CommitMetadata {
                commit_id,
                metadata: metadata.clone(),
                created_at: now,
                updated_at: now,
            });
        if entry.metadata != *metadata {
            entry.metadata = metadata.clone();
            entry.updated_at = now;
        }
        Ok(entry.clone())
    }

    async fn find_metadata(
        &self,
        commit_id: CommitId,
    ) -> Result<Option<CommitMetadata>, StoreError> {
        Ok(self.lock()?.metadata.get(&commit_id).cloned())
    }
}

// ---------------------------------------------------------------------------
// Repositories
// ---------------------------------------------------------------------------

#[async_trait]
impl RepositoryStore for MemoryStore {
    async fn create_repository(
        &self,
        input: &NewRepository,
    ) -> Result<RepositoryBundle, StoreError> {
        let mut inner = self.lock()?;
        let now = Utc::now();

        let repository = Repository {
            id: inner.next_id(),
            name: input.name.clone(),
            description: input.description.clone(),
            status: INITIAL_REPOSITORY_STATUS.to_string(),
            author_id: input.author_id,
            created_at: now,
        };
        let branch = Branch {
            id: inner.next_id(),
            repository_id: repository.id,
            name: DEFAULT_BRANCH_NAME.to_string(),
            created_at: now,
        };
        let video = Video {
            id: inner.next_id(),
            repository_id: repository.id,
            title: input.name.clone(),
            description: input.description.clone(),
            file_name: input.file_name.clone(),
            version: INITIAL_VIDEO_VERSION.to_string(),
            created_at: now,
        };

        inner.repositories.insert(repository.id, repository.clone());
        inner.branches.insert(branch.id, branch.clone());
        inner.videos.insert(video.id, video.clone());

        let initial = NewCommit {
            video_id: video.id,
            branch_id: branch.id,
            description: INITIAL_COMMIT_DESCRIPTION.to_string(),
            change_set: Vec::new(),
        };
        let commit = inner.insert_commit(&initial, None);

        Ok(RepositoryBundle {
            repository,
            branch,
            video,
            commit,
        })
    }

    async fn list_repositories(&self) -> Result<Vec<Repository>, StoreError> {
        Ok(self.lock()?.repositories.values().rev().cloned().collect())
    }

    async fn get_repository(&self, id: DbId) -> Result<Option<RepositoryDetail>, StoreError> {
        let inner = self.lock()?;
        let Some(repository) = inner.repositories.get(&id).cloned() else {
            return Ok(None);
        };
        let branches = inner
            .branches
            .values()
            .filter(|b| b.repository_id == id)
            .cloned()
            .collect();
        let videos = inner
            .videos
            .values()
            .filter(|v| v.repository_id == id)
            .cloned()
            .collect();
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
        let mut inner = self.lock()?;
        Ok(inner.repositories.get_mut(&id).map(|repo| {
            repo.status = status.to_string();
            repo.clone()
        }))
    }
}
