//! Applying and reverting timeline changes.
//!
//! Every mutation of a video runs inside that video's lane of the
//! [`ChangeQueue`], so "read current timeline, compute, commit" never
//! interleaves with another mutation of the same video.

use std::sync::Arc;

use serde::Serialize;
use vidgit_core::change::{Change, ChangeSpec, OperationKind};
use vidgit_core::error::CoreError;
use vidgit_core::history::HistoryNode;
use vidgit_core::processor::{apply_change, EditOperation};
use vidgit_core::timeline::Timeline;
use vidgit_core::types::{ChangeId, DbId};
use vidgit_db::{Store, TimelineStore};

use crate::queue::ChangeQueue;

/// Result of a successful apply.
#[derive(Debug, Clone, Serialize)]
pub struct AppliedChange {
    pub change: Change,
    pub timeline: Timeline,
    #[serde(skip)]
    pub node: HistoryNode,
}

/// Result of a successful revert.
#[derive(Debug, Clone, Serialize)]
pub struct RevertedChange {
    pub timeline: Timeline,
    pub reverted_change_id: ChangeId,
    /// The new head, `None` when the chain is now empty.
    pub restored_change_id: Option<ChangeId>,
}

pub struct TimelineService {
    store: Arc<dyn Store>,
    queue: Arc<ChangeQueue>,
}

impl TimelineService {
    pub fn new(store: Arc<dyn Store>, queue: Arc<ChangeQueue>) -> Self {
        Self { store, queue }
    }

    async fn ensure_video(&self, video_id: DbId) -> Result<(), CoreError> {
        self.store
            .find_video(video_id)
            .await?
            .map(|_| ())
            .ok_or_else(|| CoreError::not_found("Video", video_id))
    }

    /// Validate, queue and apply one change.
    pub async fn apply(&self, spec: ChangeSpec) -> Result<AppliedChange, CoreError> {
        spec.validate()?;
        self.ensure_video(spec.video_id).await?;
        if let Some(source) = spec.source_video_id.filter(|_| spec.operation.requires_source()) {
            self.ensure_video(source).await?;
        }

        let store = Arc::clone(&self.store);
        let video_id = spec.video_id;
        self.queue
            .submit(video_id, apply_in_lane(store, spec))
            .await?
    }

    /// Revert `change_id`, which must be the head of its video's chain.
    pub async fn revert(&self, change_id: ChangeId) -> Result<RevertedChange, CoreError> {
        let Some(node) = self.store.find_history_node(change_id).await? else {
            return Err(match self.store.find_change(change_id).await? {
                Some(_) => CoreError::Conflict(format!("Change {change_id} was already reverted")),
                None => CoreError::not_found("Change", change_id),
            });
        };

        let store = Arc::clone(&self.store);
        let video_id = node.video_id;
        self.queue
            .submit(video_id, async move {
                let outcome = store.revert_head(video_id, change_id).await?;
                Ok::<_, CoreError>(outcome)
            })
            .await?
            .map(|outcome| {
                tracing::info!(
                    video_id,
                    change_id = %change_id,
                    new_head = ?outcome.new_head,
                    "Change reverted"
                );
                RevertedChange {
                    timeline: outcome.restored,
                    reverted_change_id: change_id,
                    restored_change_id: outcome.new_head,
                }
            })
    }

    /// Revert whatever change is currently the head of a video's chain.
    pub async fn revert_head(&self, video_id: DbId) -> Result<RevertedChange, CoreError> {
        self.ensure_video(video_id).await?;

        let store = Arc::clone(&self.store);
        let outcome = self
            .queue
            .submit(video_id, async move {
                let head = store
                    .history_head(video_id)
                    .await?
                    .ok_or(CoreError::NoHistory { video_id })?;
                let outcome = store.revert_head(video_id, head.change_id).await?;
                Ok::<_, CoreError>(outcome)
            })
            .await??;

        tracing::info!(
            video_id,
            change_id = %outcome.reverted.change_id,
            new_head = ?outcome.new_head,
            "Head change reverted"
        );
        Ok(RevertedChange {
            reverted_change_id: outcome.reverted.change_id,
            restored_change_id: outcome.new_head,
            timeline: outcome.restored,
        })
    }

    pub async fn timeline(&self, video_id: DbId) -> Result<Timeline, CoreError> {
        self.ensure_video(video_id).await?;
        Ok(self.store.load_timeline(video_id).await?)
    }

    /// A video's history chain, head first.
    pub async fn history(&self, video_id: DbId) -> Result<Vec<HistoryNode>, CoreError> {
        self.ensure_video(video_id).await?;
        Ok(self.store.list_history(video_id).await?)
    }
}

/// Body of one apply unit. Runs with the video's lane held.
async fn apply_in_lane(store: Arc<dyn Store>, spec: ChangeSpec) -> Result<AppliedChange, CoreError> {
    let before = store.load_timeline(spec.video_id).await?;
    let change = Change::from_spec(spec);

    let merge_source = match (change.operation, change.source_video_id) {
        (OperationKind::Merge, Some(source)) => Some(store.load_timeline(source).await?),
        _ => None,
    };
    let op = EditOperation::from_change(&change, merge_source.as_ref())?;
    let after = apply_change(&before, &op)?;

    let node = store.commit_change(&change, &before, &after).await?;

    tracing::info!(
        video_id = change.video_id,
        change_id = %change.change_id,
        operation = %change.operation,
        segments = after.len(),
        total_ms = after.total_duration().as_millis(),
        "Change applied"
    );
    Ok(AppliedChange {
        change,
        timeline: after,
        node,
    })
}
