//! Per-video history chain of timeline snapshots.
//!
//! Nodes live in an arena keyed by [`ChangeId`]; each video has an explicit
//! head index. Walking the chain is a sequence of map lookups through
//! `parent_change_id`, never pointer chasing.
//!
//! Only the head can be reverted. Reverting restores the parent's snapshot,
//! or for the root node the `base_snapshot` captured before the first change.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::change::Change;
use crate::error::CoreError;
use crate::timeline::{Segment, Timeline};
use crate::types::{ChangeId, DbId, Timestamp};

/// One link of the history chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryNode {
    pub change_id: ChangeId,
    pub video_id: DbId,
    /// Timeline after the change was applied.
    pub timeline_snapshot: Vec<Segment>,
    pub parent_change_id: Option<ChangeId>,
    /// Timeline before the change; only set on the root of a chain.
    pub base_snapshot: Option<Vec<Segment>>,
    pub created_at: Timestamp,
}

impl HistoryNode {
    /// Build the node recording `change`, which turned `before` into `after`.
    pub fn for_change(
        change: &Change,
        parent_change_id: Option<ChangeId>,
        before: &Timeline,
        after: &Timeline,
    ) -> Self {
        Self {
            change_id: change.change_id,
            video_id: change.video_id,
            timeline_snapshot: after.segments().to_vec(),
            parent_change_id,
            base_snapshot: parent_change_id
                .is_none()
                .then(|| before.segments().to_vec()),
            created_at: change.created_at,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_change_id.is_none()
    }

    /// The timeline recorded by this node.
    pub fn timeline(&self) -> Result<Timeline, CoreError> {
        snapshot_to_timeline(self.video_id, &self.timeline_snapshot)
    }
}

/// What a successful revert changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevertOutcome {
    /// The removed head.
    pub reverted: HistoryNode,
    /// The timeline the video's segments must now equal.
    pub restored: Timeline,
    /// The new head, `None` when the root itself was reverted.
    pub new_head: Option<ChangeId>,
}

/// Compute the timeline a revert of `head` must restore.
///
/// `parent` must be the node named by `head.parent_change_id` (if any).
pub fn restore_target(
    head: &HistoryNode,
    parent: Option<&HistoryNode>,
) -> Result<Timeline, CoreError> {
    match (head.parent_change_id, parent) {
        (Some(expected), Some(p)) if p.change_id == expected => p.timeline(),
        (Some(expected), _) => Err(CoreError::Internal(format!(
            "history node {} points at missing parent {expected}",
            head.change_id
        ))),
        (None, _) => match &head.base_snapshot {
            Some(base) => snapshot_to_timeline(head.video_id, base),
            None => Ok(Timeline::empty(head.video_id)),
        },
    }
}

fn snapshot_to_timeline(video_id: DbId, snapshot: &[Segment]) -> Result<Timeline, CoreError> {
    Timeline::new(video_id, snapshot.to_vec()).map_err(|e| {
        CoreError::Internal(format!("stored snapshot for video {video_id} is invalid: {e}"))
    })
}

// ---------------------------------------------------------------------------
// Arena
// ---------------------------------------------------------------------------

/// In-memory arena of history nodes with one head per video.
#[derive(Debug, Default, Clone)]
pub struct HistoryChain {
    nodes: HashMap<ChangeId, HistoryNode>,
    heads: HashMap<DbId, ChangeId>,
}

impl HistoryChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, change_id: &ChangeId) -> Option<&HistoryNode> {
        self.nodes.get(change_id)
    }

    pub fn head(&self, video_id: DbId) -> Option<&HistoryNode> {
        self.heads.get(&video_id).and_then(|id| self.nodes.get(id))
    }

    /// Append a node for `change` and advance the video's head to it.
    pub fn record_change(
        &mut self,
        change: &Change,
        before: &Timeline,
        after: &Timeline,
    ) -> HistoryNode {
        let parent = self.heads.get(&change.video_id).copied();
        let node = HistoryNode::for_change(change, parent, before, after);
        self.heads.insert(node.video_id, node.change_id);
        self.nodes.insert(node.change_id, node.clone());
        node
    }

    /// Compute a revert of the video's head without changing the arena.
    pub fn plan_revert(&self, video_id: DbId) -> Result<RevertOutcome, CoreError> {
        let head = self
            .head(video_id)
            .ok_or(CoreError::NoHistory { video_id })?;
        let parent = head.parent_change_id.and_then(|id| self.nodes.get(&id));
        let restored = restore_target(head, parent)?;
        Ok(RevertOutcome {
            reverted: head.clone(),
            restored,
            new_head: head.parent_change_id,
        })
    }

    /// Remove the video's head and make its parent the new head.
    pub fn revert_head(&mut self, video_id: DbId) -> Result<RevertOutcome, CoreError> {
        let outcome = self.plan_revert(video_id)?;
        self.nodes.remove(&outcome.reverted.change_id);
        match outcome.new_head {
            Some(parent) => self.heads.insert(video_id, parent),
            None => self.heads.remove(&video_id),
        };
        Ok(outcome)
    }

    /// The chain for a video, head first.
    pub fn chain(&self, video_id: DbId) -> Vec<&HistoryNode> {
        let mut out = Vec::new();
        let mut cursor = self.heads.get(&video_id).copied();
        while let Some(id) = cursor {
            match self.nodes.get(&id) {
                Some(node) => {
                    cursor = node.parent_change_id;
                    out.push(node);
                }
                None => break,
            }
        }
        out
    }

    pub fn len(&self, video_id: DbId) -> usize {
        self.chain(video_id).len()
    }
}
