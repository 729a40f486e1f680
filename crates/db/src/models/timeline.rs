//! Rows of the `segments`, `changes` and `history_nodes` tables.

use sqlx::types::Json;
use sqlx::FromRow;
use vidgit_core::change::{Change, OperationKind};
use vidgit_core::history::HistoryNode;
use vidgit_core::timecode::Timecode;
use vidgit_core::timeline::Segment;
use vidgit_core::types::{ChangeId, DbId, Timestamp};

use crate::error::StoreError;

// ---------------------------------------------------------------------------
// Segments
// ---------------------------------------------------------------------------

/// A row from the `segments` table.
#[derive(Debug, Clone, FromRow)]
pub struct SegmentRow {
    pub video_id: DbId,
    pub source_video_id: DbId,
    pub source_start_ms: i64,
    pub source_end_ms: i64,
    pub global_start_ms: i64,
}

impl From<SegmentRow> for Segment {
    fn from(row: SegmentRow) -> Self {
        Self {
            video_id: row.video_id,
            source_video_id: row.source_video_id,
            source_start_time: Timecode::from_millis(row.source_start_ms),
            source_end_time: Timecode::from_millis(row.source_end_ms),
            global_start_time: Timecode::from_millis(row.global_start_ms),
        }
    }
}

// ---------------------------------------------------------------------------
// Changes
// ---------------------------------------------------------------------------

/// A row from the `changes` table.
#[derive(Debug, Clone, FromRow)]
pub struct ChangeRow {
    pub change_id: ChangeId,
    pub video_id: DbId,
    pub operation: String,
    pub source_video_id: Option<DbId>,
    pub start_ms: i64,
    pub end_ms: i64,
    pub at_ms: i64,
    pub created_at: Timestamp,
}

impl TryFrom<ChangeRow> for Change {
    type Error = StoreError;

    fn try_from(row: ChangeRow) -> Result<Self, Self::Error> {
        let operation: OperationKind = row.operation.parse().map_err(|_| {
            StoreError::Corrupt(format!(
                "change {} has unknown operation '{}'",
                row.change_id, row.operation
            ))
        })?;
        Ok(Self {
            change_id: row.change_id,
            video_id: row.video_id,
            operation,
            source_video_id: row.source_video_id,
            start: Timecode::from_millis(row.start_ms),
            end: Timecode::from_millis(row.end_ms),
            at: Timecode::from_millis(row.at_ms),
            created_at: row.created_at,
        })
    }
}

// ---------------------------------------------------------------------------
// History nodes
// ---------------------------------------------------------------------------

/// A row from the `history_nodes` table. Snapshots are JSONB arrays of
/// segments.
#[derive(Debug, Clone, FromRow)]
pub struct HistoryNodeRow {
    pub change_id: ChangeId,
    pub video_id: DbId,
    pub timeline_snapshot: Json<Vec<Segment>>,
    pub parent_change_id: Option<ChangeId>,
    pub base_snapshot: Option<Json<Vec<Segment>>>,
    pub created_at: Timestamp,
}

impl From<HistoryNodeRow> for HistoryNode {
    fn from(row: HistoryNodeRow) -> Self {
        Self {
            change_id: row.change_id,
            video_id: row.video_id,
            timeline_snapshot: row.timeline_snapshot.0,
            parent_change_id: row.parent_change_id,
            base_snapshot: row.base_snapshot.map(|json| json.0),
            created_at: row.created_at,
        }
    }
}
