//! Change records: one requested edit of a video's timeline.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::timecode::Timecode;
use crate::types::{ChangeId, DbId, Timestamp};

/// The four edit operations a change can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Insert,
    Delete,
    Update,
    Merge,
}

impl OperationKind {
    pub const ALL: [OperationKind; 4] = [Self::Insert, Self::Delete, Self::Update, Self::Merge];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Delete => "delete",
            Self::Update => "update",
            Self::Merge => "merge",
        }
    }

    /// Operations that pull material from another video.
    pub fn requires_source(self) -> bool {
        !matches!(self, Self::Delete)
    }

    /// Operations that read a `[start, end)` range.
    pub fn requires_range(self) -> bool {
        !matches!(self, Self::Merge)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "Invalid operation '{s}'. Must be one of: insert, delete, update, merge"
                ))
            })
    }
}

/// A validated request to change a video's timeline, before it has an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSpec {
    pub video_id: DbId,
    pub operation: OperationKind,
    pub source_video_id: Option<DbId>,
    pub start: Timecode,
    pub end: Timecode,
    pub at: Timecode,
}

impl ChangeSpec {
    /// Check the field combinations that do not depend on the timeline.
    ///
    /// Bounds against the current timeline are checked by the processor.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.video_id <= 0 {
            return Err(CoreError::Validation(format!(
                "video_id must be positive, got {}",
                self.video_id
            )));
        }
        if self.operation.requires_source() {
            match self.source_video_id {
                None => {
                    return Err(CoreError::Validation(format!(
                        "source_video_id is required for {}",
                        self.operation
                    )))
                }
                Some(id) if id <= 0 => {
                    return Err(CoreError::Validation(format!(
                        "source_video_id must be positive, got {id}"
                    )))
                }
                Some(_) => {}
            }
        }
        if self.operation.requires_range() && self.start >= self.end {
            return Err(CoreError::Validation(format!(
                "start ({}) must be less than end ({})",
                self.start, self.end
            )));
        }
        Ok(())
    }
}

/// An applied change. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub change_id: ChangeId,
    pub video_id: DbId,
    pub operation: OperationKind,
    pub source_video_id: Option<DbId>,
    pub start: Timecode,
    pub end: Timecode,
    pub at: Timecode,
    pub created_at: Timestamp,
}

impl Change {
    /// Stamp a spec with a fresh time-ordered id and creation time.
    ///
    /// `source_video_id` is dropped for operations that do not use it.
    pub fn from_spec(spec: ChangeSpec) -> Self {
        let source_video_id = if spec.operation.requires_source() {
            spec.source_video_id
        } else {
            None
        };
        Self {
            change_id: uuid::Uuid::now_v7(),
            video_id: spec.video_id,
            operation: spec.operation,
            source_video_id,
            start: spec.start,
            end: spec.end,
            at: spec.at,
            created_at: chrono::Utc::now(),
        }
    }
}
