//! The change processor: `(timeline, operation) -> timeline`.
//!
//! Every operation is computed as a list of source [`Piece`]s which
//! [`Timeline::from_pieces`] then lays out from zero, so the output satisfies
//! the timeline invariant by construction. The input is never mutated and
//! nothing is returned unless the whole operation is valid.

use crate::change::{Change, OperationKind};
use crate::error::CoreError;
use crate::timecode::{Timecode, MAX_SECONDS};
use crate::timeline::{Piece, Timeline};
use crate::types::DbId;

/// A change with everything it needs from outside the target timeline
/// already resolved.
#[derive(Debug, Clone, Copy)]
pub enum EditOperation<'a> {
    Insert {
        source_video_id: DbId,
        start: Timecode,
        end: Timecode,
        at: Timecode,
    },
    Delete {
        start: Timecode,
        end: Timecode,
    },
    Update {
        source_video_id: DbId,
        start: Timecode,
        end: Timecode,
    },
    /// Append the full timeline of another video.
    Merge { source: &'a Timeline },
}

impl<'a> EditOperation<'a> {
    /// Resolve a stored change. `merge_source` must be provided for merges.
    pub fn from_change(
        change: &Change,
        merge_source: Option<&'a Timeline>,
    ) -> Result<Self, CoreError> {
        let source_video_id = || {
            change.source_video_id.ok_or_else(|| {
                CoreError::Validation(format!(
                    "source_video_id is required for {}",
                    change.operation
                ))
            })
        };

        Ok(match change.operation {
            OperationKind::Insert => Self::Insert {
                source_video_id: source_video_id()?,
                start: change.start,
                end: change.end,
                at: change.at,
            },
            OperationKind::Delete => Self::Delete {
                start: change.start,
                end: change.end,
            },
            OperationKind::Update => Self::Update {
                source_video_id: source_video_id()?,
                start: change.start,
                end: change.end,
            },
            OperationKind::Merge => Self::Merge {
                source: merge_source.ok_or_else(|| {
                    CoreError::Internal("merge source timeline was not resolved".to_string())
                })?,
            },
        })
    }
}

/// Apply one edit to a timeline, returning a brand-new timeline.
pub fn apply_change(timeline: &Timeline, op: &EditOperation<'_>) -> Result<Timeline, CoreError> {
    let pieces = match *op {
        EditOperation::Insert {
            source_video_id,
            start,
            end,
            at,
        } => {
            validate_range(start, end)?;
            validate_insert_position(timeline, at)?;
            insert_pieces(timeline, source_piece(source_video_id, start, end), at)
        }
        EditOperation::Delete { start, end } => {
            validate_range(start, end)?;
            validate_within(timeline, start, end)?;
            delete_pieces(timeline, start, end)
        }
        EditOperation::Update {
            source_video_id,
            start,
            end,
        } => {
            validate_range(start, end)?;
            validate_within(timeline, start, end)?;
            let trimmed = Timeline::from_pieces(timeline.video_id(), delete_pieces(timeline, start, end));
            insert_pieces(&trimmed, source_piece(source_video_id, start, end), start)
        }
        EditOperation::Merge { source } => {
            if source.is_empty() {
                return Err(CoreError::Validation(format!(
                    "video {} has an empty timeline and cannot be merged",
                    source.video_id()
                )));
            }
            timeline
                .segments()
                .iter()
                .chain(source.segments())
                .map(Piece::from)
                .collect()
        }
    };

    let result = Timeline::from_pieces(timeline.video_id(), pieces);
    validate_total(&result)?;
    Ok(result)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate_range(start: Timecode, end: Timecode) -> Result<(), CoreError> {
    if start >= end {
        return Err(CoreError::Validation(format!(
            "start ({start}) must be less than end ({end})"
        )));
    }
    Ok(())
}

fn validate_insert_position(timeline: &Timeline, at: Timecode) -> Result<(), CoreError> {
    let total = timeline.total_duration();
    if at > total {
        return Err(CoreError::Validation(format!(
            "insert position {at} is beyond the end of the timeline ({total})"
        )));
    }
    Ok(())
}

fn validate_within(timeline: &Timeline, start: Timecode, end: Timecode) -> Result<(), CoreError> {
    let total = timeline.total_duration();
    if end > total {
        return Err(CoreError::Validation(format!(
            "range {start}..{end} exceeds the timeline duration ({total})"
        )));
    }
    Ok(())
}

/// Every stored time must still be a valid [`Timecode`] when read back.
fn validate_total(timeline: &Timeline) -> Result<(), CoreError> {
    let total = timeline.total_duration();
    if total > Timecode::MAX {
        return Err(CoreError::Validation(format!(
            "timeline would run to {total}, past the {MAX_SECONDS}s limit"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Piece arithmetic
// ---------------------------------------------------------------------------

fn source_piece(source_video_id: DbId, start: Timecode, end: Timecode) -> Piece {
    Piece {
        source_video_id,
        source_start_time: start,
        source_end_time: end,
    }
}

/// The part of `piece` (placed at global `offset`) that falls inside the
/// global window `[from, to)`.
fn clip(piece: Piece, offset: Timecode, from: Timecode, to: Timecode) -> Option<Piece> {
    let seg_end = offset + piece.duration();
    let lo = from.max(offset);
    let hi = to.min(seg_end);
    if lo >= hi {
        return None;
    }
    Some(Piece {
        source_video_id: piece.source_video_id,
        source_start_time: piece.source_start_time + (lo - offset),
        source_end_time: piece.source_start_time + (hi - offset),
    })
}

fn insert_pieces(timeline: &Timeline, new_piece: Piece, at: Timecode) -> Vec<Piece> {
    let end_of_time = timeline.total_duration();
    let mut before = Vec::with_capacity(timeline.len() + 2);
    let mut after = Vec::new();

    for seg in timeline.segments() {
        let piece = Piece::from(seg);
        before.extend(clip(piece, seg.global_start_time, Timecode::ZERO, at));
        after.extend(clip(piece, seg.global_start_time, at, end_of_time));
    }

    before.push(new_piece);
    before.extend(after);
    before
}

fn delete_pieces(timeline: &Timeline, start: Timecode, end: Timecode) -> Vec<Piece> {
    let end_of_time = timeline.total_duration();
    let mut pieces = Vec::with_capacity(timeline.len() + 1);

    for seg in timeline.segments() {
        let piece = Piece::from(seg);
        pieces.extend(clip(piece, seg.global_start_time, Timecode::ZERO, start));
        pieces.extend(clip(piece, seg.global_start_time, end, end_of_time));
    }

    pieces
}
