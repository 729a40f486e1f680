//! Timeline model: segments of source videos laid end to end.
//!
//! A [`Timeline`] is the ordered, gapless list of [`Segment`]s that make up
//! one composed video. The only ways to obtain a `Timeline` are
//! [`Timeline::new`] (which checks the layout invariant) and
//! [`Timeline::from_pieces`] (which computes global offsets itself), so a
//! value of this type always satisfies:
//!
//! - the first segment starts at 0,
//! - every segment has a positive duration,
//! - each segment starts exactly where the previous one ends.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::timecode::Timecode;
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Segment
// ---------------------------------------------------------------------------

/// A contiguous slice `[source_start_time, source_end_time)` of a source
/// video, placed at `global_start_time` in the timeline of `video_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub video_id: DbId,
    pub source_video_id: DbId,
    pub source_start_time: Timecode,
    pub source_end_time: Timecode,
    pub global_start_time: Timecode,
}

impl Segment {
    pub fn duration(&self) -> Timecode {
        self.source_end_time - self.source_start_time
    }

    /// Global position one past the last instant of this segment.
    pub fn global_end_time(&self) -> Timecode {
        self.global_start_time + self.duration()
    }
}

/// A slice of source material without a position; the processor works on
/// these and lets [`Timeline::from_pieces`] lay them out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Piece {
    pub source_video_id: DbId,
    pub source_start_time: Timecode,
    pub source_end_time: Timecode,
}

impl Piece {
    pub fn duration(&self) -> Timecode {
        self.source_end_time - self.source_start_time
    }
}

impl From<&Segment> for Piece {
    fn from(seg: &Segment) -> Self {
        Self {
            source_video_id: seg.source_video_id,
            source_start_time: seg.source_start_time,
            source_end_time: seg.source_end_time,
        }
    }
}

// ---------------------------------------------------------------------------
// Timeline
// ---------------------------------------------------------------------------

/// The composed timeline of one video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Timeline {
    video_id: DbId,
    segments: Vec<Segment>,
}

impl Timeline {
    /// An empty timeline (total duration zero).
    pub fn empty(video_id: DbId) -> Self {
        Self {
            video_id,
            segments: Vec::new(),
        }
    }

    /// Build a timeline from stored segments, checking every invariant.
    ///
    /// Segments may arrive in any order; they are sorted by
    /// `global_start_time` before validation.
    pub fn new(video_id: DbId, mut segments: Vec<Segment>) -> Result<Self, CoreError> {
        segments.sort_by_key(|s| s.global_start_time);

        let mut expected_start = Timecode::ZERO;
        for (idx, seg) in segments.iter().enumerate() {
            if seg.video_id != video_id {
                return Err(CoreError::Validation(format!(
                    "segment {idx} belongs to video {}, expected {video_id}",
                    seg.video_id
                )));
            }
            if seg.source_end_time <= seg.source_start_time {
                return Err(CoreError::Validation(format!(
                    "segment {idx} has non-positive duration ({} .. {})",
                    seg.source_start_time, seg.source_end_time
                )));
            }
            if seg.global_start_time != expected_start {
                return Err(CoreError::Validation(format!(
                    "segment {idx} starts at {} but the previous segment ends at {expected_start}",
                    seg.global_start_time
                )));
            }
            expected_start = seg.global_end_time();
        }

        Ok(Self { video_id, segments })
    }

    /// Lay out pieces back to back starting at zero. Empty pieces are dropped.
    pub fn from_pieces(video_id: DbId, pieces: impl IntoIterator<Item = Piece>) -> Self {
        let mut cursor = Timecode::ZERO;
        let segments = pieces
            .into_iter()
            .filter(|p| p.source_end_time > p.source_start_time)
            .map(|p| {
                let seg = Segment {
                    video_id,
                    source_video_id: p.source_video_id,
                    source_start_time: p.source_start_time,
                    source_end_time: p.source_end_time,
                    global_start_time: cursor,
                };
                cursor = cursor + p.duration();
                seg
            })
            .collect();
        Self { video_id, segments }
    }

    pub fn video_id(&self) -> DbId {
        self.video_id
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn into_segments(self) -> Vec<Segment> {
        self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn total_duration(&self) -> Timecode {
        self.segments
            .last()
            .map(Segment::global_end_time)
            .unwrap_or(Timecode::ZERO)
    }

    /// The same content re-targeted at another video.
    pub fn retarget(&self, video_id: DbId) -> Timeline {
        Timeline::from_pieces(video_id, self.segments.iter().map(Piece::from))
    }

    /// Merge neighbouring segments that continue the same source without a
    /// jump. Two timelines with equal coalesced forms play identical content.
    pub fn coalesced(&self) -> Timeline {
        let mut pieces: Vec<Piece> = Vec::with_capacity(self.segments.len());
        for seg in &self.segments {
            match pieces.last_mut() {
                Some(prev)
                    if prev.source_video_id == seg.source_video_id
                        && prev.source_end_time == seg.source_start_time =>
                {
                    prev.source_end_time = seg.source_end_time;
                }
                _ => pieces.push(Piece::from(seg)),
            }
        }
        Timeline::from_pieces(self.video_id, pieces)
    }
}
