//! Handlers for applying and reverting timeline changes.
//!
//! Times cross the wire as seconds and are converted to millisecond
//! [`Timecode`]s here, before anything reaches the processor.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use vidgit_core::change::{ChangeSpec, OperationKind};
use vidgit_core::timecode::Timecode;
use vidgit_core::timeline::Timeline;
use vidgit_core::types::{ChangeId, DbId};

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for `POST /change`.
#[derive(Debug, Deserialize)]
pub struct ApplyChangeRequest {
    pub video_id: DbId,
    pub operation: String,
    pub source_video_id: Option<DbId>,
    #[serde(default)]
    pub start: f64,
    #[serde(default)]
    pub end: f64,
    #[serde(default)]
    pub at: f64,
}

impl ApplyChangeRequest {
    fn into_spec(self) -> AppResult<ChangeSpec> {
        let operation: OperationKind = self.operation.parse()?;
        Ok(ChangeSpec {
            video_id: self.video_id,
            operation,
            source_video_id: self.source_video_id,
            start: Timecode::from_secs_f64(self.start)?,
            end: Timecode::from_secs_f64(self.end)?,
            at: Timecode::from_secs_f64(self.at)?,
        })
    }
}

/// Request body for `POST /change/revert`.
#[derive(Debug, Deserialize)]
pub struct RevertChangeRequest {
    pub change_id: ChangeId,
}

/// A timeline together with its total duration.
#[derive(Debug, Serialize)]
pub struct TimelineView {
    #[serde(flatten)]
    pub timeline: Timeline,
    pub total_duration: Timecode,
}

impl From<Timeline> for TimelineView {
    fn from(timeline: Timeline) -> Self {
        Self {
            total_duration: timeline.total_duration(),
            timeline,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AppliedChangeResponse {
    pub change_id: ChangeId,
    pub operation: OperationKind,
    pub timeline: TimelineView,
}

#[derive(Debug, Serialize)]
pub struct RevertResponse {
    pub reverted_change_id: ChangeId,
    pub restored_change_id: Option<ChangeId>,
    pub timeline: TimelineView,
}

/// POST /api/v1/change
///
/// Queues the change behind any in-flight change of the same video and
/// returns the resulting timeline.
pub async fn apply_change(
    State(state): State<AppState>,
    Json(input): Json<ApplyChangeRequest>,
) -> AppResult<impl IntoResponse> {
    let spec = input.into_spec()?;
    let applied = state.timelines.apply(spec).await?;

    Ok(Json(DataResponse {
        data: AppliedChangeResponse {
            change_id: applied.change.change_id,
            operation: applied.change.operation,
            timeline: applied.timeline.into(),
        },
    }))
}

/// POST /api/v1/change/revert
///
/// Reverts a change. Only the head of the video's history can be reverted.
pub async fn revert_change(
    State(state): State<AppState>,
    Json(input): Json<RevertChangeRequest>,
) -> AppResult<impl IntoResponse> {
    let reverted = state.timelines.revert(input.change_id).await?;

    Ok(Json(DataResponse {
        data: RevertResponse {
            reverted_change_id: reverted.reverted_change_id,
            restored_change_id: reverted.restored_change_id,
            timeline: reverted.timeline.into(),
        },
    }))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use vidgit_core::error::CoreError;

    use super::*;
    use crate::error::AppError;

    fn request(operation: &str, start: f64) -> ApplyChangeRequest {
        ApplyChangeRequest {
            video_id: 1,
            operation: operation.into(),
            source_video_id: Some(2),
            start,
            end: 5.0,
            at: 4.0,
        }
    }

    #[test]
    fn seconds_become_milliseconds() {
        let spec = request("insert", 2.5).into_spec().unwrap();
        assert_eq!(spec.operation, OperationKind::Insert);
        assert_eq!(spec.start.as_millis(), 2500);
        assert_eq!(spec.at.as_millis(), 4000);
    }

    #[test]
    fn unknown_operation_is_a_validation_error() {
        assert_matches!(
            request("splice", 0.0).into_spec(),
            Err(AppError::Core(CoreError::Validation(_)))
        );
    }

    #[test]
    fn negative_time_is_a_validation_error() {
        assert_matches!(
            request("insert", -1.0).into_spec(),
            Err(AppError::Core(CoreError::Validation(_)))
        );
    }
}
