//! Per-video read endpoints plus head revert.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;

use vidgit_core::types::DbId;

use crate::error::AppResult;
use crate::handlers::change::{RevertResponse, TimelineView};
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/videos/{id}/timeline
pub async fn get_timeline(
    State(state): State<AppState>,
    Path(video_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let timeline = state.timelines.timeline(video_id).await?;
    Ok(Json(DataResponse {
        data: TimelineView::from(timeline),
    }))
}

/// GET /api/v1/videos/{id}/history
///
/// The history chain, head first.
pub async fn list_history(
    State(state): State<AppState>,
    Path(video_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let history = state.timelines.history(video_id).await?;
    Ok(Json(DataResponse { data: history }))
}

/// GET /api/v1/videos/{id}/commits
///
/// The commit chain, newest first.
pub async fn list_commits(
    State(state): State<AppState>,
    Path(video_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let commits = state.commits.list(video_id).await?;
    Ok(Json(DataResponse { data: commits }))
}

/// POST /api/v1/videos/{id}/revert
///
/// Reverts whatever change is currently the head. Fails with `NO_HISTORY`
/// when the video has nothing left to revert.
pub async fn revert_head(
    State(state): State<AppState>,
    Path(video_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let reverted = state.timelines.revert_head(video_id).await?;
    Ok(Json(DataResponse {
        data: RevertResponse {
            reverted_change_id: reverted.reverted_change_id,
            restored_change_id: reverted.restored_change_id,
            timeline: reverted.timeline.into(),
        },
    }))
}
