use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;

use vidgit_core::commit::MetadataResult;
use vidgit_core::types::CommitId;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/commit-metadata
///
/// Upserts metadata for a commit. Accepts `commitId`/`metaData` as well.
pub async fn save_metadata(
    State(state): State<AppState>,
    Json(input): Json<MetadataResult>,
) -> AppResult<impl IntoResponse> {
    let saved = state.commits.save_metadata(&input).await?;

    tracing::debug!(commit_id = %input.commit_id, "Commit metadata saved");

    Ok(Json(DataResponse { data: saved }))
}

/// GET /api/v1/commit-metadata/{commit_id}
pub async fn get_metadata(
    State(state): State<AppState>,
    Path(commit_id): Path<CommitId>,
) -> AppResult<impl IntoResponse> {
    let metadata = state.commits.get_metadata(commit_id).await?;
    Ok(Json(DataResponse { data: metadata }))
}
