//! Handlers for the commit chain.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use vidgit_core::commit::NewCommit;
use vidgit_core::types::{CommitId, DbId};

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for `POST /commit`.
#[derive(Debug, Deserialize)]
pub struct CreateCommitRequest {
    pub video_id: DbId,
    pub branch_id: DbId,
    pub description: String,
    #[serde(default)]
    pub changes: Vec<serde_json::Value>,
}

/// POST /api/v1/commit
///
/// Appends a commit to the video's chain. The new commit's parent is the
/// video's previous latest commit.
pub async fn create_commit(
    State(state): State<AppState>,
    Json(input): Json<CreateCommitRequest>,
) -> AppResult<impl IntoResponse> {
    let commit = state
        .commits
        .create(NewCommit {
            video_id: input.video_id,
            branch_id: input.branch_id,
            description: input.description,
            change_set: input.changes,
        })
        .await?;

    Ok(Json(DataResponse { data: commit }))
}

/// GET /api/v1/commit/{id}
pub async fn get_commit(
    State(state): State<AppState>,
    Path(commit_id): Path<CommitId>,
) -> AppResult<impl IntoResponse> {
    let commit = state.commits.get(commit_id).await?;
    Ok(Json(DataResponse { data: commit }))
}
