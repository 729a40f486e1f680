//! Handlers for repositories.
//!
//! Creating a repository also creates its default branch, its video and
//! the video's initial commit, all in one store transaction.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use vidgit_core::error::CoreError;
use vidgit_core::repository::{validate_repository_status, NewRepository};
use vidgit_core::types::DbId;
use vidgit_db::RepositoryStore;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for `POST /repos/{id}/status`.
#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

/// POST /api/v1/repos
pub async fn create_repository(
    State(state): State<AppState>,
    Json(input): Json<NewRepository>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let bundle = state.store.create_repository(&input).await?;

    tracing::info!(
        repository_id = bundle.repository.id,
        video_id = bundle.video.id,
        commit_id = %bundle.commit.commit_id,
        author_id = input.author_id,
        "Repository created"
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: bundle })))
}

/// GET /api/v1/repos
pub async fn list_repositories(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let repositories = state.store.list_repositories().await?;
    Ok(Json(DataResponse { data: repositories }))
}

/// GET /api/v1/repos/{id}
///
/// The repository with its branches and videos.
pub async fn get_repository(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let detail = state
        .store
        .get_repository(id)
        .await?
        .ok_or_else(|| CoreError::not_found("Repository", id))?;
    Ok(Json(DataResponse { data: detail }))
}

/// POST /api/v1/repos/{id}/status
pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateStatusRequest>,
) -> AppResult<impl IntoResponse> {
    validate_repository_status(&input.status)?;
    let repository = state
        .store
        .update_repository_status(id, &input.status)
        .await?
        .ok_or_else(|| CoreError::not_found("Repository", id))?;

    tracing::info!(repository_id = id, status = %repository.status, "Repository status updated");

    Ok(Json(DataResponse { data: repository }))
}
