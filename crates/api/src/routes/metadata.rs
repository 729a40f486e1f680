use axum::routing::{get, post};
use axum::Router;

use crate::handlers::metadata;
use crate::state::AppState;

/// Commit metadata routes mounted at `/commit-metadata`.
///
/// ```text
/// POST /             -> save_metadata
/// GET  /{commit_id}  -> get_metadata
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(metadata::save_metadata))
        .route("/{commit_id}", get(metadata::get_metadata))
}
