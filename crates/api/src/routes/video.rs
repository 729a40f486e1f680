use axum::routing::{get, post};
use axum::Router;

use crate::handlers::video;
use crate::state::AppState;

/// Per-video routes mounted at `/videos`.
///
/// ```text
/// GET  /{id}/timeline  -> get_timeline
/// GET  /{id}/history   -> list_history
/// GET  /{id}/commits   -> list_commits
/// POST /{id}/revert    -> revert_head
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}/timeline", get(video::get_timeline))
        .route("/{id}/history", get(video::list_history))
        .route("/{id}/commits", get(video::list_commits))
        .route("/{id}/revert", post(video::revert_head))
}
