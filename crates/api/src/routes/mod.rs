pub mod change;
pub mod commit;
pub mod event;
pub mod health;
pub mod metadata;
pub mod repository;
pub mod video;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /change                                  apply a change (POST)
/// /change/revert                           revert a change by id (POST)
///
/// /videos/{id}/timeline                    current timeline (GET)
/// /videos/{id}/history                     history chain, head first (GET)
/// /videos/{id}/commits                     commit chain, newest first (GET)
/// /videos/{id}/revert                      revert the head change (POST)
///
/// /commit                                  create commit (POST)
/// /commit/{id}                             get commit (GET)
///
/// /commit-metadata                         upsert metadata (POST)
/// /commit-metadata/{commit_id}             get metadata (GET)
///
/// /events/{topic}                          publish a render or metadata result (POST)
///
/// /repos                                   list, create
/// /repos/{id}                              detail with branches and videos
/// /repos/{id}/status                       update status (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/change", change::router())
        .nest("/videos", video::router())
        .nest("/commit", commit::router())
        .nest("/commit-metadata", metadata::router())
        .nest("/events", event::router())
        .nest("/repos", repository::router())
}
