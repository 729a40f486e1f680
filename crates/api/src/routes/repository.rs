use axum::routing::{get, post};
use axum::Router;

use crate::handlers::repository;
use crate::state::AppState;

/// Repository routes mounted at `/repos`.
///
/// ```text
/// GET  /             -> list_repositories
/// POST /             -> create_repository
/// GET  /{id}         -> get_repository
/// POST /{id}/status  -> update_status
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(repository::list_repositories).post(repository::create_repository),
        )
        .route("/{id}", get(repository::get_repository))
        .route("/{id}/status", post(repository::update_status))
}
