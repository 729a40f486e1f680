use axum::routing::{get, post};
use axum::Router;

use crate::handlers::commit;
use crate::state::AppState;

/// Commit routes mounted at `/commit`.
///
/// ```text
/// POST /      -> create_commit
/// GET  /{id}  -> get_commit
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(commit::create_commit))
        .route("/{id}", get(commit::get_commit))
}
