use axum::routing::post;
use axum::Router;

use crate::handlers::change;
use crate::state::AppState;

/// Change routes mounted at `/change`.
///
/// ```text
/// POST /         -> apply_change
/// POST /revert   -> revert_change
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(change::apply_change))
        .route("/revert", post(change::revert_change))
}
