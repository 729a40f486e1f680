use axum::routing::post;
use axum::Router;

use crate::handlers::event;
use crate::state::AppState;

/// Event ingress routes mounted at `/events`.
///
/// ```text
/// POST /{topic}  -> publish_event
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/{topic}", post(event::publish_event))
}
