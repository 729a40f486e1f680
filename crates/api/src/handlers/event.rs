//! Webhook ingress for services that post results over HTTP instead of
//! writing to the event streams.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use vidgit_events::{topics, BusMessage};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for `POST /events/{topic}`.
#[derive(Debug, Deserialize)]
pub struct PublishEventRequest {
    /// Partition key, usually the commit id.
    pub key: Option<String>,
    pub payload: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct PublishedEvent {
    pub topic: String,
    /// Consumers that received the message.
    pub receivers: usize,
}

/// POST /api/v1/events/{topic}
///
/// Puts a render or metadata result on the bus. Only inbound topics are
/// accepted; the payload is checked by the consumer, which dead-letters
/// anything it cannot decode.
pub async fn publish_event(
    State(state): State<AppState>,
    Path(topic): Path<String>,
    Json(input): Json<PublishEventRequest>,
) -> AppResult<impl IntoResponse> {
    if !topics::is_inbound(&topic) {
        return Err(AppError::BadRequest(format!(
            "topic '{topic}' does not accept external messages"
        )));
    }

    let mut message = BusMessage::new(topic.as_str()).with_payload(input.payload);
    message.key = input.key;
    let receivers = state.event_bus.publish(message);

    tracing::info!(topic = %topic, receivers, "External event published");

    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: PublishedEvent { topic, receivers },
        }),
    ))
}
