//! In-process topic bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is shared via `Arc<EventBus>`. Every subscriber sees every
//! message and filters by [`BusMessage::topic`]; each consumer group holds
//! its own receiver, so a slow consumer only lags itself.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// Topics
// ---------------------------------------------------------------------------

pub mod topics {
    /// Published after a commit is stored. Payload: the full commit.
    pub const COMMIT_CREATED: &str = "commit.created";

    /// Render output for a commit. Payload: `{commit_id, playlist_url, duration}`.
    pub const VIDEO_PROCESSED: &str = "video.processed";

    /// Extracted metadata for a commit. Payload: `{commit_id, metadata}`.
    pub const VIDEO_METADATA_RESULTS: &str = "video.metadata.results";

    /// Topics other services publish to us.
    pub const INBOUND: [&str; 2] = [VIDEO_PROCESSED, VIDEO_METADATA_RESULTS];

    /// Dead-letter topic for `topic`.
    pub fn dead_letter(topic: &str) -> String {
        format!("{topic}.dlq")
    }

    pub fn is_inbound(topic: &str) -> bool {
        INBOUND.contains(&topic)
    }

    /// Topics forwarded to an external broker: our announcements and
    /// everything dead-lettered.
    pub fn is_outbound(topic: &str) -> bool {
        topic == COMMIT_CREATED || topic.ends_with(".dlq")
    }
}

// ---------------------------------------------------------------------------
// BusMessage
// ---------------------------------------------------------------------------

/// A message on the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusMessage {
    /// Dot-separated topic name, e.g. `"commit.created"`.
    pub topic: String,

    /// Partition key; messages with the same key keep their order.
    pub key: Option<String>,

    pub payload: serde_json::Value,

    pub published_at: DateTime<Utc>,
}

impl BusMessage {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            key: None,
            payload: serde_json::Value::Null,
            published_at: Utc::now(),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// Decode the payload into a typed value.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.payload)
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

pub struct EventBus {
    sender: broadcast::Sender<BusMessage>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full the oldest unread messages are dropped and
    /// slow receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish to all current subscribers. Returns how many received it.
    pub fn publish(&self, message: BusMessage) -> usize {
        // A SendError only means there are zero receivers.
        self.sender.send(message).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BusMessage> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
