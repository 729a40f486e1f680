//! Redis Streams bridge between the in-process bus and other services.
//!
//! Each topic maps to a stream of the same name. An entry carries a
//! `payload` field (JSON text) and, when the message has one, a `key`.
//!
//! - [`StreamIngress`] reads the inbound topics through a consumer group
//!   and republishes every entry on the [`EventBus`]. An entry is
//!   acknowledged once it is on the bus; on restart the consumer's
//!   pending entries are replayed before new ones.
//! - [`RedisStreamProducer`] appends with `XADD`, and [`forward_outbound`]
//!   drives it from a bus receiver for `commit.created` and dead letters.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::streams::{StreamId, StreamMaxlen, StreamReadOptions, StreamReadReply};
use redis::{AsyncCommands, Client, RedisError, RedisFuture};
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;

use crate::bus::{topics, BusMessage, EventBus};
use crate::producer::{publish_with_retry, Backoff, MessageProducer, ProducerError};

const KEY_FIELD: &str = "key";
const PAYLOAD_FIELD: &str = "payload";

/// Entries fetched per read.
const READ_BATCH: usize = 64;

/// How long one blocking read waits for new entries.
const READ_BLOCK: Duration = Duration::from_secs(5);

/// Pause before reconnecting after a Redis error.
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Approximate length cap applied to every stream we append to.
const MAX_STREAM_LEN: usize = 100_000;

/// The configured stream URL could not be parsed.
#[derive(Debug, thiserror::Error)]
#[error("Invalid event stream URL: {0}")]
pub struct StreamConfigError(#[from] RedisError);

/// Build a client for `url`. Connections are opened lazily.
pub fn open_client(url: &str) -> Result<Client, StreamConfigError> {
    Ok(Client::open(url)?)
}

// ---------------------------------------------------------------------------
// Entry codec
// ---------------------------------------------------------------------------

/// Build the bus message for one stream entry.
///
/// A payload that is not JSON is carried as a JSON string, so the consumer
/// dead-letters it like any other undecodable message.
pub fn entry_to_message(topic: &str, entry: &StreamId) -> BusMessage {
    let field = |name: &str| {
        entry
            .map
            .get(name)
            .and_then(|value| redis::from_redis_value::<String>(value).ok())
    };

    let payload = match field(PAYLOAD_FIELD) {
        Some(raw) => serde_json::from_str(&raw).unwrap_or(serde_json::Value::String(raw)),
        None => serde_json::Value::Null,
    };
    let mut message = BusMessage::new(topic).with_payload(payload);
    message.key = field(KEY_FIELD);
    message
}

/// Stream fields for a bus message.
pub fn message_fields(message: &BusMessage) -> Vec<(&'static str, String)> {
    let mut fields = Vec::with_capacity(2);
    if let Some(key) = &message.key {
        fields.push((KEY_FIELD, key.clone()));
    }
    fields.push((PAYLOAD_FIELD, message.payload.to_string()));
    fields
}

// ---------------------------------------------------------------------------
// Egress
// ---------------------------------------------------------------------------

/// Appends messages to the stream named by their topic.
pub struct RedisStreamProducer {
    client: Client,
    conn: Mutex<Option<MultiplexedConnection>>,
}

impl RedisStreamProducer {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            conn: Mutex::new(None),
        }
    }

    async fn connection(&self) -> Result<MultiplexedConnection, RedisError> {
        let mut slot = self.conn.lock().await;
        if let Some(conn) = slot.as_ref() {
            return Ok(conn.clone());
        }
        let conn = self.client.get_multiplexed_async_connection().await?;
        *slot = Some(conn.clone());
        Ok(conn)
    }
}

#[async_trait]
impl MessageProducer for RedisStreamProducer {
    async fn send(&self, message: BusMessage) -> Result<(), ProducerError> {
        let mut conn = self
            .connection()
            .await
            .map_err(|e| ProducerError::Unavailable(e.to_string()))?;
        let fields = message_fields(&message);

        let appended: Result<String, RedisError> = conn
            .xadd_maxlen(
                message.topic.as_str(),
                StreamMaxlen::Approx(MAX_STREAM_LEN),
                "*",
                fields.as_slice(),
            )
            .await;
        match appended {
            Ok(id) => {
                tracing::debug!(topic = %message.topic, id = %id, "Message appended to stream");
                Ok(())
            }
            Err(e) => {
                // Reconnect on the next attempt.
                *self.conn.lock().await = None;
                Err(ProducerError::Unavailable(e.to_string()))
            }
        }
    }
}

/// Forward outbound topics from the bus through `producer` until the token
/// fires or the bus closes.
pub async fn forward_outbound(
    producer: Arc<dyn MessageProducer>,
    mut receiver: broadcast::Receiver<BusMessage>,
    backoff: Backoff,
    cancel: CancellationToken,
) {
    tracing::info!("Outbound stream forwarder started");
    loop {
        let received = tokio::select! {
            _ = cancel.cancelled() => break,
            received = receiver.recv() => received,
        };

        match received {
            Ok(message) if topics::is_outbound(&message.topic) => {
                let topic = message.topic.clone();
                if let Err(e) = publish_with_retry(producer.as_ref(), message, backoff).await {
                    tracing::error!(topic = %topic, error = %e, "Outbound message dropped");
                }
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!(skipped = n, "Outbound forwarder lagged, some messages were missed");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    tracing::info!("Outbound stream forwarder stopped");
}

// ---------------------------------------------------------------------------
// Ingress
// ---------------------------------------------------------------------------

/// Consumer-group reader feeding the inbound topics onto the bus.
pub struct StreamIngress {
    client: Client,
    group: String,
    consumer: String,
    bus: Arc<EventBus>,
    cancel: CancellationToken,
}

impl StreamIngress {
    pub fn new(
        client: Client,
        group: impl Into<String>,
        consumer: impl Into<String>,
        bus: Arc<EventBus>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            group: group.into(),
            consumer: consumer.into(),
            bus,
            cancel,
        }
    }

    /// Run until cancelled, reconnecting after Redis errors.
    pub async fn run(self) {
        tracing::info!(group = %self.group, consumer = %self.consumer, "Stream ingress started");
        loop {
            match self.pump().await {
                Ok(()) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "Stream ingress lost Redis, reconnecting");
                    tokio::select! {
                        _ = self.cancel.cancelled() => break,
                        _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                    }
                }
            }
        }
        tracing::info!(group = %self.group, "Stream ingress stopped");
    }

    /// Read and republish until cancelled. Returns on the first Redis error.
    async fn pump(&self) -> Result<(), RedisError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        for topic in topics::INBOUND {
            self.ensure_group(&mut conn, topic).await?;
        }

        let options = StreamReadOptions::default()
            .group(self.group.as_str(), self.consumer.as_str())
            .count(READ_BATCH)
            .block(READ_BLOCK.as_millis() as usize);

        let streams = topics::INBOUND;
        // "0" replays entries delivered to us but never acknowledged.
        let mut cursor = "0";
        loop {
            let ids = [cursor; topics::INBOUND.len()];
            let read: RedisFuture<'_, Option<StreamReadReply>> =
                conn.xread_options(&streams[..], &ids[..], &options);
            let reply = tokio::select! {
                _ = self.cancel.cancelled() => return Ok(()),
                reply = read => reply?,
            };

            let mut forwarded = 0usize;
            for stream in reply.map(|r| r.keys).unwrap_or_default() {
                for entry in &stream.ids {
                    let receivers = self.bus.publish(entry_to_message(&stream.key, entry));
                    tracing::debug!(
                        topic = %stream.key,
                        id = %entry.id,
                        receivers,
                        "Stream entry forwarded to bus"
                    );
                    let _: i64 = conn
                        .xack(stream.key.as_str(), self.group.as_str(), &[entry.id.as_str()])
                        .await?;
                    forwarded += 1;
                }
            }

            if cursor == "0" && forwarded == 0 {
                cursor = ">";
            }
        }
    }

    async fn ensure_group(
        &self,
        conn: &mut MultiplexedConnection,
        topic: &str,
    ) -> Result<(), RedisError> {
        let created: Result<(), RedisError> = conn
            .xgroup_create_mkstream(topic, self.group.as_str(), "0")
            .await;
        match created {
            Ok(()) => {
                tracing::info!(topic, group = %self.group, "Stream consumer group created");
                Ok(())
            }
            Err(e) if e.code() == Some("BUSYGROUP") => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;

    use redis::Value;

    use super::*;

    fn entry(fields: &[(&str, &str)]) -> StreamId {
        StreamId {
            id: "1700000000000-0".to_string(),
            map: fields
                .iter()
                .map(|(k, v)| (k.to_string(), Value::Data(v.as_bytes().to_vec())))
                .collect::<HashMap<_, _>>(),
        }
    }

    #[test]
    fn malformed_url_is_a_config_error() {
        assert!(open_client("redis://127.0.0.1:6379").is_ok());
        assert!(open_client("not a url").is_err());
    }

    #[test]
    fn entry_becomes_bus_message() {
        let message = entry_to_message(
            topics::VIDEO_PROCESSED,
            &entry(&[("key", "c1"), ("payload", r#"{"duration":3.5}"#)]),
        );
        assert_eq!(message.topic, topics::VIDEO_PROCESSED);
        assert_eq!(message.key.as_deref(), Some("c1"));
        assert_eq!(message.payload["duration"], 3.5);
    }

    #[test]
    fn non_json_payload_is_kept_as_text() {
        let message = entry_to_message(topics::VIDEO_PROCESSED, &entry(&[("payload", "oops")]));
        assert_eq!(message.payload, serde_json::json!("oops"));
        assert_eq!(message.key, None);

        let empty = entry_to_message(topics::VIDEO_PROCESSED, &entry(&[]));
        assert!(empty.payload.is_null());
    }

    #[test]
    fn fields_carry_key_and_payload() {
        let message = BusMessage::new(topics::COMMIT_CREATED)
            .with_key("42")
            .with_payload(serde_json::json!({ "n": 1 }));
        assert_eq!(
            message_fields(&message),
            vec![("key", "42".to_string()), ("payload", r#"{"n":1}"#.to_string())]
        );
        let keyless = BusMessage::new(topics::COMMIT_CREATED);
        assert_eq!(message_fields(&keyless), vec![("payload", "null".to_string())]);
    }

    #[derive(Default)]
    struct Recorder {
        sent: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl MessageProducer for Recorder {
        async fn send(&self, message: BusMessage) -> Result<(), ProducerError> {
            self.sent.lock().unwrap().push(message.topic);
            Ok(())
        }
    }

    #[tokio::test]
    async fn forwarder_only_sends_outbound_topics() {
        let bus = Arc::new(EventBus::default());
        let recorder = Arc::new(Recorder::default());
        let cancel = CancellationToken::new();
        let task = tokio::spawn(forward_outbound(
            recorder.clone(),
            bus.subscribe(),
            Backoff::new(0, Duration::ZERO),
            cancel.clone(),
        ));

        bus.publish(BusMessage::new(topics::COMMIT_CREATED));
        bus.publish(BusMessage::new(topics::VIDEO_PROCESSED));
        bus.publish(BusMessage::new(topics::dead_letter(topics::VIDEO_PROCESSED)));

        for _ in 0..100 {
            if recorder.sent.lock().unwrap().len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        cancel.cancel();
        task.await.unwrap();

        assert_eq!(
            *recorder.sent.lock().unwrap(),
            vec!["commit.created".to_string(), "video.processed.dlq".to_string()]
        );
    }
}
