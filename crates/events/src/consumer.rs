//! Typed consumer loop with the dead-letter policy.
//!
//! A [`Consumer`] drives one [`MessageHandler`] from its own bus receiver:
//!
//! - messages for other topics are skipped,
//! - [`HandlerError::Malformed`] dead-letters the message at once,
//! - [`HandlerError::Transient`] is retried with exponential backoff and
//!   dead-lettered once the retry budget is spent.
//!
//! The loop never exits on a handler error; it stops when the bus closes
//! or the cancellation token fires.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::bus::{topics, BusMessage, EventBus};
use crate::producer::Backoff;

// ---------------------------------------------------------------------------
// Handler seam
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HandlerError {
    /// The message can never be processed (undecodable or invalid payload).
    #[error("Malformed message: {0}")]
    Malformed(String),

    /// Processing failed for a reason that may go away (store unreachable).
    #[error("Transient failure: {0}")]
    Transient(String),
}

#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Topic this handler consumes.
    fn topic(&self) -> &'static str;

    /// Consumer group name used in logs.
    fn name(&self) -> &'static str;

    /// Process one message. Must be idempotent: delivery is at-least-once.
    async fn handle(&self, message: &BusMessage) -> Result<(), HandlerError>;
}

/// What happened to one message.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Handled,
    DeadLettered { reason: String, attempts: u32 },
    /// Shutdown interrupted the retries.
    Abandoned,
}

// ---------------------------------------------------------------------------
// Consumer
// ---------------------------------------------------------------------------

pub struct Consumer {
    handler: Arc<dyn MessageHandler>,
    bus: Arc<EventBus>,
    backoff: Backoff,
    cancel: CancellationToken,
}

impl Consumer {
    pub fn new(
        handler: Arc<dyn MessageHandler>,
        bus: Arc<EventBus>,
        backoff: Backoff,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            handler,
            bus,
            backoff,
            cancel,
        }
    }

    /// Run until the bus closes or the token is cancelled.
    ///
    /// Takes the receiver rather than subscribing itself so callers can
    /// subscribe before anything is published.
    pub async fn run(self, mut receiver: broadcast::Receiver<BusMessage>) {
        let group = self.handler.name();
        tracing::info!(group, topic = self.handler.topic(), "Consumer started");

        loop {
            let received = tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!(group, "Consumer stopping (cancelled)");
                    break;
                }
                received = receiver.recv() => received,
            };

            match received {
                Ok(message) if message.topic == self.handler.topic() => {
                    self.process(&message).await;
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(group, skipped = n, "Consumer lagged, some messages were missed");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!(group, "Event bus closed, consumer shutting down");
                    break;
                }
            }
        }
    }

    /// Handle one message under the retry and dead-letter policy.
    pub async fn process(&self, message: &BusMessage) -> Delivery {
        let group = self.handler.name();
        let mut attempt: u32 = 0;

        loop {
            match self.handler.handle(message).await {
                Ok(()) => return Delivery::Handled,
                Err(HandlerError::Malformed(reason)) => {
                    return self.dead_letter(message, reason, attempt + 1);
                }
                Err(HandlerError::Transient(reason)) if attempt < self.backoff.max_retries => {
                    tracing::warn!(
                        group,
                        attempt = attempt + 1,
                        key = ?message.key,
                        error = %reason,
                        "Handler failed, retrying"
                    );
                    tokio::select! {
                        _ = self.cancel.cancelled() => return Delivery::Abandoned,
                        _ = tokio::time::sleep(self.backoff.delay(attempt)) => {}
                    }
                    attempt += 1;
                }
                Err(HandlerError::Transient(reason)) => {
                    return self.dead_letter(message, reason, attempt + 1);
                }
            }
        }
    }

    fn dead_letter(&self, message: &BusMessage, reason: String, attempts: u32) -> Delivery {
        let dlq = topics::dead_letter(&message.topic);
        tracing::error!(
            group = self.handler.name(),
            topic = %message.topic,
            dead_letter_topic = %dlq,
            key = ?message.key,
            attempts,
            error = %reason,
            "Dead-lettering message"
        );

        let mut letter = BusMessage::new(dlq).with_payload(serde_json::json!({
            "original": message,
            "error": reason,
            "attempts": attempts,
            "consumer": self.handler.name(),
        }));
        if let Some(key) = &message.key {
            letter = letter.with_key(key.clone());
        }
        self.bus.publish(letter);

        Delivery::DeadLettered { reason, attempts }
    }
}
