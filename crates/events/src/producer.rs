//! Publishing side of the bus, with bounded retry.

use std::time::Duration;

use async_trait::async_trait;
use vidgit_core::error::CoreError;

use crate::bus::{BusMessage, EventBus};

/// Default retry delays in seconds (exponential backoff: 1s, 2s, 4s).
const RETRY_DELAYS_SECS: [u64; 3] = [1, 2, 4];

// ---------------------------------------------------------------------------
// Backoff
// ---------------------------------------------------------------------------

/// Exponential backoff: attempt `n` (0-based) waits `base * 2^n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Backoff {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Delay before retry number `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            max_retries: RETRY_DELAYS_SECS.len() as u32,
            base_delay: Duration::from_secs(RETRY_DELAYS_SECS[0]),
        }
    }
}

// ---------------------------------------------------------------------------
// Producer
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ProducerError {
    /// The transport refused or could not take the message.
    #[error("Producer unavailable: {0}")]
    Unavailable(String),
}

/// Anything that can put a message on a topic.
#[async_trait]
pub trait MessageProducer: Send + Sync {
    async fn send(&self, message: BusMessage) -> Result<(), ProducerError>;
}

#[async_trait]
impl MessageProducer for EventBus {
    async fn send(&self, message: BusMessage) -> Result<(), ProducerError> {
        let topic = message.topic.clone();
        let receivers = self.publish(message);
        tracing::debug!(topic = %topic, receivers, "Message published");
        Ok(())
    }
}

/// Send a message, retrying with `backoff` before giving up with
/// [`CoreError::Transport`].
pub async fn publish_with_retry(
    producer: &dyn MessageProducer,
    message: BusMessage,
    backoff: Backoff,
) -> Result<(), CoreError> {
    let mut attempt = 0;
    loop {
        match producer.send(message.clone()).await {
            Ok(()) => return Ok(()),
            Err(e) if attempt < backoff.max_retries => {
                tracing::warn!(
                    attempt = attempt + 1,
                    topic = %message.topic,
                    error = %e,
                    "Publish attempt failed, retrying"
                );
                tokio::time::sleep(backoff.delay(attempt)).await;
                attempt += 1;
            }
            Err(e) => {
                tracing::error!(
                    attempts = attempt + 1,
                    topic = %message.topic,
                    error = %e,
                    "Publish failed after all retries"
                );
                return Err(CoreError::Transport(format!(
                    "failed to publish to {}: {e}",
                    message.topic
                )));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    /// Fails the first `failures` sends.
    struct Flaky {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl MessageProducer for Flaky {
        async fn send(&self, _message: BusMessage) -> Result<(), ProducerError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(ProducerError::Unavailable("broker down".into()))
            } else {
                Ok(())
            }
        }
    }

    fn fast(max_retries: u32) -> Backoff {
        Backoff::new(max_retries, Duration::ZERO)
    }

    #[test]
    fn default_backoff_doubles() {
        let backoff = Backoff::default();
        assert_eq!(backoff.max_retries, 3);
        assert_eq!(backoff.delay(0), Duration::from_secs(1));
        assert_eq!(backoff.delay(1), Duration::from_secs(2));
        assert_eq!(backoff.delay(2), Duration::from_secs(4));
    }

    #[tokio::test]
    async fn retries_until_success() {
        let producer = Flaky {
            failures: 2,
            calls: AtomicU32::new(0),
        };
        publish_with_retry(&producer, BusMessage::new("t"), fast(3))
            .await
            .unwrap();
        assert_eq!(producer.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_with_transport_error() {
        let producer = Flaky {
            failures: u32::MAX,
            calls: AtomicU32::new(0),
        };
        let err = publish_with_retry(&producer, BusMessage::new("t"), fast(2))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Transport(_)));
        assert_eq!(producer.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn event_bus_never_fails() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        publish_with_retry(&bus, BusMessage::new("commit.created"), fast(0))
            .await
            .unwrap();
        assert_eq!(rx.recv().await.unwrap().topic, "commit.created");
    }
}
