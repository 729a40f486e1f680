//! Message bus plumbing for vidgit.
//!
//! - [`EventBus`]: in-process topic bus backed by `tokio::sync::broadcast`.
//! - [`BusMessage`]: the envelope every topic carries.
//! - [`producer`]: the [`MessageProducer`] seam and bounded publish retry.
//! - [`consumer`]: the typed consumer loop with the dead-letter policy.
//! - [`stream`]: Redis Streams ingress and egress for other services.

pub mod bus;
pub mod consumer;
pub mod producer;
pub mod stream;

pub use bus::{topics, BusMessage, EventBus};
pub use consumer::{Consumer, Delivery, HandlerError, MessageHandler};
pub use producer::{publish_with_retry, Backoff, MessageProducer, ProducerError};
pub use stream::{forward_outbound, RedisStreamProducer, StreamIngress};
