//! Redis Streams bridge: render and metadata results come in through a
//! consumer group, `commit.created` and dead letters go out.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use vidgit_events::stream::{self, StreamConfigError};
use vidgit_events::{forward_outbound, RedisStreamProducer, StreamIngress};

use crate::state::AppState;

/// Start the bridge when `EVENT_STREAM_URL` is set.
pub fn spawn(
    state: &AppState,
    tracker: &TaskTracker,
    cancel: &CancellationToken,
) -> Result<(), StreamConfigError> {
    let Some(url) = state.config.event_stream_url.as_deref() else {
        tracing::info!("EVENT_STREAM_URL not set, bus stays in-process");
        return Ok(());
    };
    let client = stream::open_client(url)?;

    // Subscribe before spawning so no announcement is missed.
    let outbound = state.event_bus.subscribe();
    tracker.spawn(forward_outbound(
        Arc::new(RedisStreamProducer::new(client.clone())),
        outbound,
        state.config.consumer_backoff(),
        cancel.clone(),
    ));

    let ingress = StreamIngress::new(
        client,
        state.config.event_stream_group.as_str(),
        state.config.event_stream_consumer.as_str(),
        Arc::clone(&state.event_bus),
        cancel.clone(),
    );
    tracker.spawn(ingress.run());

    tracing::info!(
        group = %state.config.event_stream_group,
        consumer = %state.config.event_stream_consumer,
        "Event stream bridge started"
    );
    Ok(())
}
