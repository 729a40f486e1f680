//! Render correlator consumers.
//!
//! One consumer per result topic, each with its own bus receiver, so a
//! slow metadata write never delays playlist updates.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use vidgit_events::{Consumer, MessageHandler};
use vidgit_pipeline::{MetadataResultHandler, RenderResultHandler};

use crate::state::AppState;

pub fn spawn(state: &AppState, tracker: &TaskTracker, cancel: &CancellationToken) {
    let handlers: [Arc<dyn MessageHandler>; 2] = [
        Arc::new(RenderResultHandler::new(Arc::clone(&state.commits))),
        Arc::new(MetadataResultHandler::new(Arc::clone(&state.commits))),
    ];

    for handler in handlers {
        // Subscribe before spawning so nothing published after startup is missed.
        let receiver = state.event_bus.subscribe();
        let consumer = Consumer::new(
            handler,
            Arc::clone(&state.event_bus),
            state.config.consumer_backoff(),
            cancel.clone(),
        );
        tracker.spawn(consumer.run(receiver));
    }

    tracing::info!("Render correlator consumers started");
}
