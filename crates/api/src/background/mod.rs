//! Background tasks.
//!
//! Each task is a long-running async function spawned at startup. All
//! tasks stop on a shared [`CancellationToken`] for graceful shutdown.

pub mod correlator;
pub mod stream;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use vidgit_events::stream::StreamConfigError;

use crate::state::AppState;

/// Spawn every background task onto `tracker`.
///
/// The correlator consumers subscribe before the stream bridge starts, so
/// nothing it forwards onto the bus is missed.
pub fn spawn_all(
    state: &AppState,
    tracker: &TaskTracker,
    cancel: &CancellationToken,
) -> Result<(), StreamConfigError> {
    correlator::spawn(state, tracker, cancel);
    stream::spawn(state, tracker, cancel)
}
