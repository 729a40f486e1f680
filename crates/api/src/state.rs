use std::sync::Arc;

use vidgit_cache::Cache;
use vidgit_db::{DbPool, Store};
use vidgit_events::EventBus;
use vidgit_pipeline::{ChangeQueue, CommitService, TimelineService};

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: everything is behind an `Arc` or is already `Clone`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Storage backend selected at startup.
    pub store: Arc<dyn Store>,
    /// Present only with the Postgres backend; used by the health check.
    pub pool: Option<DbPool>,
    /// Per-video serialization of timeline mutations.
    pub queue: Arc<ChangeQueue>,
    pub timelines: Arc<TimelineService>,
    pub commits: Arc<CommitService>,
    /// In-process bus carrying `commit.created` and the render results.
    pub event_bus: Arc<EventBus>,
}

impl AppState {
    /// Wire the services over an already-selected store and cache.
    pub fn new(
        config: ServerConfig,
        store: Arc<dyn Store>,
        pool: Option<DbPool>,
        cache: Arc<dyn Cache>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let queue = Arc::new(ChangeQueue::new(config.queue_config()));
        let timelines = Arc::new(TimelineService::new(
            Arc::clone(&store),
            Arc::clone(&queue),
        ));
        let commits = Arc::new(
            CommitService::new(Arc::clone(&store), cache, event_bus.clone())
                .with_cache_ttl(config.cache_ttl()),
        );

        Self {
            config: Arc::new(config),
            store,
            pool,
            queue,
            timelines,
            commits,
            event_bus,
        }
    }
}
