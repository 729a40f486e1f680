//! Commit chain service: store writes, cache-aside reads and the
//! `commit.created` announcement.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use vidgit_cache::{commit_key, commit_metadata_key, get_json, set_json, Cache};
use vidgit_core::commit::{Commit, CommitMetadata, MetadataResult, NewCommit, RenderResult};
use vidgit_core::error::CoreError;
use vidgit_core::types::{CommitId, DbId};
use vidgit_db::{CommitStore, Store, TimelineStore};
use vidgit_events::{publish_with_retry, topics, Backoff, BusMessage, MessageProducer};

pub struct CommitService {
    store: Arc<dyn Store>,
    cache: Arc<dyn Cache>,
    producer: Arc<dyn MessageProducer>,
    cache_ttl: Option<Duration>,
    publish_backoff: Backoff,
    /// Bumped whenever a stored commit changes after creation. A read that
    /// filled the cache while it moved drops its fill again.
    invalidations: AtomicU64,
}

impl CommitService {
    pub fn new(
        store: Arc<dyn Store>,
        cache: Arc<dyn Cache>,
        producer: Arc<dyn MessageProducer>,
    ) -> Self {
        Self {
            store,
            cache,
            producer,
            cache_ttl: None,
            publish_backoff: Backoff::default(),
            invalidations: AtomicU64::new(0),
        }
    }

    pub fn with_cache_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_publish_backoff(mut self, backoff: Backoff) -> Self {
        self.publish_backoff = backoff;
        self
    }

    /// Append a commit to a video's chain and announce it.
    ///
    /// The announcement runs on its own task; a publish failure is logged
    /// and never fails the request.
    pub async fn create(&self, input: NewCommit) -> Result<Commit, CoreError> {
        input.validate()?;
        let commit = self.store.append_commit(&input).await?;

        set_json(
            self.cache.as_ref(),
            &commit_key(commit.commit_id),
            &commit,
            self.cache_ttl,
        )
        .await;

        tracing::info!(
            commit_id = %commit.commit_id,
            video_id = commit.video_id,
            branch_id = commit.branch_id,
            parent = ?commit.parent_commit_id,
            "Commit created"
        );

        self.announce(&commit);
        Ok(commit)
    }

    fn announce(&self, commit: &Commit) {
        let payload = match serde_json::to_value(commit) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(commit_id = %commit.commit_id, error = %e, "Failed to encode commit event");
                return;
            }
        };
        let message = BusMessage::new(topics::COMMIT_CREATED)
            .with_key(commit.video_id.to_string())
            .with_payload(payload);

        let producer = Arc::clone(&self.producer);
        let backoff = self.publish_backoff;
        let commit_id = commit.commit_id;
        tokio::spawn(async move {
            if let Err(e) = publish_with_retry(producer.as_ref(), message, backoff).await {
                tracing::error!(commit_id = %commit_id, error = %e, "commit.created was not published");
            }
        });
    }

    pub async fn get(&self, commit_id: CommitId) -> Result<Commit, CoreError> {
        let key = commit_key(commit_id);
        if let Some(commit) = get_json::<Commit>(self.cache.as_ref(), &key).await {
            tracing::debug!(commit_id = %commit_id, "Commit cache hit");
            return Ok(commit);
        }

        let generation = self.invalidations.load(Ordering::SeqCst);
        let commit = self
            .store
            .find_commit(commit_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Commit", commit_id))?;
        set_json(self.cache.as_ref(), &key, &commit, self.cache_ttl).await;
        if self.invalidations.load(Ordering::SeqCst) != generation {
            // A writer ran between our store read and the fill.
            self.cache.delete(&key).await;
        }
        Ok(commit)
    }

    /// A video's commit chain, newest first.
    pub async fn list(&self, video_id: DbId) -> Result<Vec<Commit>, CoreError> {
        if self.store.find_video(video_id).await?.is_none() {
            return Err(CoreError::not_found("Video", video_id));
        }
        Ok(self.store.list_commits(video_id).await?)
    }

    /// Record render output. `None` when the commit does not exist.
    ///
    /// The cached copy is dropped rather than overwritten so a concurrent
    /// read cannot put an older row back over it.
    pub async fn update_playlist(
        &self,
        result: &RenderResult,
    ) -> Result<Option<Commit>, CoreError> {
        result.validate()?;
        let updated = self
            .store
            .update_playlist(result.commit_id, &result.playlist_url, result.duration)
            .await?;

        if updated.is_some() {
            self.invalidations.fetch_add(1, Ordering::SeqCst);
            self.cache.delete(&commit_key(result.commit_id)).await;
        }
        Ok(updated)
    }

    pub async fn save_metadata(&self, input: &MetadataResult) -> Result<CommitMetadata, CoreError> {
        input.validate()?;
        let saved = self
            .store
            .upsert_metadata(input.commit_id, &input.metadata)
            .await?;
        // The next read repopulates from the store.
        self.cache
            .delete(&commit_metadata_key(input.commit_id))
            .await;
        Ok(saved)
    }

    pub async fn get_metadata(&self, commit_id: CommitId) -> Result<CommitMetadata, CoreError> {
        let key = commit_metadata_key(commit_id);
        if let Some(metadata) = get_json::<CommitMetadata>(self.cache.as_ref(), &key).await {
            return Ok(metadata);
        }

        let metadata = self
            .store
            .find_metadata(commit_id)
            .await?
            .ok_or_else(|| CoreError::not_found("CommitMetadata", commit_id))?;
        set_json(self.cache.as_ref(), &key, &metadata, self.cache_ttl).await;
        Ok(metadata)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use vidgit_cache::MemoryCache;
    use vidgit_core::repository::NewRepository;
    use vidgit_db::{MemoryStore, RepositoryStore};
    use vidgit_events::EventBus;

    use super::*;

    async fn service() -> (CommitService, Arc<MemoryCache>, Arc<EventBus>, DbId, DbId) {
        let store = Arc::new(MemoryStore::new());
        let bundle = store
            .create_repository(&NewRepository {
                name: "demo".into(),
                description: None,
                author_id: 1,
                file_name: "demo.mp4".into(),
            })
            .await
            .unwrap();
        let cache = Arc::new(MemoryCache::new());
        let bus = Arc::new(EventBus::default());
        let service = CommitService::new(store, cache.clone(), bus.clone())
            .with_publish_backoff(Backoff::new(0, Duration::ZERO));
        (service, cache, bus, bundle.video.id, bundle.branch.id)
    }

    fn new_commit(video_id: DbId, branch_id: DbId) -> NewCommit {
        NewCommit {
            video_id,
            branch_id,
            description: "trim intro".into(),
            change_set: vec![serde_json::json!({ "operation": "delete" })],
        }
    }

    #[tokio::test]
    async fn create_caches_and_announces() {
        let (service, cache, bus, video_id, branch_id) = service().await;
        let mut rx = bus.subscribe();

        let commit = service.create(new_commit(video_id, branch_id)).await.unwrap();
        assert!(cache.get(&commit_key(commit.commit_id)).await.is_some());

        let message = rx.recv().await.unwrap();
        assert_eq!(message.topic, topics::COMMIT_CREATED);
        assert_eq!(message.key.as_deref(), Some(video_id.to_string().as_str()));
        assert_eq!(message.decode::<Commit>().unwrap(), commit);
    }

    #[tokio::test]
    async fn get_falls_back_to_store_on_miss() {
        let (service, cache, _bus, video_id, branch_id) = service().await;
        let commit = service.create(new_commit(video_id, branch_id)).await.unwrap();

        cache.delete(&commit_key(commit.commit_id)).await;
        assert_eq!(service.get(commit.commit_id).await.unwrap(), commit);
        assert!(cache.get(&commit_key(commit.commit_id)).await.is_some());
    }

    #[tokio::test]
    async fn get_unknown_commit_is_not_found() {
        let (service, ..) = service().await;
        assert_matches!(
            service.get(uuid::Uuid::now_v7()).await,
            Err(CoreError::NotFound { entity: "Commit", .. })
        );
    }

    #[tokio::test]
    async fn metadata_save_invalidates_cached_copy() {
        let (service, cache, _bus, video_id, branch_id) = service().await;
        let commit = service.create(new_commit(video_id, branch_id)).await.unwrap();

        let first = MetadataResult {
            commit_id: commit.commit_id,
            metadata: serde_json::json!({ "fps": 24 }),
        };
        service.save_metadata(&first).await.unwrap();
        assert_eq!(service.get_metadata(commit.commit_id).await.unwrap().metadata["fps"], 24);

        let second = MetadataResult {
            commit_id: commit.commit_id,
            metadata: serde_json::json!({ "fps": 30 }),
        };
        service.save_metadata(&second).await.unwrap();
        assert!(cache.get(&commit_metadata_key(commit.commit_id)).await.is_none());
        assert_eq!(service.get_metadata(commit.commit_id).await.unwrap().metadata["fps"], 30);
    }

    /// Holds back fills of commits that have not been rendered yet.
    struct SlowFillCache {
        inner: MemoryCache,
        delay: Duration,
    }

    #[async_trait::async_trait]
    impl Cache for SlowFillCache {
        async fn get(&self, key: &str) -> Option<String> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) {
            if value.contains("\"playlist_url\":null") {
                tokio::time::sleep(self.delay).await;
            }
            self.inner.set(key, value, ttl).await;
        }

        async fn delete(&self, key: &str) {
            self.inner.delete(key).await;
        }
    }

    #[tokio::test]
    async fn read_racing_a_render_update_does_not_cache_the_old_row() {
        let store = Arc::new(MemoryStore::new());
        let bundle = store
            .create_repository(&NewRepository {
                name: "demo".into(),
                description: None,
                author_id: 1,
                file_name: "demo.mp4".into(),
            })
            .await
            .unwrap();
        let cache = Arc::new(SlowFillCache {
            inner: MemoryCache::new(),
            delay: Duration::from_millis(100),
        });
        let service = Arc::new(
            CommitService::new(store, cache.clone(), Arc::new(EventBus::default()))
                .with_publish_backoff(Backoff::new(0, Duration::ZERO)),
        );
        let commit_id = bundle.commit.commit_id;

        // Miss, read the unrendered row, then stall in the fill.
        let reader = tokio::spawn({
            let service = Arc::clone(&service);
            async move { service.get(commit_id).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let render = RenderResult {
            commit_id,
            playlist_url: "https://cdn/x.m3u8".into(),
            duration: 12.0,
        };
        service.update_playlist(&render).await.unwrap();

        let raced = reader.await.unwrap().unwrap();
        assert_eq!(raced.playlist_url, None);

        let fresh = service.get(commit_id).await.unwrap();
        assert_eq!(fresh.playlist_url.as_deref(), Some("https://cdn/x.m3u8"));
        assert_eq!(fresh.duration, Some(12.0));
    }

    #[tokio::test]
    async fn playlist_update_drops_cached_commit() {
        let (service, cache, _bus, video_id, branch_id) = service().await;
        let commit = service.create(new_commit(video_id, branch_id)).await.unwrap();
        assert!(cache.get(&commit_key(commit.commit_id)).await.is_some());

        let render = RenderResult {
            commit_id: commit.commit_id,
            playlist_url: "https://cdn/y.m3u8".into(),
            duration: 3.5,
        };
        service.update_playlist(&render).await.unwrap();
        assert!(cache.get(&commit_key(commit.commit_id)).await.is_none());
        assert_eq!(
            service.get(commit.commit_id).await.unwrap().playlist_url.as_deref(),
            Some("https://cdn/y.m3u8")
        );
    }

    #[tokio::test]
    async fn list_requires_known_video() {
        let (service, ..) = service().await;
        assert_matches!(
            service.list(999).await,
            Err(CoreError::NotFound { entity: "Video", .. })
        );
    }
}
