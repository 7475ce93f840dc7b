//! Wiring of cache, fetcher, coordinator, preloader and visibility tracker

use crate::cache::{start_auto_cleanup, CacheEntry, ResourceCache};
use crate::config::MediaConfig;
use crate::coordinator::{LoadCoordinator, LoadState};
use crate::error::{MediaError, Result};
use crate::fetch::{HttpFetcher, MediaFetcher, RetryPolicy, TokenProvider};
use crate::key::ResourceKey;
use crate::preload::{PreloadBatcher, PreloadReport};
use crate::visibility::{Rect, TriggerHandle, TriggerOptions, VisibilityTracker};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Media loading pipeline for one labeling session
///
/// Owns a single [`ResourceCache`]; dropping the pipeline (and every clone of
/// its coordinator) releases all cached handles.
pub struct MediaPipeline {
    config: MediaConfig,
    cache: Arc<ResourceCache>,
    coordinator: LoadCoordinator,
    preloader: PreloadBatcher,
    tracker: VisibilityTracker,
}

impl MediaPipeline {
    /// Build a pipeline that talks to the configured backend over HTTP
    pub fn new(config: MediaConfig, tokens: Arc<dyn TokenProvider>) -> Result<Self> {
        let fetcher = Arc::new(HttpFetcher::new(config.base_url.clone(), tokens));
        Self::with_fetcher(config, fetcher)
    }

    /// Build a pipeline around any fetcher
    pub fn with_fetcher(config: MediaConfig, fetcher: Arc<dyn MediaFetcher>) -> Result<Self> {
        config.validate()?;
        info!("Creating media pipeline for {}", config.base_url);

        let cache = Arc::new(ResourceCache::from_config(&config));
        let coordinator = LoadCoordinator::new(
            Arc::clone(&cache),
            fetcher,
            RetryPolicy::from_config(&config),
        );
        let preloader = PreloadBatcher::new(coordinator.clone(), config.preload_concurrency);

        Ok(Self {
            config,
            cache,
            coordinator,
            preloader,
            tracker: VisibilityTracker::new(),
        })
    }

    pub fn config(&self) -> &MediaConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<ResourceCache> {
        &self.cache
    }

    pub fn coordinator(&self) -> &LoadCoordinator {
        &self.coordinator
    }

    pub fn tracker(&self) -> &VisibilityTracker {
        &self.tracker
    }

    pub async fn request(&self, key: &ResourceKey) -> Result<CacheEntry> {
        self.coordinator.request(key).await
    }

    pub async fn retry(&self, key: &ResourceKey) -> Result<CacheEntry> {
        self.coordinator.retry(key).await
    }

    pub async fn status(&self, key: &ResourceKey) -> LoadState {
        self.coordinator.status(key).await
    }

    pub async fn preload<I, S>(&self, paths: I, scope_id: &str) -> PreloadReport
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.preloader.preload(paths, scope_id).await
    }

    /// Load `key` once its placeholder at `bounds` becomes visible
    ///
    /// Must be called from within a tokio runtime; the load is spawned there
    /// when the trigger fires.
    pub fn lazy_load(&self, key: ResourceKey, bounds: Rect) -> Result<LazySlot> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            MediaError::Config(format!("lazy loading requires a tokio runtime: {}", e))
        })?;

        let (tx, rx) = oneshot::channel();
        let coordinator = self.coordinator.clone();
        let task_key = key.clone();

        let trigger = self.tracker.attach(
            bounds,
            TriggerOptions::from_config(&self.config),
            move || {
                runtime.spawn(async move {
                    let result = coordinator.request(&task_key).await;
                    if tx.send(result).is_err() {
                        debug!("Discarding result for {}: slot was dropped", task_key);
                    }
                });
            },
        );

        Ok(LazySlot {
            key,
            trigger,
            result: rx,
        })
    }

    /// Start periodic TTL/capacity sweeps of the cache
    pub fn start_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(start_auto_cleanup(Arc::clone(&self.cache), interval))
    }

    /// Forget everything cached or failed for one scope
    pub async fn clear_scope(&self, scope_id: &str) -> usize {
        self.coordinator.clear_scope(scope_id).await
    }
}

/// A placeholder waiting to become visible
///
/// Dropping the slot detaches its trigger; a load already in flight still
/// completes into the cache but its result is discarded here.
pub struct LazySlot {
    key: ResourceKey,
    trigger: TriggerHandle,
    result: oneshot::Receiver<Result<CacheEntry>>,
}

impl LazySlot {
    pub fn key(&self) -> &ResourceKey {
        &self.key
    }

    pub fn should_load(&self) -> bool {
        self.trigger.should_load()
    }

    pub fn trigger(&self) -> &TriggerHandle {
        &self.trigger
    }

    /// Non-blocking check for a finished load
    pub fn try_result(&mut self) -> Option<Result<CacheEntry>> {
        self.result.try_recv().ok()
    }

    /// Wait until the placeholder is visible and its load has finished
    pub async fn wait(self) -> Result<CacheEntry> {
        let LazySlot {
            key,
            trigger,
            result,
        } = self;

        let outcome = result.await;
        drop(trigger);
        outcome.unwrap_or_else(|_| Err(MediaError::Unknown(format!("load for {} was abandoned", key))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchedMedia;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Echo {
        calls: AtomicU32,
        completed: AtomicU32,
        latency: Duration,
    }

    impl Echo {
        fn new(latency: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU32::new(0),
                completed: AtomicU32::new(0),
                latency,
            })
        }
    }

    #[async_trait]
    impl MediaFetcher for Echo {
        async fn fetch(&self, key: &ResourceKey) -> Result<FetchedMedia> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            self.completed.fetch_add(1, Ordering::SeqCst);
            Ok(FetchedMedia::new(key.path().as_bytes().to_vec()))
        }
    }

    fn pipeline_with_latency(latency: Duration) -> (MediaPipeline, Arc<Echo>) {
        let fetcher = Echo::new(latency);
        let pipeline = MediaPipeline::with_fetcher(MediaConfig::default(), fetcher.clone()).unwrap();
        (pipeline, fetcher)
    }

    fn pipeline() -> (MediaPipeline, Arc<Echo>) {
        pipeline_with_latency(Duration::ZERO)
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = MediaConfig::builder().max_cache_size(0).build();
        assert!(MediaPipeline::with_fetcher(config, Echo::new(Duration::ZERO)).is_err());
    }

    #[tokio::test]
    async fn test_lazy_load_waits_for_visibility() {
        let (pipeline, fetcher) = pipeline();
        pipeline.tracker().set_viewport(Rect::new(0.0, 0.0, 800.0, 600.0));

        let key = ResourceKey::new("task-1", "below.jpg");
        let slot = pipeline
            .lazy_load(key.clone(), Rect::new(0.0, 2000.0, 100.0, 100.0))
            .unwrap();

        pipeline.tracker().tick();
        tokio::task::yield_now().await;
        assert!(!slot.should_load());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);

        pipeline.tracker().set_viewport(Rect::new(0.0, 1800.0, 800.0, 600.0));
        pipeline.tracker().tick();
        assert!(slot.should_load());

        let entry = slot.wait().await.unwrap();
        assert_eq!(entry.handle.bytes().as_deref(), Some(&b"below.jpg"[..]));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(pipeline.status(&key).await, LoadState::Cached);
    }

    #[tokio::test]
    async fn test_dropped_slot_never_loads() {
        let (pipeline, fetcher) = pipeline();
        pipeline.tracker().set_viewport(Rect::new(0.0, 0.0, 800.0, 600.0));

        let slot = pipeline
            .lazy_load(ResourceKey::new("task-1", "gone.jpg"), Rect::new(0.0, 5000.0, 10.0, 10.0))
            .unwrap();
        drop(slot);

        pipeline.tracker().set_viewport(Rect::new(0.0, 4900.0, 800.0, 600.0));
        assert_eq!(pipeline.tracker().tick(), 0);
        tokio::task::yield_now().await;
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slot_dropped_mid_load_still_caches() {
        let (pipeline, fetcher) = pipeline_with_latency(Duration::from_millis(500));
        pipeline.tracker().set_viewport(Rect::new(0.0, 0.0, 800.0, 600.0));

        let key = ResourceKey::new("task-1", "slow.mp4");
        let slot = pipeline
            .lazy_load(key.clone(), Rect::new(0.0, 100.0, 200.0, 200.0))
            .unwrap();

        assert_eq!(pipeline.tracker().tick(), 1);
        assert!(slot.should_load());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(pipeline.status(&key).await, LoadState::Loading);

        drop(slot);
        tokio::time::sleep(Duration::from_millis(1000)).await;

        assert_eq!(fetcher.completed.load(Ordering::SeqCst), 1);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(pipeline.status(&key).await, LoadState::Cached);
        assert!(pipeline.cache().contains(&key).await);
    }
}
