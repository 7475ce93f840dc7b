//! Single-flight load coordination
//!
//! `LoadCoordinator::request` answers from the cache when it can, otherwise
//! joins or starts exactly one load per key. The load runs on its own task so
//! it completes even if every waiter goes away; waiters share its result.

use crate::cache::{CacheEntry, ResourceCache};
use crate::error::{MediaError, Result};
use crate::fetch::{MediaFetcher, RetryPolicy};
use crate::key::ResourceKey;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

type SharedLoad = Shared<BoxFuture<'static, Result<CacheEntry>>>;

/// Load state of a single resource key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoadState {
    Idle,
    Loading,
    Cached,
    Error,
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadState::Idle => write!(f, "idle"),
            LoadState::Loading => write!(f, "loading"),
            LoadState::Cached => write!(f, "cached"),
            LoadState::Error => write!(f, "error"),
        }
    }
}

struct PendingRequest {
    future: SharedLoad,
    waiters: Arc<AtomicUsize>,
}

/// Counts a caller as waiting until its `request` future finishes or is dropped
struct WaiterGuard(Arc<AtomicUsize>);

impl WaiterGuard {
    fn attach(waiters: &Arc<AtomicUsize>) -> Self {
        waiters.fetch_add(1, Ordering::AcqRel);
        Self(Arc::clone(waiters))
    }
}

impl Drop for WaiterGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Per-key bookkeeping for in-flight loads and recorded failures
///
/// Error records stay until the key is retried or its scope is cleared.
#[derive(Default)]
struct LoadBook {
    /// At most one entry per key
    pending: HashMap<ResourceKey, PendingRequest>,
    errors: HashMap<ResourceKey, MediaError>,
}

struct Inner {
    cache: Arc<ResourceCache>,
    fetcher: Arc<dyn MediaFetcher>,
    retry: RetryPolicy,
    book: Mutex<LoadBook>,
    loads_started: AtomicU64,
}

impl Inner {
    async fn load(self: Arc<Self>, key: ResourceKey) -> Result<CacheEntry> {
        let result = match self.retry.fetch(self.fetcher.as_ref(), &key).await {
            Ok(media) => {
                let handle = self.cache.materialize(&key, media);
                Ok(self.cache.put(key.clone(), handle).await)
            }
            Err(e) => Err(e),
        };

        let mut book = self.book.lock().await;
        let waiters = book
            .pending
            .remove(&key)
            .map_or(0, |p| p.waiters.load(Ordering::Acquire));

        match &result {
            Ok(entry) => {
                book.errors.remove(&key);
                info!(
                    "Loaded {} ({} bytes, {} waiters)",
                    key, entry.size_bytes, waiters
                );
            }
            Err(e) => {
                book.errors.insert(key.clone(), e.clone());
                warn!("Failed to load {} ({} waiters): {}", key, waiters, e);
            }
        }

        result
    }

    /// Settle bookkeeping for a load task that panicked or was cancelled
    async fn abandon(&self, key: &ResourceKey, error: MediaError) -> Result<CacheEntry> {
        let mut book = self.book.lock().await;
        book.pending.remove(key);
        book.errors.insert(key.clone(), error.clone());
        warn!("Load task for {} did not finish: {}", key, error);
        Err(error)
    }
}

/// Deduplicates concurrent requests and tracks per-key load state
#[derive(Clone)]
pub struct LoadCoordinator {
    inner: Arc<Inner>,
}

impl LoadCoordinator {
    pub fn new(cache: Arc<ResourceCache>, fetcher: Arc<dyn MediaFetcher>, retry: RetryPolicy) -> Self {
        Self {
            inner: Arc::new(Inner {
                cache,
                fetcher,
                retry,
                book: Mutex::new(LoadBook::default()),
                loads_started: AtomicU64::new(0),
            }),
        }
    }

    pub fn cache(&self) -> &Arc<ResourceCache> {
        &self.inner.cache
    }

    /// Resolve `key` from the cache, an in-flight load, or a new load
    ///
    /// A key in the error state fails with its recorded error until
    /// [`LoadCoordinator::retry`] is called.
    pub async fn request(&self, key: &ResourceKey) -> Result<CacheEntry> {
        let (load, _waiter) = {
            let mut book = self.inner.book.lock().await;

            if let Some(entry) = self.inner.cache.get(key).await {
                return Ok(entry);
            }

            let pending = if let Some(pending) = book.pending.get(key) {
                debug!(
                    "Joining in-flight load for {} ({} waiters)",
                    key,
                    pending.waiters.load(Ordering::Acquire) + 1
                );
                pending
            } else if let Some(error) = book.errors.get(key) {
                debug!("{} is in error state: {}", key, error);
                return Err(error.clone());
            } else {
                self.start_load(&mut book, key.clone())
            };

            let future = pending.future.clone();
            let waiter = WaiterGuard::attach(&pending.waiters);
            (future, waiter)
        };

        load.await
    }

    /// Clear a recorded failure and load the key again
    pub async fn retry(&self, key: &ResourceKey) -> Result<CacheEntry> {
        {
            let mut book = self.inner.book.lock().await;
            if book.errors.remove(key).is_some() {
                info!("Retrying {}", key);
            }
        }
        self.request(key).await
    }

    fn start_load<'a>(&self, book: &'a mut LoadBook, key: ResourceKey) -> &'a PendingRequest {
        self.inner.loads_started.fetch_add(1, Ordering::Relaxed);
        debug!("Starting load for {}", key);

        // The supervisor outlives a panicking load and moves the key to Error
        let inner = Arc::clone(&self.inner);
        let task_key = key.clone();
        let supervisor = tokio::spawn(async move {
            match tokio::spawn(Arc::clone(&inner).load(task_key.clone())).await {
                Ok(result) => result,
                Err(e) => {
                    let error = MediaError::Unknown(format!("load task failed: {}", e));
                    inner.abandon(&task_key, error).await
                }
            }
        });

        let future = async move {
            supervisor
                .await
                .unwrap_or_else(|e| Err(MediaError::Unknown(format!("load task failed: {}", e))))
        }
        .boxed()
        .shared();

        book.pending.entry(key).or_insert(PendingRequest {
            future,
            waiters: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub async fn status(&self, key: &ResourceKey) -> LoadState {
        let book = self.inner.book.lock().await;
        if book.pending.contains_key(key) {
            LoadState::Loading
        } else if book.errors.contains_key(key) {
            LoadState::Error
        } else if self.inner.cache.contains(key).await {
            LoadState::Cached
        } else {
            LoadState::Idle
        }
    }

    pub async fn last_error(&self, key: &ResourceKey) -> Option<MediaError> {
        let book = self.inner.book.lock().await;
        book.errors.get(key).cloned()
    }

    /// Number of callers still awaiting the in-flight load for `key`
    ///
    /// A caller whose `request` future is dropped stops counting.
    pub async fn waiters(&self, key: &ResourceKey) -> usize {
        let book = self.inner.book.lock().await;
        book.pending
            .get(key)
            .map_or(0, |p| p.waiters.load(Ordering::Acquire))
    }

    pub async fn loading_keys(&self) -> Vec<ResourceKey> {
        let book = self.inner.book.lock().await;
        book.pending.keys().cloned().collect()
    }

    pub async fn error_keys(&self) -> Vec<ResourceKey> {
        let book = self.inner.book.lock().await;
        book.errors.keys().cloned().collect()
    }

    /// Loads started since construction (cache hits and joins excluded)
    pub fn fetch_count(&self) -> u64 {
        self.inner.loads_started.load(Ordering::Relaxed)
    }

    /// Drop cached entries and error records for one scope
    pub async fn clear_scope(&self, scope_id: &str) -> usize {
        let mut book = self.inner.book.lock().await;
        book.errors.retain(|key, _| !key.in_scope(scope_id));
        self.inner.cache.clear(Some(scope_id)).await
    }

    /// Drop every cached entry and error record
    pub async fn clear_all(&self) -> usize {
        let mut book = self.inner.book.lock().await;
        book.errors.clear();
        self.inner.cache.clear(None).await
    }
}
