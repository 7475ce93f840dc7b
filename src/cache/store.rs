//! Resource cache with TTL expiry and capacity-bounded eviction

use crate::cache::{
    entry::{CacheEntry, MediaHandle},
    types::{CacheStats, CleanupReport},
};
use crate::config::MediaConfig;
use crate::fetch::FetchedMedia;
use crate::key::{mime_type_for_path, ResourceKey};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Key to entry store that owns every handle it materializes
///
/// - All mutation is serialized through one `RwLock`
/// - Every removal path (TTL, capacity, replace, clear, drop) releases the
///   removed handle exactly once
/// - Capacity eviction removes the oldest `created_at` first
pub struct ResourceCache {
    ttl: Duration,
    max_entries: usize,
    store: RwLock<CacheStore>,
    counters: Arc<HandleCounters>,
}

#[derive(Default)]
struct HandleCounters {
    created: AtomicU64,
    released: AtomicU64,
}

struct CacheStore {
    entries: HashMap<ResourceKey, CacheEntry>,
    /// Insertion sequence per key, breaks `created_at` ties
    sequence: HashMap<ResourceKey, u64>,
    next_seq: u64,
    stats: CacheStats,
    counters: Arc<HandleCounters>,
}

impl CacheStore {
    fn release(&mut self, entry: CacheEntry) {
        if entry.handle.release() {
            self.counters.released.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn insert(&mut self, entry: CacheEntry) -> Option<CacheEntry> {
        self.next_seq += 1;
        self.sequence.insert(entry.key.clone(), self.next_seq);
        self.entries.insert(entry.key.clone(), entry)
    }

    fn remove(&mut self, key: &ResourceKey) -> bool {
        self.sequence.remove(key);
        match self.entries.remove(key) {
            Some(entry) => {
                self.release(entry);
                true
            }
            None => false,
        }
    }

    fn remove_expired(&mut self, ttl: Duration) -> usize {
        let expired: Vec<ResourceKey> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(ttl))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            debug!("Evicting expired entry: {}", key);
            self.remove(key);
        }
        self.stats.evictions_ttl += expired.len() as u64;
        expired.len()
    }

    /// Evict oldest entries until `len + reserve <= max_entries`
    fn enforce_capacity(&mut self, max_entries: usize, reserve: usize) -> usize {
        let target = max_entries.saturating_sub(reserve);
        if self.entries.len() <= target {
            return 0;
        }

        let mut by_age: Vec<(tokio::time::Instant, u64, ResourceKey)> = self
            .entries
            .iter()
            .map(|(key, entry)| {
                let seq = self.sequence.get(key).copied().unwrap_or_default();
                (entry.created_at, seq, key.clone())
            })
            .collect();
        by_age.sort();

        let excess = self.entries.len() - target;
        for (_, _, key) in by_age.into_iter().take(excess) {
            debug!("Evicting entry due to max_cache_size limit: {}", key);
            self.remove(&key);
        }
        self.stats.evictions_capacity += excess as u64;
        excess
    }
}

impl Drop for CacheStore {
    fn drop(&mut self) {
        self.sequence.clear();
        let remaining: Vec<CacheEntry> = self.entries.drain().map(|(_, e)| e).collect();
        if !remaining.is_empty() {
            debug!("Releasing {} cached handles on teardown", remaining.len());
        }
        for entry in remaining {
            self.release(entry);
        }
    }
}

impl ResourceCache {
    /// Create a cache with the given entry lifetime and capacity
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        info!(
            "Initializing resource cache (ttl: {:?}, max_entries: {})",
            ttl, max_entries
        );

        let counters = Arc::new(HandleCounters::default());
        let store = CacheStore {
            entries: HashMap::new(),
            sequence: HashMap::new(),
            next_seq: 0,
            stats: CacheStats::default(),
            counters: Arc::clone(&counters),
        };

        Self {
            ttl,
            max_entries: max_entries.max(1),
            store: RwLock::new(store),
            counters,
        }
    }

    pub fn from_config(config: &MediaConfig) -> Self {
        Self::new(config.cache_timeout, config.max_cache_size)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Turn a fetched payload into a handle owned by this cache
    pub fn materialize(&self, key: &ResourceKey, media: FetchedMedia) -> MediaHandle {
        let content_type = media
            .content_type
            .unwrap_or_else(|| mime_type_for_path(key.path()).to_string());
        self.counters.created.fetch_add(1, Ordering::Relaxed);
        MediaHandle::new(key.clone(), content_type, media.bytes)
    }

    /// Look up a live entry, evicting it if it has outlived the cache timeout
    pub async fn get(&self, key: &ResourceKey) -> Option<CacheEntry> {
        let mut store = self.store.write().await;

        let expired = match store.entries.get(key) {
            Some(entry) if !entry.is_expired(self.ttl) => {
                let entry = entry.clone();
                store.stats.hits += 1;
                debug!("Cache hit: {}", key);
                return Some(entry);
            }
            Some(_) => true,
            None => false,
        };

        store.stats.misses += 1;
        if expired {
            debug!("Cache entry expired: {}", key);
            store.remove(key);
            store.stats.evictions_ttl += 1;
        } else {
            debug!("Cache miss: {}", key);
        }
        None
    }

    /// Whether a live entry exists, without touching statistics
    pub async fn contains(&self, key: &ResourceKey) -> bool {
        let store = self.store.read().await;
        store
            .entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired(self.ttl))
    }

    /// Insert a handle, running cleanup first so the bound holds afterwards
    ///
    /// Replacing an existing key releases the previous handle.
    pub async fn put(&self, key: ResourceKey, handle: MediaHandle) -> CacheEntry {
        let entry = CacheEntry::new(key.clone(), handle);
        let mut store = self.store.write().await;

        store.remove_expired(self.ttl);
        let reserve = usize::from(!store.entries.contains_key(&key));
        store.enforce_capacity(self.max_entries, reserve);

        if let Some(previous) = store.insert(entry.clone()) {
            if !previous.handle.ptr_eq(&entry.handle) {
                debug!("Replacing cache entry: {}", key);
                store.release(previous);
            }
        } else {
            debug!("Inserting cache entry: {} ({} bytes)", key, entry.size_bytes);
        }

        entry
    }

    /// Remove expired entries, then trim to `max_entries` oldest-first
    pub async fn cleanup(&self) -> CleanupReport {
        let mut store = self.store.write().await;
        let expired = store.remove_expired(self.ttl);
        let evicted = store.enforce_capacity(self.max_entries, 0);

        if expired + evicted > 0 {
            debug!(
                "Cleanup removed {} expired and {} excess entries",
                expired, evicted
            );
        }

        CleanupReport { expired, evicted }
    }

    /// Remove one entry, releasing its handle
    pub async fn remove(&self, key: &ResourceKey) -> bool {
        let mut store = self.store.write().await;
        let removed = store.remove(key);
        if removed {
            store.stats.clears += 1;
            debug!("Removed cache entry: {}", key);
        }
        removed
    }

    /// Remove all entries, or only those whose key is in `scope_id`
    pub async fn clear(&self, scope_id: Option<&str>) -> usize {
        let mut store = self.store.write().await;

        let keys: Vec<ResourceKey> = store
            .entries
            .keys()
            .filter(|key| scope_id.map_or(true, |scope| key.in_scope(scope)))
            .cloned()
            .collect();

        for key in &keys {
            store.remove(key);
        }
        store.stats.clears += keys.len() as u64;

        match scope_id {
            Some(scope) => info!("Cleared {} entries for scope {}", keys.len(), scope),
            None => info!("Cleared {} entries from cache", keys.len()),
        }
        keys.len()
    }

    pub async fn keys(&self) -> Vec<ResourceKey> {
        let store = self.store.read().await;
        store.entries.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        let store = self.store.read().await;
        store.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        let store = self.store.read().await;
        store.entries.is_empty()
    }

    /// Snapshot of cache statistics
    pub async fn stats(&self) -> CacheStats {
        let store = self.store.read().await;
        let mut stats = store.stats.clone();
        stats.entries = store.entries.len();
        stats.size_bytes = store.entries.values().map(|e| e.size_bytes).sum();
        stats.handles_created = self.counters.created.load(Ordering::Relaxed);
        stats.handles_released = self.counters.released.load(Ordering::Relaxed);
        stats
    }
}

/// Background task that periodically sweeps expired and excess entries
pub async fn start_auto_cleanup(cache: Arc<ResourceCache>, interval: Duration) {
    info!(
        "Starting automatic cache cleanup task (interval: {:?})",
        interval
    );

    if interval.is_zero() {
        warn!("Auto cleanup interval is zero; sweeper not started");
        return;
    }

    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let report = cache.cleanup().await;
        if report.removed() > 0 {
            debug!("Auto cleanup removed {} entries", report.removed());
        }
    }
}
