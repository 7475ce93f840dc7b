//! # Resource Cache
//!
//! Key to entry store for loaded media, with:
//!
//! - **TTL expiry**: entries older than the cache timeout are never returned and
//!   are evicted lazily on access or by a sweep
//! - **Capacity bound**: after any insert the cache holds at most
//!   `max_cache_size` entries, evicting the oldest first
//! - **Handle ownership**: every [`MediaHandle`] is created by the cache and
//!   released exactly once when its entry leaves, including on teardown
//!
//! ## Example
//!
//! ```rust
//! use labeling_media::cache::ResourceCache;
//! use labeling_media::fetch::FetchedMedia;
//! use labeling_media::ResourceKey;
//! use std::time::Duration;
//!
//! # async fn example() {
//! let cache = ResourceCache::new(Duration::from_secs(300), 50);
//! let key = ResourceKey::new("task-1", "taskData/images/01.jpg");
//!
//! let handle = cache.materialize(&key, FetchedMedia::new(vec![0xff, 0xd8]));
//! cache.put(key.clone(), handle).await;
//!
//! if let Some(entry) = cache.get(&key).await {
//!     println!("{} bytes of {}", entry.size_bytes, entry.handle.content_type());
//! }
//! # }
//! ```

pub mod entry;
pub mod store;
pub mod types;

pub use entry::{CacheEntry, MediaHandle};
pub use store::{start_auto_cleanup, ResourceCache};
pub use types::{CacheStats, CleanupReport};
