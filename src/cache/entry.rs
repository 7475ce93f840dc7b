//! Resource handles and cache entries

use crate::key::ResourceKey;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

/// Owned reference to loaded media content
///
/// Clones share the same underlying payload. The payload is reachable through
/// [`MediaHandle::bytes`] until the owning cache releases the handle; after
/// that every clone observes `None`. Release happens at most once no matter how
/// many removal paths race for it.
#[derive(Clone)]
pub struct MediaHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    id: Uuid,
    key: ResourceKey,
    content_type: String,
    size_bytes: usize,
    payload: Mutex<Option<Arc<[u8]>>>,
    released: AtomicBool,
}

impl MediaHandle {
    pub(crate) fn new(key: ResourceKey, content_type: String, payload: Vec<u8>) -> Self {
        let size_bytes = payload.len();
        Self {
            inner: Arc::new(HandleInner {
                id: Uuid::new_v4(),
                key,
                content_type,
                size_bytes,
                payload: Mutex::new(Some(Arc::from(payload))),
                released: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn key(&self) -> &ResourceKey {
        &self.inner.key
    }

    pub fn content_type(&self) -> &str {
        &self.inner.content_type
    }

    pub fn size_bytes(&self) -> usize {
        self.inner.size_bytes
    }

    /// The payload, or `None` once the handle has been released
    pub fn bytes(&self) -> Option<Arc<[u8]>> {
        if self.is_released() {
            return None;
        }
        self.inner
            .payload
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn is_released(&self) -> bool {
        self.inner.released.load(Ordering::Acquire)
    }

    /// Whether two handles refer to the same materialized payload
    pub fn ptr_eq(&self, other: &MediaHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Release the payload. Returns `true` only for the call that released it.
    pub(crate) fn release(&self) -> bool {
        if self.inner.released.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.inner
            .payload
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        true
    }
}

impl PartialEq for MediaHandle {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for MediaHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaHandle")
            .field("id", &self.inner.id)
            .field("key", &self.inner.key)
            .field("content_type", &self.inner.content_type)
            .field("size_bytes", &self.inner.size_bytes)
            .field("released", &self.is_released())
            .finish()
    }
}

/// A cached resource. Entries are immutable; the cache replaces or removes them.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: ResourceKey,
    pub handle: MediaHandle,
    pub size_bytes: usize,
    /// Monotonic creation time used for TTL and capacity ordering
    pub created_at: Instant,
    /// Wall-clock load time, for reporting
    pub loaded_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(key: ResourceKey, handle: MediaHandle) -> Self {
        let size_bytes = handle.size_bytes();
        Self {
            key,
            handle,
            size_bytes,
            created_at: Instant::now(),
            loaded_at: Utc::now(),
        }
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Whether the entry's age exceeds `ttl`
    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.age() > ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(path: &str, payload: &[u8]) -> MediaHandle {
        MediaHandle::new(
            ResourceKey::new("task-1", path),
            "image/png".to_string(),
            payload.to_vec(),
        )
    }

    #[test]
    fn test_handle_exposes_payload() {
        let h = handle("a.png", b"abc");
        assert_eq!(h.size_bytes(), 3);
        assert_eq!(h.content_type(), "image/png");
        assert_eq!(h.bytes().as_deref(), Some(&b"abc"[..]));
        assert!(!h.is_released());
    }

    #[test]
    fn test_release_happens_once() {
        let h = handle("a.png", b"abc");
        let clone = h.clone();

        assert!(h.release());
        assert!(!clone.release());
        assert!(!h.release());

        assert!(clone.is_released());
        assert!(clone.bytes().is_none());
    }

    #[test]
    fn test_handle_identity() {
        let a = handle("a.png", b"1");
        let b = handle("a.png", b"1");
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_ne!(a.id(), b.id());
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expiration() {
        let entry = CacheEntry::new(ResourceKey::new("t", "a.png"), handle("a.png", b"xy"));
        assert_eq!(entry.size_bytes, 2);
        assert!(!entry.is_expired(Duration::from_millis(100)));

        tokio::time::advance(Duration::from_millis(150)).await;
        assert!(entry.is_expired(Duration::from_millis(100)));
        assert!(entry.age() >= Duration::from_millis(150));
    }
}
