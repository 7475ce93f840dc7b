//! Authenticated fetching of media payloads
//!
//! A [`MediaFetcher`] performs exactly one attempt and classifies the outcome;
//! [`RetryPolicy`] wraps it with bounded, backed-off retries. Neither touches
//! the cache.

pub mod http;
pub mod retry;

use crate::error::Result;
use crate::key::ResourceKey;
use async_trait::async_trait;

pub use http::HttpFetcher;
pub use retry::RetryPolicy;

/// Raw payload returned by a successful fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedMedia {
    pub bytes: Vec<u8>,
    /// Content type reported by the server, if any
    pub content_type: Option<String>,
}

impl FetchedMedia {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// One authenticated fetch attempt for a resource
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch(&self, key: &ResourceKey) -> Result<FetchedMedia>;
}

/// Supplies the bearer credential for each request
///
/// Login, refresh and session persistence belong to the caller.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// The current token, or `None` when no session is active
    async fn token(&self) -> Option<String>;
}

/// Token provider backed by a fixed string
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

#[async_trait]
impl TokenProvider for StaticToken {
    async fn token(&self) -> Option<String> {
        if self.0.is_empty() {
            None
        } else {
            Some(self.0.clone())
        }
    }
}
