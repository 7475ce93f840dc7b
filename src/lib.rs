//! # Labeling Media (labeling-media)
//!
//! Authenticated media loading for the labeling workflow. Media items cannot be
//! fetched by plain URL: each request carries a bearer token, and a question may
//! reference many images, audio clips, videos or text files that should only be
//! loaded once they scroll near the viewport.
//!
//! ## Components
//!
//! - [`ResourceKey`]: (scope, path) identity of a media item
//! - [`fetch::HttpFetcher`]: one authenticated `POST /media/{scope}/serve` per attempt
//! - [`fetch::RetryPolicy`]: bounded, backed-off retries for transient failures
//! - [`LoadCoordinator`]: single-flight deduplication of concurrent requests
//! - [`cache::ResourceCache`]: TTL and capacity-bounded store owning every handle
//! - [`visibility::VisibilityTracker`]: one-shot "entered viewport" triggers
//! - [`PreloadBatcher`]: best-effort prefetch of a batch of keys
//!
//! ## Example
//!
//! ```no_run
//! use labeling_media::fetch::StaticToken;
//! use labeling_media::{MediaConfig, MediaPipeline, ResourceKey};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = MediaConfig::builder()
//!         .base_url("http://localhost:8000")
//!         .build();
//!     let pipeline = MediaPipeline::new(config, Arc::new(StaticToken("jwt".into())))?;
//!
//!     let key = ResourceKey::new("task-1", "taskData/images/01.jpg");
//!     let entry = pipeline.request(&key).await?;
//!     println!("loaded {} bytes", entry.size_bytes);
//!
//!     let report = pipeline
//!         .preload(["taskData/audio/01.wav", "taskData/video/01.mp4"], "task-1")
//!         .await;
//!     println!("preloaded {}/{}", report.loaded.len(), report.requested);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod fetch;
pub mod key;
pub mod pipeline;
pub mod preload;
pub mod visibility;

// Re-export main types for convenience
pub use cache::{CacheEntry, CacheStats, MediaHandle, ResourceCache};
pub use config::{Backoff, MediaConfig, MediaConfigBuilder};
pub use coordinator::{LoadCoordinator, LoadState};
pub use error::{ErrorKind, MediaError, Result};
pub use fetch::{FetchedMedia, HttpFetcher, MediaFetcher, RetryPolicy, StaticToken, TokenProvider};
pub use key::{mime_type_for_path, MediaKind, ResourceKey};
pub use pipeline::{LazySlot, MediaPipeline};
pub use preload::{PreloadBatcher, PreloadReport};
pub use visibility::{Rect, RootMargin, TriggerHandle, TriggerOptions, VisibilityTracker};
