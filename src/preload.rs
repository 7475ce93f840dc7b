//! Best-effort batch prefetching

use crate::coordinator::LoadCoordinator;
use crate::error::MediaError;
use crate::key::ResourceKey;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{info, warn};

/// Outcome of a preload batch; failures are collected, never raised
#[derive(Debug, Clone, Default, Serialize)]
pub struct PreloadReport {
    pub requested: usize,
    pub loaded: Vec<ResourceKey>,
    #[serde(serialize_with = "serialize_failures")]
    pub failed: Vec<(ResourceKey, MediaError)>,
}

impl PreloadReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

fn serialize_failures<S>(
    failed: &[(ResourceKey, MediaError)],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.collect_seq(
        failed
            .iter()
            .map(|(key, error)| (key, error.to_string())),
    )
}

/// Prefetches a batch of keys through the coordinator
#[derive(Clone)]
pub struct PreloadBatcher {
    coordinator: LoadCoordinator,
    concurrency: usize,
}

impl PreloadBatcher {
    pub fn new(coordinator: LoadCoordinator, concurrency: usize) -> Self {
        Self {
            coordinator,
            concurrency: concurrency.max(1),
        }
    }

    /// Preload `paths` within `scope_id`
    pub async fn preload<I, S>(&self, paths: I, scope_id: &str) -> PreloadReport
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys = paths
            .into_iter()
            .map(|path| ResourceKey::new(scope_id, path))
            .collect();
        self.preload_keys(keys).await
    }

    /// Preload an explicit list of keys
    pub async fn preload_keys(&self, keys: Vec<ResourceKey>) -> PreloadReport {
        let requested = keys.len();

        let outcomes: Vec<_> = stream::iter(keys)
            .map(|key| {
                let coordinator = self.coordinator.clone();
                async move {
                    let result = coordinator.request(&key).await;
                    (key, result)
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut report = PreloadReport {
            requested,
            ..Default::default()
        };

        for (key, result) in outcomes {
            match result {
                Ok(_) => report.loaded.push(key),
                Err(e) => {
                    warn!("Preload failed for {}: {}", key, e);
                    report.failed.push((key, e));
                }
            }
        }

        info!(
            "Preloaded {}/{} resources ({} failed)",
            report.loaded.len(),
            report.requested,
            report.failed.len()
        );
        report
    }
}
