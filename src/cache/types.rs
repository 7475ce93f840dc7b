//! Statistics types for the resource cache

use serde::{Deserialize, Serialize};
use std::fmt;

/// Statistics and metrics for cache monitoring
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache
    pub hits: u64,

    /// Lookups that found nothing usable
    pub misses: u64,

    /// Entries currently held
    pub entries: usize,

    /// Total payload size of held entries
    pub size_bytes: usize,

    /// Entries removed because they outlived the cache timeout
    pub evictions_ttl: u64,

    /// Entries removed to stay within `max_cache_size`
    pub evictions_capacity: u64,

    /// Entries removed by `clear` or `remove`
    pub clears: u64,

    /// Handles materialized from fetched payloads
    pub handles_created: u64,

    /// Handles released (each at most once)
    pub handles_released: u64,
}

impl CacheStats {
    /// Cache hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }

    pub fn total_evictions(&self) -> u64 {
        self.evictions_ttl + self.evictions_capacity
    }

    /// Handles created but not yet released
    pub fn live_handles(&self) -> u64 {
        self.handles_created.saturating_sub(self.handles_released)
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CacheStats {{ hits: {}, misses: {}, hit_rate: {:.2}%, entries: {}, size: {} bytes, evictions: {}, live_handles: {} }}",
            self.hits,
            self.misses,
            self.hit_rate(),
            self.entries,
            self.size_bytes,
            self.total_evictions(),
            self.live_handles()
        )
    }
}

/// Outcome of a cleanup pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub expired: usize,
    pub evicted: usize,
}

impl CleanupReport {
    pub fn removed(&self) -> usize {
        self.expired + self.evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_stats_hit_rate() {
        let stats = CacheStats {
            hits: 80,
            misses: 20,
            ..Default::default()
        };
        assert_eq!(stats.hit_rate(), 80.0);
    }

    #[test]
    fn test_cache_stats_zero_requests() {
        let stats = CacheStats::default();
        assert_eq!(stats.hit_rate(), 0.0);
        assert_eq!(stats.live_handles(), 0);
    }

    #[test]
    fn test_cache_stats_display() {
        let stats = CacheStats {
            hits: 100,
            misses: 50,
            entries: 3,
            size_bytes: 1024,
            evictions_ttl: 2,
            evictions_capacity: 1,
            clears: 0,
            handles_created: 6,
            handles_released: 3,
        };

        let display = format!("{}", stats);
        assert!(display.contains("hits: 100"));
        assert!(display.contains("evictions: 3"));
        assert!(display.contains("live_handles: 3"));
    }
}
