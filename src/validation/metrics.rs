//! Validation performance accounting.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

/// Point-in-time view of validation performance.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationMetrics {
    pub total_validations: u64,
    pub failed_validations: u64,
    pub average_duration_micros: f64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    /// Hits as a fraction of lookups, `0.0` before the first lookup.
    pub cache_hit_rate: f64,
    pub cache_size: usize,
}

/// Lock-free counters updated on every validation call.
#[derive(Debug, Default)]
pub(crate) struct ValidationRecorder {
    total: AtomicU64,
    failed: AtomicU64,
    total_micros: AtomicU64,
}

impl ValidationRecorder {
    pub fn record(&self, elapsed: Duration, failed: bool) {
        self.total.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.total_micros.fetch_add(micros, Ordering::Relaxed);
    }

    pub fn snapshot(&self, cache: CacheStats) -> ValidationMetrics {
        let total = self.total.load(Ordering::Relaxed);
        let lookups = cache.hits + cache.misses;
        ValidationMetrics {
            total_validations: total,
            failed_validations: self.failed.load(Ordering::Relaxed),
            average_duration_micros: if total == 0 {
                0.0
            } else {
                self.total_micros.load(Ordering::Relaxed) as f64 / total as f64
            },
            cache_hits: cache.hits,
            cache_misses: cache.misses,
            cache_hit_rate: if lookups == 0 {
                0.0
            } else {
                cache.hits as f64 / lookups as f64
            },
            cache_size: cache.size,
        }
    }
}

/// Compiled-schema cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
    pub capacity: usize,
}
