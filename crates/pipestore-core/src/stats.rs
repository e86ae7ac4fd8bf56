//! Lock-free counters describing store activity.

use std::sync::atomic::{AtomicU64, Ordering};

/// Running counters shared by the read path and the mutation workers.
#[derive(Debug, Default)]
pub struct StoreStats {
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    rows_updated: AtomicU64,
    rewrites: AtomicU64,
}

/// Point-in-time copy of [`StoreStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub rows_updated: u64,
    pub rewrites: u64,
}

impl StoreStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_update(&self) {
        self.rows_updated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rewrite(&self) {
        self.rewrites.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            rows_updated: self.rows_updated.load(Ordering::Relaxed),
            rewrites: self.rewrites.load(Ordering::Relaxed),
        }
    }
}

impl StatsSnapshot {
    /// Fraction of row reads served from the cache (0.0 when nothing was read).
    pub fn hit_ratio(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            return 0.0;
        }
        self.cache_hits as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let stats = StoreStats::new();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());

        stats.record_hit();
        stats.record_hit();
        stats.record_miss();
        stats.record_update();
        stats.record_rewrite();

        let snap = stats.snapshot();
        assert_eq!(snap.cache_hits, 2);
        assert_eq!(snap.cache_misses, 1);
        assert_eq!(snap.rows_updated, 1);
        assert_eq!(snap.rewrites, 1);
    }

    #[test]
    fn test_hit_ratio() {
        let snap = StatsSnapshot { cache_hits: 3, cache_misses: 1, ..Default::default() };
        assert!((snap.hit_ratio() - 0.75).abs() < f64::EPSILON);
        assert_eq!(StatsSnapshot::default().hit_ratio(), 0.0);
    }
}
