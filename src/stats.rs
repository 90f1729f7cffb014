//! Hit/miss counters for the cache façade.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic hit/miss statistics.
///
/// Counters are lock-free and incremented exactly once per top-level `get`
/// or `get_if_present`; internal gets performed on behalf of a loader never
/// count.
///
/// # Example
///
/// ```
/// use polycache::builder::CacheBuilder;
/// use polycache::cache::Cache;
///
/// let cache: Cache<u32, u32> = CacheBuilder::new(8).lru().build();
/// cache.set(1, 10);
/// let _ = cache.get(&1); // hit
/// let _ = cache.get(&2); // miss
/// assert_eq!(cache.hit_count(), 1);
/// assert_eq!(cache.miss_count(), 1);
/// assert_eq!(cache.lookup_count(), 2);
/// assert!((cache.hit_rate() - 0.5).abs() < f64::EPSILON);
/// ```
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheStats {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of lookups that found a live entry.
    #[inline]
    pub fn hit_count(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Number of lookups that found nothing (or an expired entry).
    #[inline]
    pub fn miss_count(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Total lookups: `hit_count + miss_count`.
    #[inline]
    pub fn lookup_count(&self) -> u64 {
        self.hit_count() + self.miss_count()
    }

    /// Fraction of lookups that hit; `0.0` when nothing has been looked up.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hit_count();
        let total = hits + self.miss_count();
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        let stats = CacheStats::new();
        assert_eq!(stats.hit_count(), 0);
        assert_eq!(stats.miss_count(), 0);
        assert_eq!(stats.lookup_count(), 0);
        assert_eq!(stats.hit_rate(), 0.0);
    }

    #[test]
    fn lookup_count_is_sum() {
        let stats = CacheStats::new();
        stats.record_hit();
        stats.record_hit();
        stats.record_miss();
        assert_eq!(stats.hit_count(), 2);
        assert_eq!(stats.miss_count(), 1);
        assert_eq!(stats.lookup_count(), 3);
    }

    #[test]
    fn hit_rate_reflects_ratio() {
        let stats = CacheStats::new();
        stats.record_hit();
        stats.record_miss();
        stats.record_miss();
        stats.record_miss();
        assert!((stats.hit_rate() - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn counters_are_shareable_across_threads() {
        use std::sync::Arc;
        let stats = Arc::new(CacheStats::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let stats = Arc::clone(&stats);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        stats.record_hit();
                        stats.record_miss();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(stats.hit_count(), 4000);
        assert_eq!(stats.miss_count(), 4000);
    }
}
