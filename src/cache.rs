//! Unified cache façade.
//!
//! [`Cache`] wraps one policy core behind a readers-writer lock and owns the
//! pieces shared by every policy: the hit/miss counters, the optional loader,
//! and the single-flight registry. It is a cheap clonable handle; clones
//! share the same underlying cache.
//!
//! ## Lock discipline
//!
//! | Operation                         | Lock  |
//! |-----------------------------------|-------|
//! | `set`, `set_with_expire`, `remove`| write |
//! | `get`, `get_if_present`           | write (may reorder and sweep)   |
//! | `has`, `keys`, `len`, `get_all`   | read  |
//!
//! The write lock is always released before the single-flight coordinator is
//! consulted; the coordinator re-enters the policy through an internal
//! on-load get that bypasses the statistics counters.
//!
//! ## Loader path
//!
//! ```text
//!   get(k) ──► lookup (write lock, counted) ──► hit? return
//!                 │ miss
//!                 ▼
//!   single-flight execute(k, wait = true)
//!       ├─ re-check cache (on-load get, uncounted)
//!       ├─ join an in-flight load, or
//!       └─ run loader ──► set(k, v [, ttl]) ──► return v
//!
//!   get_if_present(k): same, but wait = false — a cold miss kicks the load
//!   onto a background thread and returns KeyNotFound immediately.
//! ```

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use crate::error::{BoxedError, CacheError};
use crate::flight::FlightGroup;
use crate::policy::Core;
use crate::stats::CacheStats;

/// Loader with an optional per-load TTL, shared across threads.
pub(crate) type LoaderFn<K, V> =
    Arc<dyn Fn(&K) -> Result<(V, Option<Duration>), BoxedError> + Send + Sync>;

pub(crate) struct Shared<K, V> {
    core: RwLock<Core<K, V>>,
    stats: CacheStats,
    flights: FlightGroup<K, V>,
    loader: Option<LoaderFn<K, V>>,
}

/// Thread-safe cache handle over one of the four eviction policies.
///
/// Built by [`CacheBuilder`](crate::builder::CacheBuilder). Cloning is cheap
/// and yields a handle to the same cache.
///
/// # Example
///
/// ```
/// use polycache::builder::CacheBuilder;
/// use polycache::cache::Cache;
///
/// let cache: Cache<String, u32> = CacheBuilder::new(100).arc().build();
/// cache.set("answer".to_string(), 42);
/// assert_eq!(cache.get(&"answer".to_string()).unwrap(), 42);
/// assert!(cache.get(&"missing".to_string()).is_err());
/// ```
pub struct Cache<K, V> {
    shared: Arc<Shared<K, V>>,
}

impl<K, V> Clone for Cache<K, V> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<K, V> Cache<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub(crate) fn from_parts(core: Core<K, V>, loader: Option<LoaderFn<K, V>>) -> Self {
        Self {
            shared: Arc::new(Shared {
                core: RwLock::new(core),
                stats: CacheStats::new(),
                flights: FlightGroup::new(),
                loader,
            }),
        }
    }

    /// Inserts or overwrites `key`, evicting per policy first when a new key
    /// arrives at capacity. Applies the default expiration, if configured,
    /// and fires the added callback.
    pub fn set(&self, key: K, value: V) {
        self.shared.core.write().set(key, value);
    }

    /// As [`set`](Cache::set), then overrides the entry's expiration to
    /// `clock.now() + ttl`.
    pub fn set_with_expire(&self, key: K, value: V, ttl: Duration) {
        self.shared.core.write().set_with_expire(key, value, ttl);
    }

    /// Returns the live value for `key`, consulting the loader on a miss.
    ///
    /// With a loader configured, a cold miss runs it (deduplicated with any
    /// concurrent misses on the same key) and blocks until it resolves.
    /// Without one, a miss is [`CacheError::KeyNotFound`].
    ///
    /// # Example
    ///
    /// ```
    /// use polycache::builder::CacheBuilder;
    /// use polycache::cache::Cache;
    ///
    /// let cache: Cache<u32, String> = CacheBuilder::new(10)
    ///     .lru()
    ///     .loader(|key: &u32| Ok(format!("value-{}", key)))
    ///     .build();
    ///
    /// assert_eq!(cache.get(&7).unwrap(), "value-7"); // loaded
    /// assert_eq!(cache.get(&7).unwrap(), "value-7"); // cached
    /// assert_eq!(cache.hit_count(), 1);
    /// assert_eq!(cache.miss_count(), 1);
    /// ```
    pub fn get(&self, key: &K) -> Result<V, CacheError> {
        if let Some(value) = self.lookup(key, false) {
            return Ok(value);
        }
        self.load_through(key, true)
    }

    /// As [`get`](Cache::get), but never blocks on the loader: a cold miss
    /// kicks the load onto a background thread and returns
    /// [`CacheError::KeyNotFound`] immediately.
    pub fn get_if_present(&self, key: &K) -> Result<V, CacheError> {
        if let Some(value) = self.lookup(key, false) {
            return Ok(value);
        }
        self.load_through(key, false)
    }

    /// Snapshot of all entries; `check_expired` excludes currently-expired
    /// ones. Does not touch recency/frequency state or statistics.
    pub fn get_all(&self, check_expired: bool) -> HashMap<K, V> {
        self.shared.core.read().get_all(check_expired)
    }

    /// Snapshot of all keys; `check_expired` excludes currently-expired
    /// entries.
    pub fn keys(&self, check_expired: bool) -> Vec<K> {
        self.shared.core.read().keys(check_expired)
    }

    /// Number of entries held; with `check_expired`, only those not yet
    /// expired.
    pub fn len(&self, check_expired: bool) -> usize {
        self.shared.core.read().len(check_expired)
    }

    /// Returns `true` if `key` is present and not expired. Does not affect
    /// eviction state or statistics.
    pub fn has(&self, key: &K) -> bool {
        self.shared.core.read().has(key)
    }

    /// Removes `key`; returns `true` iff it was present. Fires the evicted
    /// callback.
    pub fn remove(&self, key: &K) -> bool {
        self.shared.core.write().remove(key)
    }

    /// Lookups that found a live entry.
    pub fn hit_count(&self) -> u64 {
        self.shared.stats.hit_count()
    }

    /// Lookups that found nothing.
    pub fn miss_count(&self) -> u64 {
        self.shared.stats.miss_count()
    }

    /// Total counted lookups.
    pub fn lookup_count(&self) -> u64 {
        self.shared.stats.lookup_count()
    }

    /// `hit_count / lookup_count`, or `0.0` with no lookups.
    pub fn hit_rate(&self) -> f64 {
        self.shared.stats.hit_rate()
    }

    /// Policy get under the write lock. Counts a hit or a miss unless the
    /// lookup happens on behalf of a loader (`on_load`).
    fn lookup(&self, key: &K, on_load: bool) -> Option<V> {
        let value = self.shared.core.write().get(key);
        if !on_load {
            match value {
                Some(_) => self.shared.stats.record_hit(),
                None => self.shared.stats.record_miss(),
            }
        }
        value
    }

    fn load_through(&self, key: &K, wait: bool) -> Result<V, CacheError> {
        let loader = match &self.shared.loader {
            Some(loader) => Arc::clone(loader),
            None => return Err(CacheError::KeyNotFound),
        };

        let check = {
            let shared = Arc::clone(&self.shared);
            let key = key.clone();
            move || {
                let cache = Cache { shared };
                cache.lookup(&key, true)
            }
        };

        let run = {
            let shared = Arc::clone(&self.shared);
            let key = key.clone();
            move || match loader(&key) {
                Ok((value, ttl)) => {
                    let mut core = shared.core.write();
                    match ttl {
                        Some(ttl) => core.set_with_expire(key.clone(), value.clone(), ttl),
                        None => core.set(key.clone(), value.clone()),
                    }
                    Ok(value)
                }
                Err(err) => Err(CacheError::from_loader(err)),
            }
        };

        self.shared
            .flights
            .execute(key, check, run, wait)
            .map(|(value, _called)| value)
    }

    /// Validates the active policy's internal invariants; panics on
    /// violation. Debug/test builds only.
    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        self.shared.core.read().debug_validate_invariants();
    }
}

impl<K, V> fmt::Debug for Cache<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("len", &self.len(false))
            .field("hit_count", &self.hit_count())
            .field("miss_count", &self.miss_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::CacheBuilder;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn wait_mode_loads_and_caches() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache: Cache<u32, u32> = CacheBuilder::new(8)
            .lru()
            .loader({
                let calls = Arc::clone(&calls);
                move |key: &u32| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(key * 10)
                }
            })
            .build();

        assert_eq!(cache.get(&3).unwrap(), 30);
        assert_eq!(cache.get(&3).unwrap(), 30);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.miss_count(), 1);
        assert_eq!(cache.hit_count(), 1);
    }

    #[test]
    fn loader_error_passes_through_and_caches_nothing() {
        let cache: Cache<u32, u32> = CacheBuilder::new(8)
            .lru()
            .loader(|_: &u32| Err("backend down".into()))
            .build();

        match cache.get(&1) {
            Err(CacheError::Loader(err)) => assert_eq!(err.to_string(), "backend down"),
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(cache.len(false), 0);
    }

    #[test]
    fn loader_panic_is_surfaced() {
        let cache: Cache<u32, u32> = CacheBuilder::new(8)
            .lru()
            .loader(|_: &u32| panic!("loader blew up"))
            .build();

        match cache.get(&1) {
            Err(CacheError::LoaderPanic(msg)) => assert!(msg.contains("loader blew up")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn no_loader_miss_is_key_not_found() {
        let cache: Cache<u32, u32> = CacheBuilder::new(8).lfu().build();
        assert!(matches!(cache.get(&1), Err(CacheError::KeyNotFound)));
        assert!(matches!(
            cache.get_if_present(&1),
            Err(CacheError::KeyNotFound)
        ));
        assert_eq!(cache.miss_count(), 2);
    }

    #[test]
    fn deferred_load_returns_not_found_then_value() {
        let cache: Cache<u32, u32> = CacheBuilder::new(8)
            .lru()
            .loader(|key: &u32| {
                thread::sleep(Duration::from_millis(20));
                Ok(key + 1)
            })
            .build();

        assert!(matches!(
            cache.get_if_present(&1),
            Err(CacheError::KeyNotFound)
        ));

        // The background load lands eventually; poll via uncounted `has`.
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while !cache.has(&1) {
            assert!(std::time::Instant::now() < deadline, "load never landed");
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(cache.get(&1).unwrap(), 2);
        assert_eq!(cache.miss_count(), 1);
        assert_eq!(cache.hit_count(), 1);
    }

    #[test]
    fn loader_ttl_overrides_default() {
        use crate::clock::FakeClock;
        let clock = FakeClock::new();
        let cache: Cache<u32, u32> = CacheBuilder::new(8)
            .lru()
            .clock(clock.clone())
            .loader_with_expire(|key: &u32| Ok((key * 2, Some(Duration::from_millis(10)))))
            .build();

        assert_eq!(cache.get(&4).unwrap(), 8);
        clock.advance(Duration::from_millis(11));
        assert!(!cache.has(&4));
    }

    #[test]
    fn clones_share_state() {
        let cache: Cache<u32, u32> = CacheBuilder::new(8).simple().build();
        let other = cache.clone();
        cache.set(1, 1);
        assert_eq!(other.get(&1).unwrap(), 1);
        assert_eq!(other.hit_count(), 1);
    }
}
