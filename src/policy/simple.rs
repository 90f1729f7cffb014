//! SIMPLE policy: unordered map with expiration-driven reclamation.
//!
//! No auxiliary ordering is kept. The capacity is a soft ceiling: when the
//! map is full, eviction scans in arbitrary order and removes up to `n`
//! entries that are either expired or carry no expiration at all, so a map
//! full of entries with live future deadlines can exceed the ceiling until
//! those deadlines pass. Capacity 0 disables the ceiling entirely.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;

use super::{is_expired, PolicyConfig};

struct SimpleEntry<V> {
    value: V,
    expires_at: Option<Instant>,
}

/// Unordered expiration-driven cache core.
pub(crate) struct SimpleCore<K, V> {
    config: PolicyConfig<K, V>,
    map: FxHashMap<K, SimpleEntry<V>>,
}

impl<K, V> SimpleCore<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    pub(crate) fn new(config: PolicyConfig<K, V>) -> Self {
        let map = if config.capacity > 0 {
            FxHashMap::with_capacity_and_hasher(config.capacity, Default::default())
        } else {
            FxHashMap::default()
        };
        Self { config, map }
    }

    pub(crate) fn set(&mut self, key: K, value: V) {
        self.set_inner(key, value, None);
    }

    pub(crate) fn set_with_expire(&mut self, key: K, value: V, ttl: Duration) {
        self.set_inner(key, value, Some(ttl));
    }

    fn set_inner(&mut self, key: K, value: V, ttl: Option<Duration>) {
        let now = self.config.clock.now();
        if let Some(entry) = self.map.get_mut(&key) {
            entry.value = value;
        } else {
            if self.config.capacity > 0 && self.map.len() >= self.config.capacity {
                self.evict(1);
            }
            self.map.insert(
                key.clone(),
                SimpleEntry {
                    value,
                    expires_at: None,
                },
            );
        }

        let entry = self
            .map
            .get_mut(&key)
            .expect("entry present after upsert");
        if let Some(default_ttl) = self.config.expiration {
            entry.expires_at = Some(now + default_ttl);
        }
        if let Some(ttl) = ttl {
            entry.expires_at = Some(now + ttl);
        }

        let entry = self.map.get(&key).expect("entry present after upsert");
        self.config.notify_added(&key, &entry.value);
    }

    /// Removes up to `count` entries that are expired or have no expiration.
    ///
    /// The scan order is the map's arbitrary iteration order, and entries
    /// with no expiration count toward the quota, matching the policy's
    /// soft-ceiling contract.
    fn evict(&mut self, count: usize) {
        let now = self.config.clock.now();
        let victims: Vec<K> = self
            .map
            .iter()
            .filter(|(_, entry)| entry.expires_at.is_none() || is_expired(entry.expires_at, now))
            .take(count)
            .map(|(key, _)| key.clone())
            .collect();
        for key in victims {
            self.remove(&key);
        }
    }

    pub(crate) fn get(&mut self, key: &K) -> Option<V> {
        let now = self.config.clock.now();
        match self.map.get(key) {
            Some(entry) if !is_expired(entry.expires_at, now) => Some(entry.value.clone()),
            Some(_) => {
                self.remove(key);
                None
            }
            None => None,
        }
    }

    pub(crate) fn get_all(&self, check_expired: bool) -> HashMap<K, V> {
        let now = self.config.clock.now();
        let mut snapshot = HashMap::with_capacity(self.map.len());
        for (key, entry) in &self.map {
            if !check_expired || !is_expired(entry.expires_at, now) {
                snapshot.insert(key.clone(), entry.value.clone());
            }
        }
        snapshot
    }

    pub(crate) fn keys(&self, check_expired: bool) -> Vec<K> {
        let now = self.config.clock.now();
        self.map
            .iter()
            .filter(|(_, entry)| !check_expired || !is_expired(entry.expires_at, now))
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub(crate) fn len(&self, check_expired: bool) -> usize {
        if !check_expired {
            return self.map.len();
        }
        let now = self.config.clock.now();
        self.map
            .values()
            .filter(|entry| !is_expired(entry.expires_at, now))
            .count()
    }

    pub(crate) fn has(&self, key: &K) -> bool {
        let now = self.config.clock.now();
        self.map
            .get(key)
            .is_some_and(|entry| !is_expired(entry.expires_at, now))
    }

    pub(crate) fn remove(&mut self, key: &K) -> bool {
        match self.map.remove(key) {
            Some(entry) => {
                self.config.notify_evicted(key, &entry.value);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;
    use crate::policy::test_support::{config, config_with_clock};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn set_get_roundtrip() {
        let mut core = SimpleCore::new(config(4));
        core.set("a", 1);
        assert_eq!(core.get(&"a"), Some(1));
        assert_eq!(core.get(&"missing"), None);
    }

    #[test]
    fn overwrite_keeps_last_value() {
        let mut core = SimpleCore::new(config(4));
        core.set("a", 1);
        core.set("a", 2);
        assert_eq!(core.get(&"a"), Some(2));
        assert_eq!(core.len(false), 1);
    }

    #[test]
    fn eviction_reclaims_unexpiring_entries() {
        let mut core = SimpleCore::new(config(2));
        core.set("a", 1);
        core.set("b", 2);
        core.set("c", 3);
        // One of the no-expiration entries made way for "c".
        assert_eq!(core.len(false), 2);
        assert!(core.has(&"c"));
    }

    #[test]
    fn future_expirations_are_not_evicted() {
        let clock = FakeClock::new();
        let mut cfg = config_with_clock(2, Arc::new(clock.clone()));
        cfg.expiration = Some(Duration::from_secs(60));
        let mut core = SimpleCore::new(cfg);

        core.set("a", 1);
        core.set("b", 2);
        core.set("c", 3);
        // All entries have live deadlines, so the ceiling is exceeded.
        assert_eq!(core.len(false), 3);
    }

    #[test]
    fn zero_capacity_is_unbounded() {
        let mut core = SimpleCore::new(config(0));
        for i in 0..100 {
            core.set(i, i);
        }
        assert_eq!(core.len(false), 100);
    }

    #[test]
    fn expired_entry_removed_on_read() {
        let clock = FakeClock::new();
        let mut core = SimpleCore::new(config_with_clock(4, Arc::new(clock.clone())));
        core.set_with_expire("a", 1, Duration::from_millis(10));
        assert_eq!(core.get(&"a"), Some(1));

        clock.advance(Duration::from_millis(11));
        assert_eq!(core.get(&"a"), None);
        assert_eq!(core.len(false), 0);
    }

    #[test]
    fn expiry_boundary_is_strict() {
        let clock = FakeClock::new();
        let mut core = SimpleCore::new(config_with_clock(4, Arc::new(clock.clone())));
        core.set_with_expire("a", 1, Duration::from_millis(10));
        // Exactly at the deadline the entry is still live.
        clock.advance(Duration::from_millis(10));
        assert_eq!(core.get(&"a"), Some(1));
        clock.advance(Duration::from_nanos(1));
        assert_eq!(core.get(&"a"), None);
    }

    #[test]
    fn callbacks_fire_on_add_and_evict() {
        let added = Arc::new(AtomicUsize::new(0));
        let evicted = Arc::new(AtomicUsize::new(0));
        let mut cfg = config(4);
        cfg.on_added = Some({
            let added = Arc::clone(&added);
            Arc::new(move |_: &&str, _: &i32| {
                added.fetch_add(1, Ordering::SeqCst);
            })
        });
        cfg.on_evicted = Some({
            let evicted = Arc::clone(&evicted);
            Arc::new(move |_: &&str, _: &i32| {
                evicted.fetch_add(1, Ordering::SeqCst);
            })
        });

        let mut core = SimpleCore::new(cfg);
        core.set("a", 1);
        core.set("a", 2);
        assert!(core.remove(&"a"));
        assert!(!core.remove(&"a"));
        assert_eq!(added.load(Ordering::SeqCst), 2);
        assert_eq!(evicted.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn len_and_keys_respect_check_expired() {
        let clock = FakeClock::new();
        let mut core = SimpleCore::new(config_with_clock(4, Arc::new(clock.clone())));
        core.set("keep", 1);
        core.set_with_expire("drop", 2, Duration::from_millis(5));
        clock.advance(Duration::from_millis(6));

        assert_eq!(core.len(false), 2);
        assert_eq!(core.len(true), 1);
        assert_eq!(core.keys(true), vec!["keep"]);
        assert_eq!(core.get_all(false).len(), 2);
        assert_eq!(core.get_all(true).len(), 1);
        assert!(!core.has(&"drop"));
    }
}
