//! LRU policy: recency-ordered eviction with expiration.
//!
//! ## Architecture
//!
//! ```text
//!   ┌───────────────────────────────────────────────────────────┐
//!   │                      LruCore<K, V>                        │
//!   │                                                           │
//!   │   index: FxHashMap<K, NodeId>                             │
//!   │   ┌─────────┬────────┐                                    │
//!   │   │   Key   │ NodeId │──┐                                 │
//!   │   └─────────┴────────┘  │                                 │
//!   │                         ▼                                 │
//!   │   order: OrderList<LruEntry>                              │
//!   │   front ──► [C] ◄──► [A] ◄──► [B] ◄── back                │
//!   │             MRU                LRU (eviction victim)      │
//!   └───────────────────────────────────────────────────────────┘
//! ```
//!
//! A hit or an overwrite moves the entry to the front; inserting a new key at
//! capacity pops the back first. A read that observes an expired entry
//! removes it (firing the evicted callback) and reports a miss.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;

use super::{is_expired, PolicyConfig};
use crate::ds::{NodeId, OrderList};

struct LruEntry<K, V> {
    key: K,
    value: V,
    expires_at: Option<Instant>,
}

/// Recency-list cache core: front = most recently used.
pub(crate) struct LruCore<K, V> {
    config: PolicyConfig<K, V>,
    index: FxHashMap<K, NodeId>,
    order: OrderList<LruEntry<K, V>>,
}

impl<K, V> LruCore<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    pub(crate) fn new(config: PolicyConfig<K, V>) -> Self {
        let capacity = config.capacity;
        Self {
            config,
            index: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            order: OrderList::with_capacity(capacity),
        }
    }

    pub(crate) fn set(&mut self, key: K, value: V) {
        self.set_inner(key, value, None);
    }

    pub(crate) fn set_with_expire(&mut self, key: K, value: V, ttl: Duration) {
        self.set_inner(key, value, Some(ttl));
    }

    fn set_inner(&mut self, key: K, value: V, ttl: Option<Duration>) {
        let now = self.config.clock.now();
        let id = match self.index.get(&key) {
            Some(&id) => {
                self.order.move_to_front(id);
                let entry = self.order.get_mut(id).expect("indexed entry missing");
                entry.value = value;
                id
            }
            None => {
                if self.order.len() >= self.config.capacity {
                    self.evict(1);
                }
                let id = self.order.push_front(LruEntry {
                    key: key.clone(),
                    value,
                    expires_at: None,
                });
                self.index.insert(key.clone(), id);
                id
            }
        };

        let entry = self.order.get_mut(id).expect("indexed entry missing");
        if let Some(default_ttl) = self.config.expiration {
            entry.expires_at = Some(now + default_ttl);
        }
        if let Some(ttl) = ttl {
            entry.expires_at = Some(now + ttl);
        }

        let entry = self.order.get(id).expect("indexed entry missing");
        self.config.notify_added(&key, &entry.value);
    }

    /// Pops up to `count` entries off the back of the recency list.
    fn evict(&mut self, count: usize) {
        for _ in 0..count {
            match self.order.pop_back() {
                Some(entry) => {
                    self.index.remove(&entry.key);
                    self.config.notify_evicted(&entry.key, &entry.value);
                }
                None => return,
            }
        }
    }

    pub(crate) fn get(&mut self, key: &K) -> Option<V> {
        let now = self.config.clock.now();
        let id = *self.index.get(key)?;
        let expired = {
            let entry = self.order.get(id).expect("indexed entry missing");
            is_expired(entry.expires_at, now)
        };
        if expired {
            self.remove_node(id);
            return None;
        }
        self.order.move_to_front(id);
        self.order.get(id).map(|entry| entry.value.clone())
    }

    fn remove_node(&mut self, id: NodeId) {
        if let Some(entry) = self.order.remove(id) {
            self.index.remove(&entry.key);
            self.config.notify_evicted(&entry.key, &entry.value);
        }
    }

    pub(crate) fn get_all(&self, check_expired: bool) -> HashMap<K, V> {
        let now = self.config.clock.now();
        let mut snapshot = HashMap::with_capacity(self.index.len());
        for (key, &id) in &self.index {
            if let Some(entry) = self.order.get(id) {
                if !check_expired || !is_expired(entry.expires_at, now) {
                    snapshot.insert(key.clone(), entry.value.clone());
                }
            }
        }
        snapshot
    }

    pub(crate) fn keys(&self, check_expired: bool) -> Vec<K> {
        let now = self.config.clock.now();
        self.index
            .iter()
            .filter(|(_, &id)| {
                self.order
                    .get(id)
                    .is_some_and(|entry| !check_expired || !is_expired(entry.expires_at, now))
            })
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub(crate) fn len(&self, check_expired: bool) -> usize {
        if !check_expired {
            return self.order.len();
        }
        let now = self.config.clock.now();
        self.order
            .iter()
            .filter(|entry| !is_expired(entry.expires_at, now))
            .count()
    }

    pub(crate) fn has(&self, key: &K) -> bool {
        let now = self.config.clock.now();
        self.index.get(key).is_some_and(|&id| {
            self.order
                .get(id)
                .is_some_and(|entry| !is_expired(entry.expires_at, now))
        })
    }

    pub(crate) fn remove(&mut self, key: &K) -> bool {
        match self.index.get(key) {
            Some(&id) => {
                self.remove_node(id);
                true
            }
            None => false,
        }
    }

    #[cfg(any(test, debug_assertions))]
    pub(crate) fn debug_validate_invariants(&self) {
        assert_eq!(self.index.len(), self.order.len());
        for (key, &id) in &self.index {
            let entry = self.order.get(id).expect("indexed entry missing");
            assert!(&entry.key == key, "index points at wrong entry");
        }
        self.order.debug_validate_invariants();
    }

    #[cfg(test)]
    fn recency_order(&self) -> Vec<K> {
        self.order.iter().map(|entry| entry.key.clone()).collect()
    }
}
