//! ARC policy: adaptive replacement with ghost lists.
//!
//! Implements the ARC algorithm of Megiddo & Modha ("ARC: A Self-Tuning, Low
//! Overhead Replacement Cache", FAST 2003), which balances recency against
//! frequency by maintaining four lists and a self-tuning target parameter.
//!
//! ## Architecture
//!
//! ```text
//!   ┌────────────────────────────────────────────────────────────────────┐
//!   │                           ArcCore<K, V>                            │
//!   │                                                                    │
//!   │   items: FxHashMap<K, ArcEntry<V>>   (values for T1 ∪ T2 only)     │
//!   │                                                                    │
//!   │   T1 (seen once, recency)          T2 (seen twice+, frequency)     │
//!   │   ┌───────────────────────┐        ┌───────────────────────┐       │
//!   │   │ MRU ──────────► LRU   │        │ MRU ──────────► LRU   │       │
//!   │   └───────────┬───────────┘        └───────────┬───────────┘       │
//!   │               │ evict                          │ evict             │
//!   │               ▼                                ▼                   │
//!   │   B1 (ghosts of T1)                B2 (ghosts of T2)               │
//!   │   ┌───────────────────────┐        ┌───────────────────────┐       │
//!   │   │ keys only, no values  │        │ keys only, no values  │       │
//!   │   └───────────────────────┘        └───────────────────────┘       │
//!   │                                                                    │
//!   │   p ∈ [0, capacity]: target size of T1                             │
//!   │   • hit in B1 → p grows  (lean toward recency)                     │
//!   │   • hit in B2 → p shrinks (lean toward frequency)                  │
//!   └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Invariants
//!
//! - The four lists are pairwise key-disjoint.
//! - `|T1| + |T2| ≤ capacity` (resident entries).
//! - `|T1| + |B1| ≤ capacity`.
//! - `|T1| + |T2| + |B1| + |B2| ≤ 2 · capacity`.
//! - The value map's key set equals T1 ∪ T2.
//! - `p` is written only through `set_part`, which no-ops unless the
//!   resident set is full, and never leaves `[0, capacity]`.
//!
//! A read hit in T1 promotes the key to T2; a read hit in T2 refreshes its
//! recency. A read that observes an expired resident deletes the value and
//! remembers the key in the matching ghost list. Writes adapt `p` on ghost
//! hits (integer division of the opposing ghost lengths, floored at 1) and
//! make room via `replace`, which picks the victim list by comparing `|T1|`
//! against `p`.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;

use super::{is_expired, PolicyConfig};
use crate::ds::KeyList;

struct ArcEntry<V> {
    value: V,
    expires_at: Option<Instant>,
}

/// Adaptive replacement cache core.
pub(crate) struct ArcCore<K, V> {
    config: PolicyConfig<K, V>,
    items: FxHashMap<K, ArcEntry<V>>,
    /// Target size of T1; leans the balance toward recency when large.
    part: usize,
    t1: KeyList<K>,
    t2: KeyList<K>,
    b1: KeyList<K>,
    b2: KeyList<K>,
}

impl<K, V> ArcCore<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    pub(crate) fn new(config: PolicyConfig<K, V>) -> Self {
        let capacity = config.capacity;
        Self {
            config,
            items: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            part: 0,
            t1: KeyList::new(),
            t2: KeyList::new(),
            b1: KeyList::new(),
            b2: KeyList::new(),
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

        match self.items.get_mut(&key) {
            Some(entry) => entry.value = value,
            None => {
                self.items.insert(
                    key.clone(),
                    ArcEntry {
                        value,
                        expires_at: None,
                    },
                );
            }
        }
        {
            let entry = self.items.get_mut(&key).expect("entry present after upsert");
            if let Some(default_ttl) = self.config.expiration {
                entry.expires_at = Some(now + default_ttl);
            }
            if let Some(ttl) = ttl {
                entry.expires_at = Some(now + ttl);
            }
        }

        let in_t1 = self.t1.contains(&key);
        let in_t2 = self.t2.contains(&key);
        if in_t1 || in_t2 {
            // Resident overwrite: the value is already refreshed above, and
            // an overwrite is not an access, so list order stays put.
            debug_assert!(!(in_t1 && in_t2), "key resident in both T1 and T2");
            self.notify_added(&key);
            return;
        }

        let capacity = self.config.capacity;

        if self.b1.contains(&key) {
            // Ghost hit in B1: the recency side deserved more room.
            let bump = (self.b2.len() / self.b1.len()).max(1);
            self.set_part((self.part + bump).min(capacity));
            self.replace(&key);
            self.b1.remove(&key);
            self.t2.push_front(key.clone());
            self.notify_added(&key);
            return;
        }

        if self.b2.contains(&key) {
            // Ghost hit in B2: the frequency side deserved more room.
            let shrink = (self.b1.len() / self.b2.len()).max(1);
            self.set_part(self.part.saturating_sub(shrink));
            self.replace(&key);
            self.b2.remove(&key);
            self.t2.push_front(key.clone());
            self.notify_added(&key);
            return;
        }

        // New to all four lists.
        if self.resident_full() && self.t1.len() + self.b1.len() == capacity {
            if self.t1.len() < capacity {
                self.b1.pop_back();
                self.replace(&key);
            } else if let Some(victim) = self.t1.pop_back() {
                // L1 is entirely resident; the T1 tail leaves without a ghost.
                self.drop_resident(&victim);
            }
        } else {
            let total = self.t1.len() + self.t2.len() + self.b1.len() + self.b2.len();
            if total >= capacity {
                if total == 2 * capacity {
                    if !self.b2.is_empty() {
                        self.b2.pop_back();
                    } else {
                        self.b1.pop_back();
                    }
                }
                self.replace(&key);
            }
        }

        self.push_t1_front(key.clone());
        self.notify_added(&key);
    }

    /// Prepends to T1, first trimming B1 if the L1 bound would be exceeded.
    ///
    /// Canonical ARC keeps `|T1| + |B1| ≤ capacity` by construction, but
    /// expiration-driven ghosting can leave L1 at the bound while the
    /// resident set is not full, so the oldest B1 ghost is dropped to make
    /// room.
    fn push_t1_front(&mut self, key: K) {
        if self.t1.len() + self.b1.len() >= self.config.capacity {
            self.b1.pop_back();
        }
        self.t1.push_front(key);
    }

    /// Prepends a ghost to B1 under the same L1 bound as `push_t1_front`.
    fn ghost_to_b1(&mut self, key: K) {
        if self.t1.len() + self.b1.len() >= self.config.capacity {
            self.b1.pop_back();
        }
        self.b1.push_front(key);
    }

    pub(crate) fn get(&mut self, key: &K) -> Option<V> {
        let now = self.config.clock.now();

        if self.t1.contains(key) {
            self.t1.remove(key);
            let expired = self
                .items
                .get(key)
                .map_or(true, |entry| is_expired(entry.expires_at, now));
            if !expired {
                // Second touch: promote to the frequency side.
                self.t2.push_front(key.clone());
                return self.items.get(key).map(|entry| entry.value.clone());
            }
            if let Some(entry) = self.items.remove(key) {
                self.ghost_to_b1(key.clone());
                self.config.notify_evicted(key, &entry.value);
            }
            return None;
        }

        if self.t2.contains(key) {
            let expired = self
                .items
                .get(key)
                .map_or(true, |entry| is_expired(entry.expires_at, now));
            if !expired {
                self.t2.move_to_front(key);
                return self.items.get(key).map(|entry| entry.value.clone());
            }
            self.t2.remove(key);
            if let Some(entry) = self.items.remove(key) {
                self.b2.push_front(key.clone());
                self.config.notify_evicted(key, &entry.value);
            }
            return None;
        }

        None
    }

    /// Evicts one resident entry; only applies when the resident set is full.
    ///
    /// Chooses T1 when it exceeds its target (or exactly meets it while the
    /// incoming key is a B2 ghost), otherwise T2, with a T1 fallback when T2
    /// is empty. The victim's key moves to the matching ghost list.
    fn replace(&mut self, incoming: &K) {
        if !self.resident_full() {
            return;
        }
        let from_t1 = !self.t1.is_empty()
            && ((self.b2.contains(incoming) && self.t1.len() == self.part)
                || self.t1.len() > self.part);

        let victim = if from_t1 {
            let victim = self.t1.pop_back();
            if let Some(key) = victim.clone() {
                self.ghost_to_b1(key);
            }
            victim
        } else if !self.t2.is_empty() {
            let victim = self.t2.pop_back();
            if let Some(key) = &victim {
                self.b2.push_front(key.clone());
            }
            victim
        } else {
            let victim = self.t1.pop_back();
            if let Some(key) = victim.clone() {
                self.ghost_to_b1(key);
            }
            victim
        };

        if let Some(key) = victim {
            self.drop_resident(&key);
        }
    }

    /// `p` moves only while the resident set is full; adaptation signals
    /// observed at other times are ignored.
    fn set_part(&mut self, p: usize) {
        if self.resident_full() {
            self.part = p;
        }
    }

    fn resident_full(&self) -> bool {
        self.t1.len() + self.t2.len() == self.config.capacity
    }

    /// Deletes a key's backing value and fires the evicted callback.
    fn drop_resident(&mut self, key: &K) {
        if let Some(entry) = self.items.remove(key) {
            self.config.notify_evicted(key, &entry.value);
        }
    }

    fn notify_added(&self, key: &K) {
        if let Some(entry) = self.items.get(key) {
            self.config.notify_added(key, &entry.value);
        }
    }

    pub(crate) fn get_all(&self, check_expired: bool) -> HashMap<K, V> {
        let now = self.config.clock.now();
        let mut snapshot = HashMap::with_capacity(self.items.len());
        for (key, entry) in &self.items {
            if !check_expired || !is_expired(entry.expires_at, now) {
                snapshot.insert(key.clone(), entry.value.clone());
            }
        }
        snapshot
    }

    pub(crate) fn keys(&self, check_expired: bool) -> Vec<K> {
        let now = self.config.clock.now();
        self.items
            .iter()
            .filter(|(_, entry)| !check_expired || !is_expired(entry.expires_at, now))
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub(crate) fn len(&self, check_expired: bool) -> usize {
        if !check_expired {
            return self.items.len();
        }
        let now = self.config.clock.now();
        self.items
            .values()
            .filter(|entry| !is_expired(entry.expires_at, now))
            .count()
    }

    pub(crate) fn has(&self, key: &K) -> bool {
        let now = self.config.clock.now();
        self.items
            .get(key)
            .is_some_and(|entry| !is_expired(entry.expires_at, now))
    }

    /// Explicit removal deletes the key outright, with no ghost entry: a
    /// caller-invalidated key is not an eviction signal, and ghosting here
    /// would let B1 outgrow the `|T1| + |B1| ≤ capacity` bound.
    pub(crate) fn remove(&mut self, key: &K) -> bool {
        if self.t1.remove(key) || self.t2.remove(key) {
            self.drop_resident(key);
            return true;
        }
        false
    }

    #[cfg(test)]
    fn part(&self) -> usize {
        self.part
    }

    #[cfg(test)]
    fn list_lens(&self) -> (usize, usize, usize, usize) {
        (self.t1.len(), self.t2.len(), self.b1.len(), self.b2.len())
    }

    #[cfg(test)]
    fn in_t2(&self, key: &K) -> bool {
        self.t2.contains(key)
    }

    #[cfg(test)]
    fn in_b1(&self, key: &K) -> bool {
        self.b1.contains(key)
    }

    #[cfg(test)]
    fn in_b2(&self, key: &K) -> bool {
        self.b2.contains(key)
    }

    #[cfg(any(test, debug_assertions))]
    pub(crate) fn debug_validate_invariants(&self) {
        let capacity = self.config.capacity;
        assert!(self.part <= capacity, "p out of range");
        assert!(
            self.t1.len() + self.t2.len() <= capacity,
            "resident set exceeds capacity"
        );
        assert!(
            self.t1.len() + self.b1.len() <= capacity,
            "L1 exceeds capacity"
        );
        assert!(
            self.t1.len() + self.t2.len() + self.b1.len() + self.b2.len() <= 2 * capacity,
            "directory exceeds 2x capacity"
        );

        // Pairwise disjoint lists.
        for key in self.t1.iter() {
            assert!(!self.t2.contains(key), "key in both T1 and T2");
            assert!(!self.b1.contains(key), "key in both T1 and B1");
            assert!(!self.b2.contains(key), "key in both T1 and B2");
        }
        for key in self.t2.iter() {
            assert!(!self.b1.contains(key), "key in both T2 and B1");
            assert!(!self.b2.contains(key), "key in both T2 and B2");
        }
        for key in self.b1.iter() {
            assert!(!self.b2.contains(key), "key in both B1 and B2");
        }

        // Value map keys = T1 ∪ T2.
        assert_eq!(self.items.len(), self.t1.len() + self.t2.len());
        for key in self.t1.iter().chain(self.t2.iter()) {
            assert!(self.items.contains_key(key), "resident key has no value");
        }
        for key in self.b1.iter().chain(self.b2.iter()) {
            assert!(!self.items.contains_key(key), "ghost key has a value");
        }

        self.t1.debug_validate_invariants();
        self.t2.debug_validate_invariants();
        self.b1.debug_validate_invariants();
        self.b2.debug_validate_invariants();
    }
}
