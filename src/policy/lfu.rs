//! LFU policy: frequency-bucket eviction with O(1) increment.
//!
//! ## Architecture
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────────┐
//!   │                         LfuCore<K, V>                            │
//!   │                                                                  │
//!   │   index: FxHashMap<K, NodeId>      items: NodeArena<LfuEntry>    │
//!   │   ┌───────┬────────┐               ┌──────────────────────────┐  │
//!   │   │  Key  │ NodeId │──────────────►│ key, value, expires_at,  │  │
//!   │   └───────┴────────┘               │ bucket: NodeId           │  │
//!   │                                    └───────────┬──────────────┘  │
//!   │                                                ▼                 │
//!   │   buckets: OrderList<FreqBucket>   (strictly ascending freq)     │
//!   │   front ──► [freq 0] ◄──► [freq 2] ◄──► [freq 5] ◄── back        │
//!   │             │{d}     │    │{a, b}  │    │{c}     │               │
//!   │             └────────┘    └────────┘    └────────┘               │
//!   │             insertion                                            │
//!   │             point                                                │
//!   └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Increment protocol (on hit)
//!
//! 1. Detach the item from its bucket `cur`; let `next` be `cur`'s successor.
//! 2. If `next` is absent or its frequency exceeds `cur.freq + 1`: reuse
//!    `cur` by relabeling it to `cur.freq + 1` when it is *removable*
//!    (non-zero frequency and now empty), otherwise splice a fresh bucket
//!    after `cur`.
//! 3. If `next.freq == cur.freq + 1`: attach the item there and drop `cur`
//!    if removable.
//! 4. `next.freq < cur.freq + 1` violates the ascending invariant and is a
//!    fatal internal error.
//!
//! The `freq = 0` bucket is created at construction, never removed, and is
//! where new keys attach (an insert is not an access). Eviction walks buckets
//! from the front; order within a bucket is unspecified.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use rustc_hash::{FxHashMap, FxHashSet};

use super::{is_expired, PolicyConfig};
use crate::ds::{NodeArena, NodeId, OrderList};

struct LfuEntry<K, V> {
    key: K,
    value: V,
    expires_at: Option<Instant>,
    /// Handle of the bucket currently holding this item.
    bucket: NodeId,
}

struct FreqBucket {
    freq: u64,
    items: FxHashSet<NodeId>,
}

impl FreqBucket {
    fn new(freq: u64) -> Self {
        Self {
            freq,
            items: FxHashSet::default(),
        }
    }

    /// A non-zero bucket with no items is garbage and must not survive the
    /// operation that emptied it. The zero bucket is the permanent insertion
    /// point and is exempt.
    fn removable(&self) -> bool {
        self.freq > 0 && self.items.is_empty()
    }
}

/// Frequency-ordered cache core.
pub(crate) struct LfuCore<K, V> {
    config: PolicyConfig<K, V>,
    index: FxHashMap<K, NodeId>,
    items: NodeArena<LfuEntry<K, V>>,
    buckets: OrderList<FreqBucket>,
}

impl<K, V> LfuCore<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    pub(crate) fn new(config: PolicyConfig<K, V>) -> Self {
        let capacity = config.capacity;
        let mut buckets = OrderList::new();
        buckets.push_front(FreqBucket::new(0));
        Self {
            config,
            index: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            items: NodeArena::with_capacity(capacity),
            buckets,
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
            // Overwrite replaces the value only; the bucket association is
            // untouched because an overwrite is not an access.
            Some(&id) => {
                let entry = self.items.get_mut(id).expect("indexed item missing");
                entry.value = value;
                id
            }
            None => {
                if self.items.len() >= self.config.capacity {
                    self.evict(1);
                }
                let zero = self.buckets.front_id().expect("zero bucket missing");
                debug_assert_eq!(
                    self.buckets.get(zero).map(|b| b.freq),
                    Some(0),
                    "front bucket must be the zero bucket"
                );
                let id = self.items.insert(LfuEntry {
                    key: key.clone(),
                    value,
                    expires_at: None,
                    bucket: zero,
                });
                self.buckets
                    .get_mut(zero)
                    .expect("zero bucket missing")
                    .items
                    .insert(id);
                self.index.insert(key.clone(), id);
                id
            }
        };

        let entry = self.items.get_mut(id).expect("indexed item missing");
        if let Some(default_ttl) = self.config.expiration {
            entry.expires_at = Some(now + default_ttl);
        }
        if let Some(ttl) = ttl {
            entry.expires_at = Some(now + ttl);
        }

        let entry = self.items.get(id).expect("indexed item missing");
        self.config.notify_added(&key, &entry.value);
    }

    pub(crate) fn get(&mut self, key: &K) -> Option<V> {
        let now = self.config.clock.now();
        let id = *self.index.get(key)?;
        let expired = {
            let entry = self.items.get(id).expect("indexed item missing");
            is_expired(entry.expires_at, now)
        };
        if expired {
            self.remove_item(id);
            return None;
        }
        self.increment(id);
        self.items.get(id).map(|entry| entry.value.clone())
    }

    /// Moves the item one frequency step up, maintaining the ascending
    /// bucket chain.
    fn increment(&mut self, id: NodeId) {
        let cur_id = self.items.get(id).expect("indexed item missing").bucket;
        let cur_freq = self.buckets.get(cur_id).expect("bucket missing").freq;
        let next_freq = cur_freq + 1;

        let removable = {
            let cur = self.buckets.get_mut(cur_id).expect("bucket missing");
            cur.items.remove(&id);
            cur.removable()
        };

        let successor = self.buckets.next_id(cur_id);
        let successor_freq = successor.map(|sid| self.buckets.get(sid).expect("bucket missing").freq);

        let target = match successor_freq {
            None => self.step_into_gap(cur_id, next_freq, removable),
            Some(freq) if freq > next_freq => self.step_into_gap(cur_id, next_freq, removable),
            Some(freq) if freq == next_freq => {
                let sid = successor.expect("successor id matches freq");
                if removable {
                    self.buckets.remove(cur_id);
                }
                sid
            }
            Some(_) => panic!("lfu frequency buckets out of ascending order"),
        };

        self.buckets
            .get_mut(target)
            .expect("target bucket missing")
            .items
            .insert(id);
        self.items.get_mut(id).expect("indexed item missing").bucket = target;
    }

    /// There is no bucket at `next_freq`: reuse the emptied current bucket by
    /// relabeling it, or splice a fresh one in after it.
    fn step_into_gap(&mut self, cur_id: NodeId, next_freq: u64, removable: bool) -> NodeId {
        if removable {
            self.buckets.get_mut(cur_id).expect("bucket missing").freq = next_freq;
            cur_id
        } else {
            self.buckets
                .insert_after(cur_id, FreqBucket::new(next_freq))
                .expect("current bucket missing")
        }
    }

    /// Removes up to `count` items starting from the lowest-frequency bucket.
    fn evict(&mut self, count: usize) {
        let mut evicted = 0;
        let mut cursor = self.buckets.front_id();
        while evicted < count {
            let bucket_id = match cursor {
                Some(id) => id,
                None => return,
            };
            // The bucket may be dropped once drained, so step first.
            cursor = self.buckets.next_id(bucket_id);
            let victims: Vec<NodeId> = {
                let bucket = self.buckets.get(bucket_id).expect("bucket missing");
                bucket.items.iter().take(count - evicted).copied().collect()
            };
            for id in victims {
                self.remove_item(id);
                evicted += 1;
            }
        }
    }

    fn remove_item(&mut self, id: NodeId) {
        let entry = self.items.remove(id).expect("item missing on removal");
        self.index.remove(&entry.key);
        let removable = {
            let bucket = self
                .buckets
                .get_mut(entry.bucket)
                .expect("bucket missing on removal");
            bucket.items.remove(&id);
            bucket.removable()
        };
        if removable {
            self.buckets.remove(entry.bucket);
        }
        self.config.notify_evicted(&entry.key, &entry.value);
    }

    pub(crate) fn get_all(&self, check_expired: bool) -> HashMap<K, V> {
        let now = self.config.clock.now();
        let mut snapshot = HashMap::with_capacity(self.index.len());
        for (key, &id) in &self.index {
            if let Some(entry) = self.items.get(id) {
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
                self.items
                    .get(id)
                    .is_some_and(|entry| !check_expired || !is_expired(entry.expires_at, now))
            })
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub(crate) fn len(&self, check_expired: bool) -> usize {
        if !check_expired {
            return self.items.len();
        }
        let now = self.config.clock.now();
        self.items
            .iter()
            .filter(|(_, entry)| !is_expired(entry.expires_at, now))
            .count()
    }

    pub(crate) fn has(&self, key: &K) -> bool {
        let now = self.config.clock.now();
        self.index.get(key).is_some_and(|&id| {
            self.items
                .get(id)
                .is_some_and(|entry| !is_expired(entry.expires_at, now))
        })
    }

    pub(crate) fn remove(&mut self, key: &K) -> bool {
        match self.index.get(key) {
            Some(&id) => {
                self.remove_item(id);
                true
            }
            None => false,
        }
    }

    #[cfg(test)]
    fn frequency(&self, key: &K) -> Option<u64> {
        let id = *self.index.get(key)?;
        let bucket = self.items.get(id)?.bucket;
        self.buckets.get(bucket).map(|b| b.freq)
    }

    #[cfg(any(test, debug_assertions))]
    pub(crate) fn debug_validate_invariants(&self) {
        assert_eq!(self.index.len(), self.items.len());

        // The zero bucket is always present at the front.
        let front = self.buckets.front_id().expect("zero bucket missing");
        assert_eq!(self.buckets.get(front).map(|b| b.freq), Some(0));

        let mut last_freq: Option<u64> = None;
        let mut accounted = 0usize;
        let mut cursor = self.buckets.front_id();
        while let Some(bucket_id) = cursor {
            let bucket = self.buckets.get(bucket_id).expect("bucket missing");
            if let Some(prev) = last_freq {
                assert!(bucket.freq > prev, "bucket frequencies must strictly ascend");
            }
            assert!(
                !bucket.removable(),
                "removable bucket (freq {}) survived an operation",
                bucket.freq
            );
            for &id in &bucket.items {
                let entry = self.items.get(id).expect("bucket references dead item");
                assert_eq!(entry.bucket, bucket_id, "item bucket backlink mismatch");
                assert_eq!(self.index.get(&entry.key), Some(&id));
            }
            accounted += bucket.items.len();
            last_freq = Some(bucket.freq);
            cursor = self.buckets.next_id(bucket_id);
        }
        assert_eq!(accounted, self.items.len(), "every item belongs to one bucket");
        self.buckets.debug_validate_invariants();
    }
}
