//! Eviction policy cores.
//!
//! Each core is a single-threaded state machine (`&mut self` operations); the
//! façade provides the lock. Cores own the configuration the policies need at
//! every operation — capacity, default TTL, callbacks, clock — while the
//! lock, stats, loader, and single-flight registry live in the façade.

pub mod arc;
pub mod lfu;
pub mod lru;
pub mod simple;

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc as StdArc;
use std::time::{Duration, Instant};

use crate::clock::Clock;

/// Callback invoked with the affected key and value, under the write lock.
pub(crate) type Callback<K, V> = StdArc<dyn Fn(&K, &V) + Send + Sync>;

/// Per-policy configuration shared by all cores.
pub(crate) struct PolicyConfig<K, V> {
    pub(crate) capacity: usize,
    pub(crate) expiration: Option<Duration>,
    pub(crate) clock: StdArc<dyn Clock>,
    pub(crate) on_added: Option<Callback<K, V>>,
    pub(crate) on_evicted: Option<Callback<K, V>>,
}

impl<K, V> PolicyConfig<K, V> {
    /// Fires the added callback, if configured.
    pub(crate) fn notify_added(&self, key: &K, value: &V) {
        if let Some(cb) = &self.on_added {
            cb(key, value);
        }
    }

    /// Fires the evicted callback, if configured.
    pub(crate) fn notify_evicted(&self, key: &K, value: &V) {
        if let Some(cb) = &self.on_evicted {
            cb(key, value);
        }
    }
}

/// An entry with no deadline never expires; otherwise it is expired strictly
/// after its deadline has passed.
#[inline]
pub(crate) fn is_expired(expires_at: Option<Instant>, now: Instant) -> bool {
    expires_at.is_some_and(|deadline| deadline < now)
}

/// Static dispatch over the four policy cores.
pub(crate) enum Core<K, V> {
    Simple(simple::SimpleCore<K, V>),
    Lru(lru::LruCore<K, V>),
    Lfu(lfu::LfuCore<K, V>),
    Arc(arc::ArcCore<K, V>),
}

impl<K, V> Core<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    pub(crate) fn set(&mut self, key: K, value: V) {
        match self {
            Core::Simple(core) => core.set(key, value),
            Core::Lru(core) => core.set(key, value),
            Core::Lfu(core) => core.set(key, value),
            Core::Arc(core) => core.set(key, value),
        }
    }

    pub(crate) fn set_with_expire(&mut self, key: K, value: V, ttl: Duration) {
        match self {
            Core::Simple(core) => core.set_with_expire(key, value, ttl),
            Core::Lru(core) => core.set_with_expire(key, value, ttl),
            Core::Lfu(core) => core.set_with_expire(key, value, ttl),
            Core::Arc(core) => core.set_with_expire(key, value, ttl),
        }
    }

    pub(crate) fn get(&mut self, key: &K) -> Option<V> {
        match self {
            Core::Simple(core) => core.get(key),
            Core::Lru(core) => core.get(key),
            Core::Lfu(core) => core.get(key),
            Core::Arc(core) => core.get(key),
        }
    }

    pub(crate) fn get_all(&self, check_expired: bool) -> HashMap<K, V> {
        match self {
            Core::Simple(core) => core.get_all(check_expired),
            Core::Lru(core) => core.get_all(check_expired),
            Core::Lfu(core) => core.get_all(check_expired),
            Core::Arc(core) => core.get_all(check_expired),
        }
    }

    pub(crate) fn keys(&self, check_expired: bool) -> Vec<K> {
        match self {
            Core::Simple(core) => core.keys(check_expired),
            Core::Lru(core) => core.keys(check_expired),
            Core::Lfu(core) => core.keys(check_expired),
            Core::Arc(core) => core.keys(check_expired),
        }
    }

    pub(crate) fn len(&self, check_expired: bool) -> usize {
        match self {
            Core::Simple(core) => core.len(check_expired),
            Core::Lru(core) => core.len(check_expired),
            Core::Lfu(core) => core.len(check_expired),
            Core::Arc(core) => core.len(check_expired),
        }
    }

    pub(crate) fn has(&self, key: &K) -> bool {
        match self {
            Core::Simple(core) => core.has(key),
            Core::Lru(core) => core.has(key),
            Core::Lfu(core) => core.has(key),
            Core::Arc(core) => core.has(key),
        }
    }

    pub(crate) fn remove(&mut self, key: &K) -> bool {
        match self {
            Core::Simple(core) => core.remove(key),
            Core::Lru(core) => core.remove(key),
            Core::Lfu(core) => core.remove(key),
            Core::Arc(core) => core.remove(key),
        }
    }

    #[cfg(any(test, debug_assertions))]
    pub(crate) fn debug_validate_invariants(&self) {
        match self {
            Core::Simple(_) => {}
            Core::Lru(core) => core.debug_validate_invariants(),
            Core::Lfu(core) => core.debug_validate_invariants(),
            Core::Arc(core) => core.debug_validate_invariants(),
        }
    }
}
