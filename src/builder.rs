//! Builder for all eviction policies.
//!
//! A cache is assembled from a capacity, a policy, and optional collaborators
//! (clock, default expiration, loader, callbacks), then materialized with
//! [`build`](CacheBuilder::build) or [`try_build`](CacheBuilder::try_build).
//!
//! ## Example
//!
//! ```
//! use std::time::Duration;
//! use polycache::builder::CacheBuilder;
//! use polycache::cache::Cache;
//!
//! let cache: Cache<String, String> = CacheBuilder::new(1000)
//!     .lfu()
//!     .expiration(Duration::from_secs(30))
//!     .loader(|key: &String| Ok(format!("fetched:{}", key)))
//!     .build();
//!
//! assert_eq!(cache.get(&"user:1".to_string()).unwrap(), "fetched:user:1");
//! ```

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{Cache, LoaderFn};
use crate::clock::{Clock, SystemClock};
use crate::error::{BoxedError, ConfigError};
use crate::policy::arc::ArcCore;
use crate::policy::lfu::LfuCore;
use crate::policy::lru::LruCore;
use crate::policy::simple::SimpleCore;
use crate::policy::{Callback, Core, PolicyConfig};

/// Available eviction policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionPolicy {
    /// Unordered map; expiration alone drives reclamation and the capacity
    /// is a soft ceiling (0 = unbounded).
    Simple,
    /// Least Recently Used.
    Lru,
    /// Least Frequently Used (frequency buckets).
    Lfu,
    /// Adaptive Replacement Cache (Megiddo & Modha).
    Arc,
}

/// Builder-style configuration for a [`Cache`].
pub struct CacheBuilder<K, V> {
    capacity: usize,
    policy: EvictionPolicy,
    clock: Arc<dyn Clock>,
    expiration: Option<Duration>,
    loader: Option<LoaderFn<K, V>>,
    on_added: Option<Callback<K, V>>,
    on_evicted: Option<Callback<K, V>>,
}

impl<K, V> CacheBuilder<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Starts a builder for a cache holding at most `capacity` entries.
    ///
    /// The policy defaults to [`EvictionPolicy::Simple`], for which
    /// `capacity` is a soft ceiling and 0 means unbounded. Every other
    /// policy requires a positive capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            policy: EvictionPolicy::Simple,
            clock: Arc::new(SystemClock),
            expiration: None,
            loader: None,
            on_added: None,
            on_evicted: None,
        }
    }

    /// Selects the eviction policy.
    pub fn policy(mut self, policy: EvictionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Shorthand for `policy(EvictionPolicy::Simple)`.
    pub fn simple(self) -> Self {
        self.policy(EvictionPolicy::Simple)
    }

    /// Shorthand for `policy(EvictionPolicy::Lru)`.
    pub fn lru(self) -> Self {
        self.policy(EvictionPolicy::Lru)
    }

    /// Shorthand for `policy(EvictionPolicy::Lfu)`.
    pub fn lfu(self) -> Self {
        self.policy(EvictionPolicy::Lfu)
    }

    /// Shorthand for `policy(EvictionPolicy::Arc)`.
    pub fn arc(self) -> Self {
        self.policy(EvictionPolicy::Arc)
    }

    /// Substitutes the time source (e.g. a
    /// [`FakeClock`](crate::clock::FakeClock) in tests).
    pub fn clock<C>(mut self, clock: C) -> Self
    where
        C: Clock + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    /// Default TTL applied on every set and overwrite.
    pub fn expiration(mut self, ttl: Duration) -> Self {
        self.expiration = Some(ttl);
        self
    }

    /// Loader consulted on misses; the loaded value is stored with the
    /// default expiration.
    pub fn loader<F>(mut self, loader: F) -> Self
    where
        F: Fn(&K) -> Result<V, BoxedError> + Send + Sync + 'static,
    {
        self.loader = Some(Arc::new(move |key: &K| loader(key).map(|v| (v, None))));
        self
    }

    /// Loader that may also return a per-load TTL overriding the default.
    pub fn loader_with_expire<F>(mut self, loader: F) -> Self
    where
        F: Fn(&K) -> Result<(V, Option<Duration>), BoxedError> + Send + Sync + 'static,
    {
        self.loader = Some(Arc::new(loader));
        self
    }

    /// Callback fired after every successful set, under the write lock.
    ///
    /// Must not block or re-enter the cache.
    pub fn on_added<F>(mut self, callback: F) -> Self
    where
        F: Fn(&K, &V) + Send + Sync + 'static,
    {
        self.on_added = Some(Arc::new(callback));
        self
    }

    /// Callback fired on every removal (eviction, expiration sweep, explicit
    /// remove), under the write lock.
    ///
    /// Must not block or re-enter the cache.
    pub fn on_evicted<F>(mut self, callback: F) -> Self
    where
        F: Fn(&K, &V) + Send + Sync + 'static,
    {
        self.on_evicted = Some(Arc::new(callback));
        self
    }

    /// Builds the cache, or reports why the configuration is invalid.
    pub fn try_build(self) -> Result<Cache<K, V>, ConfigError> {
        if self.capacity == 0 && self.policy != EvictionPolicy::Simple {
            return Err(ConfigError::new(
                "capacity must be greater than zero for lru, lfu, and arc caches",
            ));
        }

        let config = PolicyConfig {
            capacity: self.capacity,
            expiration: self.expiration,
            clock: self.clock,
            on_added: self.on_added,
            on_evicted: self.on_evicted,
        };

        let core = match self.policy {
            EvictionPolicy::Simple => Core::Simple(SimpleCore::new(config)),
            EvictionPolicy::Lru => Core::Lru(LruCore::new(config)),
            EvictionPolicy::Lfu => Core::Lfu(LfuCore::new(config)),
            EvictionPolicy::Arc => Core::Arc(ArcCore::new(config)),
        };

        Ok(Cache::from_parts(core, self.loader))
    }

    /// Builds the cache.
    ///
    /// # Panics
    ///
    /// On the conditions [`try_build`](CacheBuilder::try_build) reports as
    /// errors: a non-simple policy with capacity 0.
    pub fn build(self) -> Cache<K, V> {
        match self.try_build() {
            Ok(cache) => cache,
            Err(err) => panic!("invalid cache configuration: {}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_policies_build_and_roundtrip() {
        let policies = [
            EvictionPolicy::Simple,
            EvictionPolicy::Lru,
            EvictionPolicy::Lfu,
            EvictionPolicy::Arc,
        ];
        for policy in policies {
            let cache: Cache<u32, String> = CacheBuilder::new(10).policy(policy).build();
            cache.set(1, "one".to_string());
            cache.set(2, "two".to_string());
            assert_eq!(cache.get(&1).unwrap(), "one");
            assert_eq!(cache.len(false), 2);
            assert!(cache.has(&2));
            assert!(cache.remove(&1));
            assert!(!cache.has(&1));
        }
    }

    #[test]
    fn zero_capacity_rejected_for_bounded_policies() {
        for policy in [EvictionPolicy::Lru, EvictionPolicy::Lfu, EvictionPolicy::Arc] {
            let result = CacheBuilder::<u32, u32>::new(0).policy(policy).try_build();
            let err = result.err().expect("zero capacity must be rejected");
            assert!(err.message().contains("capacity"));
        }
    }

    #[test]
    fn zero_capacity_simple_is_fine() {
        let cache = CacheBuilder::<u32, u32>::new(0).simple().try_build();
        assert!(cache.is_ok());
    }

    #[test]
    #[should_panic(expected = "invalid cache configuration")]
    fn build_panics_on_invalid_config() {
        let _ = CacheBuilder::<u32, u32>::new(0).arc().build();
    }

    #[test]
    fn shorthands_select_policies() {
        // Smoke test: each shorthand builds the corresponding policy.
        let _: Cache<u32, u32> = CacheBuilder::new(4).simple().build();
        let _: Cache<u32, u32> = CacheBuilder::new(4).lru().build();
        let _: Cache<u32, u32> = CacheBuilder::new(4).lfu().build();
        let _: Cache<u32, u32> = CacheBuilder::new(4).arc().build();
    }
}
