//! Single-flight coordination for cache loads.
//!
//! When several callers miss on the same key at once, only one of them should
//! run the (potentially expensive) loader; the rest either wait for that
//! result or bail out immediately, depending on the entry point:
//!
//! ```text
//!   get(k)             ──► execute(k, wait = true)
//!   get_if_present(k)  ──► execute(k, wait = false)
//!
//!   ┌──────────────────────────────────────────────────────────────┐
//!   │ FlightGroup                                                  │
//!   │                                                              │
//!   │   calls: Mutex<FxHashMap<K, Arc<Flight>>>                    │
//!   │                                                              │
//!   │   caller A (first):   install Flight, run loader, publish,   │
//!   │                       signal, remove descriptor              │
//!   │   caller B (wait):    block on Flight's condvar, read result │
//!   │   caller C (no-wait): return KeyNotFound immediately         │
//!   └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Protocol
//!
//! Under the registry lock, `execute` first re-checks the cache through the
//! caller-supplied `check` closure (an internal on-load get, so it never
//! touches the hit/miss counters). A concurrent `set` may have landed the
//! value between the caller's miss and this point; if so there is nothing to
//! load. Otherwise it either joins an existing descriptor or installs a fresh
//! one and becomes responsible for running the loader.
//!
//! The loader runs with no locks held. Its outcome (including a caught
//! panic, surfaced as [`CacheError::LoaderPanic`]) is published into the
//! descriptor, waiters are signalled, and only then is the descriptor
//! removed, so a call arriving after completion re-misses through the cache
//! instead of blocking forever.
//!
//! ## Lock order
//!
//! Registry mutex, then policy lock (inside `check`). The façade never takes
//! them in the other order: it always releases the policy lock before
//! calling into the coordinator.

use std::hash::Hash;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashMap;

use crate::error::CacheError;

/// One in-flight load: the eventual outcome plus a signal for waiters.
struct Flight<V> {
    outcome: Mutex<Option<Result<V, CacheError>>>,
    done: Condvar,
}

impl<V> Flight<V> {
    fn new() -> Self {
        Self {
            outcome: Mutex::new(None),
            done: Condvar::new(),
        }
    }
}

struct Registry<K, V> {
    calls: Mutex<FxHashMap<K, Arc<Flight<V>>>>,
}

/// Per-key in-flight call registry.
///
/// Cloning is cheap and yields a handle to the same registry, which lets the
/// deferred path hand the registry to a background thread for descriptor
/// cleanup.
pub(crate) struct FlightGroup<K, V> {
    inner: Arc<Registry<K, V>>,
}

impl<K, V> Clone for FlightGroup<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> FlightGroup<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(Registry {
                calls: Mutex::new(FxHashMap::default()),
            }),
        }
    }

    /// Runs `run` for `key` at most once across concurrent callers.
    ///
    /// Returns `(value, called)` where `called` is `true` iff this invocation
    /// executed `run` itself. `check` is consulted first under the registry
    /// lock; a hit short-circuits everything. With `wait = false` the caller
    /// never blocks: if a load is (or becomes) in flight it gets
    /// `KeyNotFound` and the load proceeds on a background thread.
    pub(crate) fn execute<C, R>(
        &self,
        key: &K,
        check: C,
        run: R,
        wait: bool,
    ) -> Result<(V, bool), CacheError>
    where
        C: FnOnce() -> Option<V>,
        R: FnOnce() -> Result<V, CacheError> + Send + 'static,
    {
        let flight = {
            let mut calls = self.inner.calls.lock();

            if let Some(value) = check() {
                return Ok((value, false));
            }

            if let Some(existing) = calls.get(key) {
                let flight = Arc::clone(existing);
                drop(calls);
                if !wait {
                    // The first caller owns completion; nothing to do here.
                    return Err(CacheError::KeyNotFound);
                }
                let mut outcome = flight.outcome.lock();
                while outcome.is_none() {
                    flight.done.wait(&mut outcome);
                }
                return outcome
                    .clone()
                    .expect("flight signalled without an outcome")
                    .map(|value| (value, false));
            }

            let flight = Arc::new(Flight::new());
            calls.insert(key.clone(), Arc::clone(&flight));
            flight
        };

        if !wait {
            let registry = Arc::clone(&self.inner);
            let key = key.clone();
            thread::spawn(move || {
                let _ = complete(&registry, key, &flight, run);
            });
            return Err(CacheError::KeyNotFound);
        }

        complete(&self.inner, key.clone(), &flight, run).map(|value| (value, true))
    }

    #[cfg(test)]
    fn in_flight(&self) -> usize {
        self.inner.calls.lock().len()
    }
}

/// Runs the loader, publishes its outcome, wakes waiters, and clears the
/// descriptor. Removal happens strictly after the signal so late arrivals
/// re-miss through the cache rather than joining a dead flight.
fn complete<K, V, R>(
    registry: &Registry<K, V>,
    key: K,
    flight: &Flight<V>,
    run: R,
) -> Result<V, CacheError>
where
    K: Eq + Hash,
    V: Clone,
    R: FnOnce() -> Result<V, CacheError>,
{
    let result = match panic::catch_unwind(AssertUnwindSafe(run)) {
        Ok(result) => result,
        Err(payload) => Err(CacheError::LoaderPanic(panic_message(&payload))),
    };

    {
        let mut outcome = flight.outcome.lock();
        *outcome = Some(result.clone());
    }
    flight.done.notify_all();
    registry.calls.lock().remove(&key);

    result
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
