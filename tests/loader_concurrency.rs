// ==============================================
// LOADER / SINGLE-FLIGHT CONCURRENCY TESTS (integration)
// ==============================================

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use polycache::builder::CacheBuilder;
use polycache::cache::Cache;
use polycache::error::CacheError;

mod single_flight {
    use super::*;

    #[test]
    fn concurrent_misses_run_loader_once() {
        let invocations = Arc::new(AtomicUsize::new(0));
        let cache: Cache<u32, u32> = CacheBuilder::new(16)
            .lru()
            .loader({
                let invocations = Arc::clone(&invocations);
                move |_: &u32| {
                    invocations.fetch_add(1, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(50));
                    Ok(42)
                }
            })
            .build();

        let threads = 10;
        let barrier = Arc::new(Barrier::new(threads));
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let cache = cache.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cache.get(&1)
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap().unwrap(), 42);
        }

        assert_eq!(invocations.load(Ordering::SeqCst), 1);
        assert_eq!(cache.miss_count(), threads as u64);
        assert_eq!(cache.hit_count(), 0);
        assert_eq!(cache.get(&1).unwrap(), 42);
        assert_eq!(cache.hit_count(), 1);
    }

    #[test]
    fn loader_failure_reaches_every_waiter() {
        let cache: Cache<u32, u32> = CacheBuilder::new(16)
            .lru()
            .loader(|_: &u32| {
                thread::sleep(Duration::from_millis(30));
                Err("flaky backend".into())
            })
            .build();

        let barrier = Arc::new(Barrier::new(4));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = cache.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cache.get(&1)
                })
            })
            .collect();

        for handle in handles {
            match handle.join().unwrap() {
                Err(CacheError::Loader(err)) => assert_eq!(err.to_string(), "flaky backend"),
                other => panic!("unexpected: {:?}", other.map(|_| ())),
            }
        }
        assert_eq!(cache.len(false), 0);
    }

    #[test]
    fn panicking_loader_unblocks_peers() {
        let cache: Cache<u32, u32> = CacheBuilder::new(16)
            .lru()
            .loader(|_: &u32| {
                thread::sleep(Duration::from_millis(30));
                panic!("loader exploded");
            })
            .build();

        let barrier = Arc::new(Barrier::new(3));
        let handles: Vec<_> = (0..3)
            .map(|_| {
                let cache = cache.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cache.get(&1)
                })
            })
            .collect();

        for handle in handles {
            match handle.join().unwrap() {
                Err(CacheError::LoaderPanic(msg)) => assert!(msg.contains("loader exploded")),
                other => panic!("unexpected: {:?}", other.map(|_| ())),
            }
        }
    }

    #[test]
    fn distinct_keys_load_independently() {
        let invocations = Arc::new(AtomicUsize::new(0));
        let cache: Cache<u32, u32> = CacheBuilder::new(64)
            .lfu()
            .loader({
                let invocations = Arc::clone(&invocations);
                move |key: &u32| {
                    invocations.fetch_add(1, Ordering::SeqCst);
                    Ok(key * 2)
                }
            })
            .build();

        let handles: Vec<_> = (0..8u32)
            .map(|key| {
                let cache = cache.clone();
                thread::spawn(move || cache.get(&key).unwrap())
            })
            .collect();

        let mut values: Vec<u32> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        values.sort_unstable();
        assert_eq!(values, (0..8u32).map(|k| k * 2).collect::<Vec<_>>());
        assert_eq!(invocations.load(Ordering::SeqCst), 8);
    }
}

mod deferred {
    use super::*;

    #[test]
    fn get_if_present_returns_immediately_and_loads_in_background() {
        let cache: Cache<u32, u32> = CacheBuilder::new(16)
            .lru()
            .loader(|_: &u32| {
                thread::sleep(Duration::from_millis(20));
                Ok(7)
            })
            .build();

        let start = Instant::now();
        let first = cache.get_if_present(&1);
        assert!(matches!(first, Err(CacheError::KeyNotFound)));
        assert!(
            start.elapsed() < Duration::from_millis(15),
            "deferred lookup must not wait for the loader"
        );

        // Once the background load lands, a plain get sees the value.
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            if let Ok(value) = cache.get(&1) {
                assert_eq!(value, 7);
                break;
            }
            assert!(Instant::now() < deadline, "background load never landed");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn deferred_peers_do_not_stack_loads() {
        let invocations = Arc::new(AtomicUsize::new(0));
        let cache: Cache<u32, u32> = CacheBuilder::new(16)
            .lru()
            .loader({
                let invocations = Arc::clone(&invocations);
                move |_: &u32| {
                    invocations.fetch_add(1, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(50));
                    Ok(1)
                }
            })
            .build();

        // First call installs the background load; rapid-fire repeats find
        // the in-flight descriptor and bail without waiting or loading.
        for _ in 0..10 {
            let _ = cache.get_if_present(&1);
        }

        let deadline = Instant::now() + Duration::from_secs(2);
        while !cache.has(&1) {
            assert!(Instant::now() < deadline, "background load never landed");
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(invocations.load(Ordering::SeqCst), 1);
    }
}

mod shared_handle_churn {
    use super::*;
    use polycache::builder::EvictionPolicy;

    // Teacher-style thread-safety smoke test: hammer one cache handle from
    // several threads and verify nothing deadlocks and the capacity bound
    // holds afterwards.
    fn churn(policy: EvictionPolicy) {
        let cache: Cache<u64, u64> = CacheBuilder::new(128).policy(policy).build();
        let threads = 8;
        let ops = 2_000u64;

        let handles: Vec<_> = (0..threads)
            .map(|t| {
                let cache = cache.clone();
                thread::spawn(move || {
                    for i in 0..ops {
                        let key = (t * 31 + i * 7) % 512;
                        match i % 5 {
                            0 | 1 => cache.set(key, i),
                            2 => {
                                let _ = cache.get(&key);
                            }
                            3 => {
                                let _ = cache.has(&key);
                                let _ = cache.len(true);
                            }
                            _ => {
                                cache.remove(&key);
                            }
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        cache.debug_validate_invariants();
        assert!(cache.len(false) <= 128);
        assert_eq!(cache.lookup_count(), cache.hit_count() + cache.miss_count());
    }

    #[test]
    fn lru_survives_shared_churn() {
        churn(EvictionPolicy::Lru);
    }

    #[test]
    fn lfu_survives_shared_churn() {
        churn(EvictionPolicy::Lfu);
    }

    #[test]
    fn arc_survives_shared_churn() {
        churn(EvictionPolicy::Arc);
    }
}
