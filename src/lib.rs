//! polycache: an in-process key/value cache with interchangeable eviction
//! policies.
//!
//! Four policies behind one interface — `simple` (unordered,
//! expiration-driven), `lru` (recency), `lfu` (frequency), and `arc`
//! (adaptive replacement) — with per-entry and default time-based
//! expiration, miss-time value loading with single-flight deduplication,
//! and hit/miss statistics.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use polycache::builder::CacheBuilder;
//! use polycache::cache::Cache;
//!
//! let cache: Cache<u64, String> = CacheBuilder::new(256)
//!     .arc()
//!     .expiration(Duration::from_secs(60))
//!     .build();
//!
//! cache.set(1, "hello".to_string());
//! assert_eq!(cache.get(&1).unwrap(), "hello");
//! assert_eq!(cache.hit_count(), 1);
//! ```

pub mod builder;
pub mod cache;
pub mod clock;
pub mod error;
pub mod prelude;
pub mod stats;

mod ds;
mod flight;
mod policy;
