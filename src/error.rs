//! Error types for the polycache library.
//!
//! ## Key Components
//!
//! - [`CacheError`]: Returned from the lookup surface (`get` /
//!   `get_if_present`). `KeyNotFound` is a sentinel, not a failure: it is the
//!   normal signal for "no value available and none will appear".
//! - [`ConfigError`]: Returned when builder parameters are invalid
//!   (e.g. zero capacity for a bounded policy).
//!
//! ## Example Usage
//!
//! ```
//! use polycache::builder::CacheBuilder;
//! use polycache::cache::Cache;
//! use polycache::error::CacheError;
//!
//! let cache: Cache<u32, String> = CacheBuilder::new(16).lru().build();
//! match cache.get(&1) {
//!     Err(CacheError::KeyNotFound) => {} // cold cache, expected
//!     other => panic!("unexpected result: {:?}", other),
//! }
//! ```

use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// Boxed error type accepted from user-supplied loaders.
pub type BoxedError = Box<dyn Error + Send + Sync + 'static>;

// ---------------------------------------------------------------------------
// CacheError
// ---------------------------------------------------------------------------

/// Error surfaced by `get` and `get_if_present`.
///
/// Cloneable so a single loader outcome can be broadcast to every caller
/// coalesced onto the same in-flight load.
#[derive(Debug, Clone)]
pub enum CacheError {
    /// The key is not present (never set, expired, or a deferred load was
    /// kicked off and has not completed yet).
    KeyNotFound,
    /// The user loader returned an error; carried through verbatim.
    Loader(Arc<dyn Error + Send + Sync + 'static>),
    /// The user loader panicked; the payload text is preserved.
    LoaderPanic(String),
}

impl CacheError {
    /// Returns `true` for the `KeyNotFound` sentinel.
    #[inline]
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::KeyNotFound)
    }

    pub(crate) fn from_loader(err: BoxedError) -> Self {
        CacheError::Loader(Arc::from(err))
    }
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::KeyNotFound => f.write_str("key not found"),
            CacheError::Loader(err) => write!(f, "loader error: {}", err),
            CacheError::LoaderPanic(msg) => write!(f, "loader panicked: {}", msg),
        }
    }
}

impl Error for CacheError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CacheError::Loader(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Error returned when cache configuration parameters are invalid.
///
/// Produced by [`CacheBuilder::try_build`](crate::builder::CacheBuilder::try_build);
/// the panicking [`build`](crate::builder::CacheBuilder::build) reports the
/// same condition. Carries a human-readable description of which parameter
/// failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError(String);

impl ConfigError {
    /// Creates a new `ConfigError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Error for ConfigError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_not_found_display() {
        assert_eq!(CacheError::KeyNotFound.to_string(), "key not found");
        assert!(CacheError::KeyNotFound.is_not_found());
    }

    #[test]
    fn loader_error_wraps_source() {
        let inner: BoxedError = "backend unavailable".into();
        let err = CacheError::from_loader(inner);
        assert!(!err.is_not_found());
        assert_eq!(err.to_string(), "loader error: backend unavailable");
        assert!(err.source().is_some());
    }

    #[test]
    fn loader_panic_preserves_payload() {
        let err = CacheError::LoaderPanic("boom".to_string());
        assert_eq!(err.to_string(), "loader panicked: boom");
        assert!(err.source().is_none());
    }

    #[test]
    fn cache_error_is_cloneable() {
        let inner: BoxedError = "transient".into();
        let err = CacheError::from_loader(inner);
        let copy = err.clone();
        assert_eq!(err.to_string(), copy.to_string());
    }

    #[test]
    fn config_display_shows_message() {
        let err = ConfigError::new("capacity must be > 0");
        assert_eq!(err.to_string(), "capacity must be > 0");
        assert_eq!(err.message(), "capacity must be > 0");
    }

    #[test]
    fn config_implements_std_error() {
        fn assert_error<T: Error>() {}
        assert_error::<ConfigError>();
        assert_error::<CacheError>();
    }
}
