//! Time sources for expiration checks.
//!
//! Every expiration decision in the library goes through a [`Clock`], so
//! tests can substitute a [`FakeClock`] and advance time deterministically
//! instead of sleeping.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Abstract "now" source.
///
/// `Send + Sync` because the clock is shared with background loader threads.
pub trait Clock: Send + Sync {
    /// Returns the current instant according to this clock.
    fn now(&self) -> Instant;
}

/// Wall-clock time source; the default for built caches.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock for tests.
///
/// Cloning yields another handle to the same underlying time, so a test can
/// hand one clone to the builder and keep the other to call
/// [`advance`](FakeClock::advance).
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use polycache::clock::{Clock, FakeClock};
///
/// let clock = FakeClock::new();
/// let start = clock.now();
/// clock.advance(Duration::from_millis(50));
/// assert_eq!(clock.now() - start, Duration::from_millis(50));
/// ```
#[derive(Debug, Clone)]
pub struct FakeClock {
    inner: Arc<FakeClockInner>,
}

#[derive(Debug)]
struct FakeClockInner {
    base: Instant,
    offset: Mutex<Duration>,
}

impl FakeClock {
    /// Creates a fake clock frozen at an arbitrary starting instant.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(FakeClockInner {
                base: Instant::now(),
                offset: Mutex::new(Duration::ZERO),
            }),
        }
    }

    /// Moves this clock (and every clone of it) forward by `delta`.
    pub fn advance(&self, delta: Duration) {
        let mut offset = self.inner.offset.lock();
        *offset += delta;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.inner.base + *self.inner.offset.lock()
    }
}
