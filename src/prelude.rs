pub use crate::builder::{CacheBuilder, EvictionPolicy};
pub use crate::cache::Cache;
pub use crate::clock::{Clock, FakeClock, SystemClock};
pub use crate::error::{BoxedError, CacheError, ConfigError};
pub use crate::stats::CacheStats;
