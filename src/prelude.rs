//! Commonly used types.
//!
//! ```
//! use memkit::prelude::*;
//!
//! let cache: MemoryCache<u32, &str> = MemoryCacheBuilder::new()
//!     .count_limit(2)
//!     .auto_trim_interval(None)
//!     .build();
//! cache.set(1, "one");
//! assert!(cache.contains_key(&1));
//! ```

pub use crate::builder::{MemoryCacheBuilder, MemoryCacheConfig};
pub use crate::cache::MemoryCache;
pub use crate::clock::{Clock, ManualClock, MonotonicClock};
pub use crate::error::{ConfigError, InvariantError};
pub use crate::lifecycle::LifecycleSignal;
pub use crate::release::{DesignatedThread, ReleaseContext, ReleaseMode};
