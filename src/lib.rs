//! memkit: a thread-safe in-memory LRU cache with count, cost and age limits.
//!
//! The crate is layered bottom-up:
//!
//! - [`ds`]: the slot arena and the arena-backed recency list.
//! - [`engine`]: the unsynchronized index + list + aggregates.
//! - [`cache`]: [`MemoryCache`], the locked, shareable front end.
//! - [`release`], [`scheduler`], [`lifecycle`]: where removed values are
//!   dropped, the periodic trim pass, and host signal handling.
//!
//! See `DESIGN.md` for how the pieces fit together.

pub mod builder;
pub mod cache;
pub mod clock;
pub mod ds;
pub mod engine;
pub mod entry;
pub mod error;
pub mod lifecycle;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod prelude;
pub mod release;
pub mod scheduler;

pub use crate::builder::{MemoryCacheBuilder, MemoryCacheConfig};
pub use crate::cache::MemoryCache;
pub use crate::clock::{Clock, ManualClock, MonotonicClock};
pub use crate::ds::{RecencyList, SlotArena, SlotId};
pub use crate::engine::{Detached, LruEngine, TrimTarget};
pub use crate::entry::Entry;
pub use crate::error::{ConfigError, InvariantError};
pub use crate::lifecycle::{LifecycleCallback, LifecycleHooks, LifecycleSignal};
#[cfg(feature = "metrics")]
pub use crate::metrics::MemoryCacheMetricsSnapshot;
pub use crate::release::{DesignatedThread, ReleaseContext, ReleaseJob, ReleaseMode, ReleaseQueue};
pub use crate::scheduler::{AutoTrimScheduler, DEFAULT_AUTO_TRIM_INTERVAL};
