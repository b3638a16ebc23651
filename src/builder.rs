//! Configuration and builder for [`MemoryCache`].
//!
//! Every option has a default matching an unbounded cache that trims every
//! five seconds, clears itself on both lifecycle signals, and releases values
//! on a background thread.
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//! use memkit::builder::MemoryCacheBuilder;
//!
//! let cache = MemoryCacheBuilder::new()
//!     .name("thumbnails")
//!     .count_limit(1_000)
//!     .cost_limit(64 * 1024 * 1024)
//!     .age_limit(Duration::from_secs(300))
//!     .build::<String, Vec<u8>>();
//!
//! cache.set_with_cost("a.png".to_string(), vec![0u8; 16], 16);
//! assert_eq!(cache.total_cost(), 16);
//! ```

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::MemoryCache;
use crate::clock::{Clock, MonotonicClock};
use crate::error::ConfigError;
use crate::release::ReleaseContext;
use crate::scheduler::DEFAULT_AUTO_TRIM_INTERVAL;

/// Every recognised cache option.
#[derive(Clone)]
pub struct MemoryCacheConfig {
    /// Label used in logs, thread names and `Debug` output.
    pub name: Option<String>,
    /// Soft cap on entry count; `None` is unlimited.
    pub count_limit: Option<usize>,
    /// Soft cap on summed cost; `None` is unlimited.
    pub cost_limit: Option<u64>,
    /// Soft cap on time since last access; `None` is unlimited.
    pub age_limit: Option<Duration>,
    /// Period of the background trim pass; `None` disables the scheduler.
    pub auto_trim_interval: Option<Duration>,
    pub remove_all_on_memory_pressure: bool,
    pub remove_all_on_background_transition: bool,
    /// Route the final drop of released values to `designated_context`.
    pub release_on_designated_thread: bool,
    /// `false` drops released values on the calling thread.
    pub release_asynchronously: bool,
    pub designated_context: Option<Arc<dyn ReleaseContext>>,
    pub clock: Arc<dyn Clock>,
    /// Entries to reserve room for up front.
    pub initial_capacity: usize,
}

impl MemoryCacheConfig {
    /// Checks option combinations that cannot be honoured.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auto_trim_interval.is_some_and(|interval| interval.is_zero()) {
            return Err(ConfigError::new(
                "auto_trim_interval must be non-zero (use None to disable auto-trim)",
            ));
        }
        if self.release_on_designated_thread && self.designated_context.is_none() {
            return Err(ConfigError::new(
                "release_on_designated_thread requires a designated_context",
            ));
        }
        Ok(())
    }
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self {
            name: None,
            count_limit: None,
            cost_limit: None,
            age_limit: None,
            auto_trim_interval: Some(DEFAULT_AUTO_TRIM_INTERVAL),
            remove_all_on_memory_pressure: true,
            remove_all_on_background_transition: true,
            release_on_designated_thread: false,
            release_asynchronously: true,
            designated_context: None,
            clock: Arc::new(MonotonicClock),
            initial_capacity: 0,
        }
    }
}

impl fmt::Debug for MemoryCacheConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryCacheConfig")
            .field("name", &self.name)
            .field("count_limit", &self.count_limit)
            .field("cost_limit", &self.cost_limit)
            .field("age_limit", &self.age_limit)
            .field("auto_trim_interval", &self.auto_trim_interval)
            .field("remove_all_on_memory_pressure", &self.remove_all_on_memory_pressure)
            .field(
                "remove_all_on_background_transition",
                &self.remove_all_on_background_transition,
            )
            .field("release_on_designated_thread", &self.release_on_designated_thread)
            .field("release_asynchronously", &self.release_asynchronously)
            .field("designated_context", &self.designated_context.is_some())
            .field("clock", &self.clock)
            .field("initial_capacity", &self.initial_capacity)
            .finish()
    }
}

/// Fluent builder over [`MemoryCacheConfig`].
#[derive(Debug, Clone, Default)]
pub struct MemoryCacheBuilder {
    config: MemoryCacheConfig,
}

impl MemoryCacheBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an existing configuration.
    pub fn from_config(config: MemoryCacheConfig) -> Self {
        Self { config }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = Some(name.into());
        self
    }

    pub fn count_limit(mut self, limit: usize) -> Self {
        self.config.count_limit = Some(limit);
        self
    }

    pub fn cost_limit(mut self, limit: u64) -> Self {
        self.config.cost_limit = Some(limit);
        self
    }

    pub fn age_limit(mut self, limit: Duration) -> Self {
        self.config.age_limit = Some(limit);
        self
    }

    pub fn auto_trim_interval(mut self, interval: Option<Duration>) -> Self {
        self.config.auto_trim_interval = interval;
        self
    }

    pub fn remove_all_on_memory_pressure(mut self, enabled: bool) -> Self {
        self.config.remove_all_on_memory_pressure = enabled;
        self
    }

    pub fn remove_all_on_background_transition(mut self, enabled: bool) -> Self {
        self.config.remove_all_on_background_transition = enabled;
        self
    }

    pub fn release_asynchronously(mut self, enabled: bool) -> Self {
        self.config.release_asynchronously = enabled;
        self
    }

    pub fn release_on_designated_thread(mut self, enabled: bool) -> Self {
        self.config.release_on_designated_thread = enabled;
        self
    }

    /// Sets the designated context and turns on routing to it.
    pub fn release_on(mut self, context: Arc<dyn ReleaseContext>) -> Self {
        self.config.designated_context = Some(context);
        self.config.release_on_designated_thread = true;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.config.clock = clock;
        self
    }

    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.config.initial_capacity = capacity;
        self
    }

    pub fn config(&self) -> &MemoryCacheConfig {
        &self.config
    }

    /// Builds the cache, rejecting invalid option combinations.
    pub fn try_build<K, V>(self) -> Result<MemoryCache<K, V>, ConfigError>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Send + Sync + 'static,
    {
        MemoryCache::with_config(self.config)
    }

    /// Builds the cache.
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid; use [`try_build`](Self::try_build)
    /// for user-supplied options.
    pub fn build<K, V>(self) -> MemoryCache<K, V>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Send + Sync + 'static,
    {
        match self.try_build() {
            Ok(cache) => cache,
            Err(err) => panic!("invalid memory cache configuration: {err}"),
        }
    }
}
