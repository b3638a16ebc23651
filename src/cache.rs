//! # Thread-safe memory cache
//!
//! [`MemoryCache`] puts an [`LruEngine`] behind one `parking_lot::Mutex` (the
//! structural lock) and wires it to a [`ReleaseQueue`], an optional
//! [`AutoTrimScheduler`] and the [`LifecycleHooks`].
//!
//! ## Architecture
//!
//! ```text
//!   ┌───────────────────────────────────────────────────────────────────────┐
//!   │                          MemoryCache<K, V>                            │
//!   │                                                                       │
//!   │   Arc<Shared> ─────────────────────────────────┐  AutoTrimScheduler   │
//!   │   ┌───────────────────────────────────────┐    │  (holds Weak<Shared>)│
//!   │   │ engine: Mutex<LruEngine<K, V>>        │◄───┘          │           │
//!   │   │ limits: count / cost / age (atomics)  │◄──────────────┘           │
//!   │   │ clock:  Arc<dyn Clock>                │                           │
//!   │   │ release: ReleaseQueue<Detached<K, V>> │──► worker / context       │
//!   │   └───────────────────────────────────────┘                           │
//!   │   hooks: LifecycleHooks<K, V>                                         │
//!   └───────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Operation Flow
//!
//! ```text
//!   remove(k):
//!     1. lock engine
//!     2. detach entry from index + recency list, adjust aggregates
//!     3. unlock
//!     4. release.release(Detached::Entry(entry))   // drop happens elsewhere
//! ```
//!
//! Every public operation follows this shape: bounded structural work under
//! the lock, teardown after it. `set` never trims; limits are enforced by
//! [`trim`](MemoryCache::trim), the explicit `trim_to_*` calls, and the
//! scheduler.
//!
//! ## Example
//!
//! ```
//! use memkit::cache::MemoryCache;
//!
//! let cache: MemoryCache<&str, u32> = MemoryCache::new();
//! cache.set("a", 1);
//! cache.set("b", 2);
//! cache.set("c", 3);
//! cache.trim_to_count(2);
//!
//! assert!(!cache.contains_key("a"));
//! assert_eq!(cache.get("c").as_deref(), Some(&3));
//! assert_eq!(cache.total_count(), 2);
//! ```

use std::borrow::Borrow;
use std::fmt;
use std::hash::Hash;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::builder::MemoryCacheConfig;
use crate::clock::Clock;
use crate::engine::{Detached, LruEngine, TrimTarget};
use crate::error::{ConfigError, InvariantError};
use crate::lifecycle::{LifecycleHooks, LifecycleSignal};
#[cfg(feature = "metrics")]
use crate::metrics::{MemoryCacheMetricsSnapshot, MetricsSnapshotProvider};
use crate::release::{ReleaseMode, ReleaseQueue};
use crate::scheduler::AutoTrimScheduler;

/// Victims taken per lock acquisition by the background trim pass.
const TRIM_CHUNK: usize = 64;
/// Back-off before retrying a contended lock in the background trim pass.
const TRIM_BACKOFF: Duration = Duration::from_millis(10);

const NO_COUNT_LIMIT: usize = usize::MAX;
const NO_COST_LIMIT: u64 = u64::MAX;
const NO_AGE_LIMIT: u64 = u64::MAX;

/// Runtime-adjustable limits; the `MAX` sentinel means unlimited.
#[derive(Debug)]
struct Limits {
    count: AtomicUsize,
    cost: AtomicU64,
    age_nanos: AtomicU64,
}

impl Limits {
    fn new(count: Option<usize>, cost: Option<u64>, age: Option<Duration>) -> Self {
        let limits = Self {
            count: AtomicUsize::new(NO_COUNT_LIMIT),
            cost: AtomicU64::new(NO_COST_LIMIT),
            age_nanos: AtomicU64::new(NO_AGE_LIMIT),
        };
        limits.set_count(count);
        limits.set_cost(cost);
        limits.set_age(age);
        limits
    }

    fn count(&self) -> Option<usize> {
        Some(self.count.load(Ordering::Acquire)).filter(|&c| c != NO_COUNT_LIMIT)
    }

    fn cost(&self) -> Option<u64> {
        Some(self.cost.load(Ordering::Acquire)).filter(|&c| c != NO_COST_LIMIT)
    }

    fn age(&self) -> Option<Duration> {
        Some(self.age_nanos.load(Ordering::Acquire))
            .filter(|&a| a != NO_AGE_LIMIT)
            .map(Duration::from_nanos)
    }

    fn set_count(&self, limit: Option<usize>) {
        self.count
            .store(limit.unwrap_or(NO_COUNT_LIMIT), Ordering::Release);
    }

    fn set_cost(&self, limit: Option<u64>) {
        self.cost.store(limit.unwrap_or(NO_COST_LIMIT), Ordering::Release);
    }

    fn set_age(&self, limit: Option<Duration>) {
        // Ages beyond ~584 years collapse to unlimited.
        let nanos = limit
            .and_then(|age| u64::try_from(age.as_nanos()).ok())
            .unwrap_or(NO_AGE_LIMIT);
        self.age_nanos.store(nanos, Ordering::Release);
    }
}

/// State shared with the scheduler thread.
struct Shared<K, V> {
    name: Option<String>,
    engine: Mutex<LruEngine<K, V>>,
    limits: Limits,
    clock: Arc<dyn Clock>,
    release: ReleaseQueue<Detached<K, V>>,
}

impl<K, V> Shared<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("memkit")
    }

    fn hand_off(&self, detached: Detached<K, V>) {
        if !detached.is_empty() {
            self.release.release(detached);
        }
    }

    /// Runs one trim under a single lock acquisition.
    fn trim_locked(&self, target: TrimTarget) -> usize {
        let victims = self.engine.lock().trim(target, usize::MAX);
        let evicted = victims.len();
        if evicted > 0 {
            tracing::debug!(cache = self.label(), ?target, evicted, "trimmed");
        }
        self.hand_off(Detached::Batch(victims));
        evicted
    }

    /// Empties the engine in one step, accounting the entries to `target`.
    fn trim_all_locked(&self, target: TrimTarget) {
        let detached = self.engine.lock().trim_all(target);
        let evicted = detached.len();
        if evicted > 0 {
            tracing::debug!(cache = self.label(), ?target, evicted, "trimmed");
        }
        self.hand_off(detached);
    }

    /// Hands every resident entry to the release path on teardown.
    fn release_resident(&self) {
        let detached = self.engine.lock().take_all();
        let resident = detached.len();
        if resident > 0 {
            tracing::debug!(cache = self.label(), resident, "releasing resident entries");
        }
        self.hand_off(detached);
    }

    /// Combined pass for the scheduler: takes victims in chunks and backs off
    /// while callers hold the lock.
    fn trim_in_background(&self) {
        if let Some(count) = self.limits.count() {
            self.trim_chunked(TrimTarget::Count(count));
        }
        if let Some(cost) = self.limits.cost() {
            self.trim_chunked(TrimTarget::Cost(cost));
        }
        if let Some(max_age) = self.limits.age() {
            let now = self.clock.now();
            self.trim_chunked(TrimTarget::Age { max_age, now });
        }
    }

    fn trim_chunked(&self, target: TrimTarget) {
        let mut evicted = 0usize;
        loop {
            let Some(mut engine) = self.engine.try_lock() else {
                thread::sleep(TRIM_BACKOFF);
                continue;
            };
            let victims = engine.trim(target, TRIM_CHUNK);
            let done = victims.is_empty() || engine.is_within(target);
            drop(engine);

            evicted += victims.len();
            self.hand_off(Detached::Batch(victims));
            if done {
                break;
            }
        }
        if evicted > 0 {
            tracing::debug!(cache = self.label(), ?target, evicted, "auto-trimmed");
        }
    }
}

/// Thread-safe LRU cache with count, cost and age limits.
///
/// Values are stored as `Arc<V>`; [`get`](Self::get) hands out a clone of
/// that `Arc`. Once an entry is removed, the cache's own reference is
/// released through the configured release path, and a caller holding a
/// clone keeps the value alive on its own.
pub struct MemoryCache<K, V> {
    shared: Arc<Shared<K, V>>,
    scheduler: Option<AutoTrimScheduler>,
    hooks: LifecycleHooks<K, V>,
    // Captured where the release bounds hold, so `Drop` can route resident
    // entries through the release queue.
    release_resident: fn(&Shared<K, V>),
}

impl<K, V> MemoryCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Creates an unbounded cache with the default configuration.
    ///
    /// # Panics
    ///
    /// Panics if the release worker or auto-trim thread cannot be spawned.
    pub fn new() -> Self {
        match Self::with_config(MemoryCacheConfig::default()) {
            Ok(cache) => cache,
            Err(err) => panic!("failed to create memory cache: {err}"),
        }
    }

    /// Creates a cache from `config`, validating it first.
    pub fn with_config(config: MemoryCacheConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let label = config.name.clone().unwrap_or_else(|| "memkit".to_string());

        let mode = if config.release_asynchronously {
            ReleaseMode::Background
        } else {
            ReleaseMode::Synchronous
        };
        let designated = if config.release_on_designated_thread {
            config.designated_context.clone()
        } else {
            None
        };
        let release = ReleaseQueue::new(mode, designated, &label)?;

        let shared = Arc::new(Shared {
            name: config.name,
            engine: Mutex::new(LruEngine::with_capacity(config.initial_capacity)),
            limits: Limits::new(config.count_limit, config.cost_limit, config.age_limit),
            clock: config.clock,
            release,
        });

        let scheduler = match config.auto_trim_interval {
            Some(interval) => {
                let weak: Weak<Shared<K, V>> = Arc::downgrade(&shared);
                let scheduler =
                    AutoTrimScheduler::spawn(&format!("{label}-trim"), interval, move || {
                        match weak.upgrade() {
                            Some(shared) => {
                                shared.trim_in_background();
                                ControlFlow::Continue(())
                            },
                            None => ControlFlow::Break(()),
                        }
                    })?;
                Some(scheduler)
            },
            None => None,
        };

        tracing::debug!(
            cache = %label,
            interval = ?config.auto_trim_interval,
            ?mode,
            "memory cache created"
        );

        Ok(Self {
            shared,
            scheduler,
            release_resident: Shared::release_resident,
            hooks: LifecycleHooks::new(
                config.remove_all_on_memory_pressure,
                config.remove_all_on_background_transition,
            ),
        })
    }

    pub fn name(&self) -> Option<&str> {
        self.shared.name.as_deref()
    }

    // -----------------------------------------------------------------------
    // Access
    // -----------------------------------------------------------------------

    /// Returns `true` if `key` is resident. Does not touch recency.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.shared.engine.lock().contains_key(key)
    }

    /// Returns the value for `key`, making it the most recently used entry.
    pub fn get<Q>(&self, key: &Q) -> Option<Arc<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = self.shared.clock.now();
        self.shared.engine.lock().get(key, now).map(Arc::clone)
    }

    /// Returns the value for `key` without touching recency or access time.
    pub fn peek<Q>(&self, key: &Q) -> Option<Arc<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.shared.engine.lock().peek(key).map(Arc::clone)
    }

    /// Stores `value` under `key` with zero cost.
    pub fn set(&self, key: K, value: V) {
        self.set_arc(key, Arc::new(value), 0);
    }

    /// Stores `value` under `key`, charging `cost` against the cost limit.
    ///
    /// Replacing an existing key releases the old value and makes the entry
    /// the most recently used. Never trims.
    pub fn set_with_cost(&self, key: K, value: V, cost: u64) {
        self.set_arc(key, Arc::new(value), cost);
    }

    /// Stores an already shared value.
    pub fn set_arc(&self, key: K, value: Arc<V>, cost: u64) {
        let now = self.shared.clock.now();
        let replaced = self.shared.engine.lock().insert(key, value, cost, now);
        if let Some(old) = replaced {
            self.shared.hand_off(Detached::Value(old));
        }
    }

    /// Stores `Some(value)` or removes `key` for `None`.
    pub fn set_or_remove(&self, key: K, value: Option<V>, cost: u64) {
        match value {
            Some(value) => self.set_with_cost(key, value, cost),
            None => self.remove(&key),
        }
    }

    /// Removes `key`; a missing key is a no-op.
    pub fn remove<Q>(&self, key: &Q)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let removed = self.shared.engine.lock().remove(key);
        if let Some(entry) = removed {
            self.shared.hand_off(Detached::Entry(entry));
        }
    }

    /// Empties the cache. The entries are released as one batch.
    pub fn remove_all(&self) {
        let detached = self.shared.engine.lock().take_all();
        let cleared = detached.len();
        if cleared > 0 {
            tracing::debug!(cache = self.shared.label(), cleared, "removed all entries");
        }
        self.shared.hand_off(detached);
    }

    // -----------------------------------------------------------------------
    // Trim
    // -----------------------------------------------------------------------

    /// Evicts LRU entries until at most `count` remain. Zero empties the
    /// cache in one step.
    pub fn trim_to_count(&self, count: usize) {
        if count == 0 {
            self.shared.trim_all_locked(TrimTarget::Count(0));
            return;
        }
        self.shared.trim_locked(TrimTarget::Count(count));
    }

    /// Evicts LRU entries until the summed cost is at most `cost`. Zero
    /// empties the cache in one step, zero-cost entries included.
    pub fn trim_to_cost(&self, cost: u64) {
        if cost == 0 {
            self.shared.trim_all_locked(TrimTarget::Cost(0));
            return;
        }
        self.shared.trim_locked(TrimTarget::Cost(cost));
    }

    /// Evicts entries not accessed within `max_age`, oldest first.
    pub fn trim_to_age(&self, max_age: Duration) {
        let now = self.shared.clock.now();
        self.shared.trim_locked(TrimTarget::Age { max_age, now });
    }

    /// Applies every configured limit, count then cost then age, under one
    /// lock acquisition, and releases all victims as one batch.
    pub fn trim(&self) {
        let limits = &self.shared.limits;
        let now = self.shared.clock.now();
        let victims = {
            let mut engine = self.shared.engine.lock();
            let mut victims = Vec::new();
            if let Some(count) = limits.count() {
                victims.extend(engine.trim(TrimTarget::Count(count), usize::MAX));
            }
            if let Some(cost) = limits.cost() {
                victims.extend(engine.trim(TrimTarget::Cost(cost), usize::MAX));
            }
            if let Some(max_age) = limits.age() {
                victims.extend(engine.trim(TrimTarget::Age { max_age, now }, usize::MAX));
            }
            victims
        };
        if !victims.is_empty() {
            tracing::debug!(cache = self.shared.label(), evicted = victims.len(), "trim pass");
        }
        self.shared.hand_off(Detached::Batch(victims));
    }

    // -----------------------------------------------------------------------
    // Aggregates and limits
    // -----------------------------------------------------------------------

    pub fn total_count(&self) -> usize {
        self.shared.engine.lock().total_count()
    }

    pub fn total_cost(&self) -> u64 {
        self.shared.engine.lock().total_cost()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.engine.lock().is_empty()
    }

    /// Keys from most to least recently used.
    pub fn keys(&self) -> Vec<K> {
        self.shared.engine.lock().keys().cloned().collect()
    }

    pub fn count_limit(&self) -> Option<usize> {
        self.shared.limits.count()
    }

    pub fn set_count_limit(&self, limit: Option<usize>) {
        self.shared.limits.set_count(limit);
    }

    pub fn cost_limit(&self) -> Option<u64> {
        self.shared.limits.cost()
    }

    pub fn set_cost_limit(&self, limit: Option<u64>) {
        self.shared.limits.set_cost(limit);
    }

    pub fn age_limit(&self) -> Option<Duration> {
        self.shared.limits.age()
    }

    pub fn set_age_limit(&self, limit: Option<Duration>) {
        self.shared.limits.set_age(limit);
    }

    /// Period of the background trim pass, if one is running.
    pub fn auto_trim_interval(&self) -> Option<Duration> {
        self.scheduler
            .as_ref()
            .filter(|s| s.is_running())
            .map(AutoTrimScheduler::interval)
    }

    /// Stops the background trim pass. Idempotent.
    pub fn stop_auto_trim(&self) {
        if let Some(scheduler) = &self.scheduler {
            scheduler.stop();
        }
    }

    pub fn release_mode(&self) -> ReleaseMode {
        self.shared.release.mode()
    }

    /// Blocks until values released so far have been dropped by the release
    /// worker. Values routed to a designated context still wait for it.
    pub fn drain_releases(&self) {
        self.shared.release.flush();
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    pub fn lifecycle_hooks(&self) -> &LifecycleHooks<K, V> {
        &self.hooks
    }

    /// Runs the configured reaction to `signal`.
    pub fn handle_signal(&self, signal: LifecycleSignal) {
        tracing::debug!(cache = self.shared.label(), ?signal, "lifecycle signal");
        if self.hooks.removes_all_on(signal) {
            self.remove_all();
        }
        if let Some(callback) = self.hooks.callback(signal) {
            callback(self);
        }
    }

    /// Host detected memory pressure.
    pub fn on_memory_pressure(&self) {
        self.handle_signal(LifecycleSignal::MemoryPressure);
    }

    /// Host moved to the background.
    pub fn on_background_transition(&self) {
        self.handle_signal(LifecycleSignal::BackgroundTransition);
    }

    pub fn set_remove_all_on_memory_pressure(&self, enabled: bool) {
        self.hooks
            .set_remove_all_on(LifecycleSignal::MemoryPressure, enabled);
    }

    pub fn set_remove_all_on_background_transition(&self, enabled: bool) {
        self.hooks
            .set_remove_all_on(LifecycleSignal::BackgroundTransition, enabled);
    }

    /// Installs a callback run after the built-in memory-pressure action.
    pub fn set_memory_pressure_callback<F>(&self, callback: F)
    where
        F: Fn(&MemoryCache<K, V>) + Send + Sync + 'static,
    {
        self.hooks
            .set_callback(LifecycleSignal::MemoryPressure, Some(Arc::new(callback)));
    }

    /// Installs a callback run after the built-in background-transition action.
    pub fn set_background_transition_callback<F>(&self, callback: F)
    where
        F: Fn(&MemoryCache<K, V>) + Send + Sync + 'static,
    {
        self.hooks
            .set_callback(LifecycleSignal::BackgroundTransition, Some(Arc::new(callback)));
    }

    // -----------------------------------------------------------------------
    // Diagnostics
    // -----------------------------------------------------------------------

    /// Checks that index, recency list and aggregates agree.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        self.shared.engine.lock().check_invariants()
    }

    #[cfg(feature = "metrics")]
    pub fn metrics_snapshot(&self) -> MemoryCacheMetricsSnapshot {
        self.shared.engine.lock().metrics_snapshot()
    }
}

#[cfg(feature = "metrics")]
impl<K, V> MetricsSnapshotProvider<MemoryCacheMetricsSnapshot> for MemoryCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn snapshot(&self) -> MemoryCacheMetricsSnapshot {
        self.metrics_snapshot()
    }
}

impl<K, V> Default for MemoryCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Drop for MemoryCache<K, V> {
    fn drop(&mut self) {
        if let Some(scheduler) = &self.scheduler {
            scheduler.stop();
        }
        (self.release_resident)(self.shared.as_ref());
    }
}

impl<K, V> fmt::Debug for MemoryCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (count, cost) = {
            let engine = self.shared.engine.lock();
            (engine.total_count(), engine.total_cost())
        };
        f.debug_struct("MemoryCache")
            .field("name", &self.shared.name)
            .field("total_count", &count)
            .field("total_cost", &cost)
            .field("count_limit", &self.count_limit())
            .field("cost_limit", &self.cost_limit())
            .field("age_limit", &self.age_limit())
            .field("scheduler", &self.scheduler)
            .field("release", &self.shared.release)
            .finish_non_exhaustive()
    }
}
