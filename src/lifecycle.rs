//! Host lifecycle signals.
//!
//! The cache never detects memory pressure or background transitions itself.
//! Host code that does calls
//! [`MemoryCache::on_memory_pressure`](crate::cache::MemoryCache::on_memory_pressure)
//! or [`on_background_transition`](crate::cache::MemoryCache::on_background_transition);
//! [`LifecycleHooks`] holds what those calls do: an optional `remove_all`
//! followed by an optional user callback.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

use crate::cache::MemoryCache;

/// Signal delivered by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleSignal {
    MemoryPressure,
    BackgroundTransition,
}

/// User callback run after the built-in action for a signal.
pub type LifecycleCallback<K, V> = Arc<dyn Fn(&MemoryCache<K, V>) + Send + Sync>;

struct Hook<K, V> {
    remove_all: AtomicBool,
    callback: RwLock<Option<LifecycleCallback<K, V>>>,
}

impl<K, V> Hook<K, V> {
    fn new(remove_all: bool) -> Self {
        Self {
            remove_all: AtomicBool::new(remove_all),
            callback: RwLock::new(None),
        }
    }
}

/// Per-signal configuration. Flags and callbacks can change at runtime.
pub struct LifecycleHooks<K, V> {
    memory_pressure: Hook<K, V>,
    background_transition: Hook<K, V>,
}

impl<K, V> LifecycleHooks<K, V> {
    pub fn new(
        remove_all_on_memory_pressure: bool,
        remove_all_on_background_transition: bool,
    ) -> Self {
        Self {
            memory_pressure: Hook::new(remove_all_on_memory_pressure),
            background_transition: Hook::new(remove_all_on_background_transition),
        }
    }

    fn hook(&self, signal: LifecycleSignal) -> &Hook<K, V> {
        match signal {
            LifecycleSignal::MemoryPressure => &self.memory_pressure,
            LifecycleSignal::BackgroundTransition => &self.background_transition,
        }
    }

    /// Whether `signal` clears the cache before the callback runs.
    pub fn removes_all_on(&self, signal: LifecycleSignal) -> bool {
        self.hook(signal).remove_all.load(Ordering::Acquire)
    }

    pub fn set_remove_all_on(&self, signal: LifecycleSignal, enabled: bool) {
        self.hook(signal).remove_all.store(enabled, Ordering::Release);
    }

    /// Replaces the callback for `signal`; `None` clears it.
    pub fn set_callback(
        &self,
        signal: LifecycleSignal,
        callback: Option<LifecycleCallback<K, V>>,
    ) {
        *self.hook(signal).callback.write() = callback;
    }

    /// The callback for `signal`, cloned out so it runs without the hook lock.
    pub fn callback(&self, signal: LifecycleSignal) -> Option<LifecycleCallback<K, V>> {
        self.hook(signal).callback.read().clone()
    }
}

impl<K, V> Default for LifecycleHooks<K, V> {
    fn default() -> Self {
        Self::new(true, true)
    }
}

impl<K, V> fmt::Debug for LifecycleHooks<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pressure = &self.memory_pressure;
        let background = &self.background_transition;
        f.debug_struct("LifecycleHooks")
            .field("remove_all_on_memory_pressure", &pressure.remove_all.load(Ordering::Relaxed))
            .field(
                "remove_all_on_background_transition",
                &background.remove_all.load(Ordering::Relaxed),
            )
            .field("memory_pressure_callback", &pressure.callback.read().is_some())
            .field("background_transition_callback", &background.callback.read().is_some())
            .finish()
    }
}
