//! Resident cache entry.
//!
//! An [`Entry`] is plain data: the key, a shared handle to the value, the
//! caller-assigned cost, the last access time, and the two recency links that
//! [`RecencyList`](crate::ds::RecencyList) maintains. Links are `None` whenever
//! the entry is not in a list.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crate::ds::SlotId;

pub struct Entry<K, V> {
    pub(crate) key: K,
    pub(crate) value: Arc<V>,
    pub(crate) cost: u64,
    pub(crate) last_access: Instant,
    pub(crate) prev: Option<SlotId>,
    pub(crate) next: Option<SlotId>,
}

impl<K, V> Entry<K, V> {
    /// Creates a detached entry stamped with `now`.
    pub fn new(key: K, value: Arc<V>, cost: u64, now: Instant) -> Self {
        Self {
            key,
            value,
            cost,
            last_access: now,
            prev: None,
            next: None,
        }
    }

    #[inline]
    pub fn key(&self) -> &K {
        &self.key
    }

    #[inline]
    pub fn value(&self) -> &Arc<V> {
        &self.value
    }

    #[inline]
    pub fn cost(&self) -> u64 {
        self.cost
    }

    #[inline]
    pub fn last_access(&self) -> Instant {
        self.last_access
    }

    /// Time elapsed between the last access and `now`, zero if `now` is earlier.
    #[inline]
    pub fn age(&self, now: Instant) -> std::time::Duration {
        now.saturating_duration_since(self.last_access)
    }

    /// Returns `true` while the entry is linked into a list of more than one node.
    #[cfg(test)]
    pub(crate) fn is_linked(&self) -> bool {
        self.prev.is_some() || self.next.is_some()
    }

    /// Consumes the entry, returning its key and value.
    pub fn into_parts(self) -> (K, Arc<V>) {
        (self.key, self.value)
    }
}

impl<K: fmt::Debug, V> fmt::Debug for Entry<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("key", &self.key)
            .field("cost", &self.cost)
            .field("last_access", &self.last_access)
            .field("prev", &self.prev)
            .field("next", &self.next)
            .finish_non_exhaustive()
    }
}
