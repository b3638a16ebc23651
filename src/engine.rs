//! # Eviction engine
//!
//! [`LruEngine`] is the unsynchronized core behind
//! [`MemoryCache`](crate::cache::MemoryCache): an index from key to arena slot,
//! a [`RecencyList`] ordering every resident entry from most to least recently
//! used, and incrementally maintained count and cost aggregates.
//!
//! ## Architecture
//!
//! ```text
//!   ┌───────────────────────────────────────────────────────────────────┐
//!   │                          LruEngine<K, V>                          │
//!   │                                                                   │
//!   │   index: FxHashMap<K, SlotId>                                     │
//!   │   ┌─────────┬────────┐                                            │
//!   │   │  "a"    │  id_0  │───────────────────────────────┐            │
//!   │   │  "b"    │  id_1  │──────────┐                    │            │
//!   │   └─────────┴────────┘          ▼                    ▼            │
//!   │   list: RecencyList    head ─► [id_1] ◄──► ... ◄──► [id_0] ◄─ tail│
//!   │                                 MRU                   LRU         │
//!   │                                                                   │
//!   │   total_cost: Σ entry.cost      total_count: index.len()          │
//!   └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Detach, don't drop
//!
//! No method here drops a value it removes. Removed entries, replaced values
//! and whole cleared structures come back to the caller (as [`Detached`] or
//! `Vec<Entry>`), so the cache can release its lock before any value
//! destructor runs.
//!
//! ## Trimming
//!
//! All trims pop from the tail while a [`TrimTarget`] is not yet satisfied.
//! Tail-to-head order is non-decreasing in access time, so an age trim stops
//! at the first entry young enough to keep.
//!
//! | Operation                  | Cost                   |
//! |----------------------------|------------------------|
//! | `get` / `insert` / `remove`| O(1) amortized         |
//! | `take_all`                 | O(1) (structures moved)|
//! | `trim(target, max)`        | O(victims)             |

use std::borrow::Borrow;
use std::hash::Hash;
use std::mem;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;

use crate::ds::{RecencyList, SlotId};
use crate::entry::Entry;
use crate::error::InvariantError;
#[cfg(feature = "metrics")]
use crate::metrics::{
    CoreMetricsRecorder, MemoryCacheMetrics, MemoryCacheMetricsSnapshot, TrimMetricsRecorder,
    TrimReason,
};

/// Limit a trim pass drives the engine towards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrimTarget {
    /// Keep at most this many entries.
    Count(usize),
    /// Keep the summed cost at or below this value.
    Cost(u64),
    /// Drop entries whose last access is more than `max_age` before `now`.
    Age { max_age: Duration, now: Instant },
}

/// Ownership removed from the engine, waiting to be dropped off-lock.
pub enum Detached<K, V> {
    /// A value superseded by a `set` on an existing key.
    Value(Arc<V>),
    /// A single removed entry.
    Entry(Entry<K, V>),
    /// Victims of a trim pass.
    Batch(Vec<Entry<K, V>>),
    /// Everything, after `remove_all`.
    All {
        list: RecencyList<K, V>,
        index: FxHashMap<K, SlotId>,
    },
}

impl<K, V> Detached<K, V> {
    /// Number of entries (or values) carried.
    pub fn len(&self) -> usize {
        match self {
            Detached::Value(_) | Detached::Entry(_) => 1,
            Detached::Batch(entries) => entries.len(),
            Detached::All { list, .. } => list.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Index + recency list + aggregates. Not thread-safe; wrap in a lock.
#[derive(Debug)]
pub struct LruEngine<K, V> {
    index: FxHashMap<K, SlotId>,
    list: RecencyList<K, V>,
    total_cost: u64,
    #[cfg(feature = "metrics")]
    metrics: MemoryCacheMetrics,
}

impl<K, V> LruEngine<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an engine with room for `capacity` entries before reallocating.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            index: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            list: RecencyList::with_capacity(capacity),
            total_cost: 0,
            #[cfg(feature = "metrics")]
            metrics: MemoryCacheMetrics::default(),
        }
    }

    #[inline]
    pub fn total_count(&self) -> usize {
        self.index.len()
    }

    #[inline]
    pub fn total_cost(&self) -> u64 {
        self.total_cost
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    #[inline]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index.contains_key(key)
    }

    /// Looks up `key`, stamping it with `now` and moving it to the MRU position.
    pub fn get<Q>(&mut self, key: &Q, now: Instant) -> Option<&Arc<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let Some(&id) = self.index.get(key) else {
            #[cfg(feature = "metrics")]
            self.metrics.record_get_miss();
            return None;
        };
        #[cfg(feature = "metrics")]
        self.metrics.record_get_hit();
        self.list.move_to_front(id);
        let entry = self.list.get_mut(id)?;
        entry.last_access = now;
        Some(&entry.value)
    }

    /// Looks up `key` without touching recency or access time.
    pub fn peek<Q>(&self, key: &Q) -> Option<&Arc<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let id = *self.index.get(key)?;
        self.list.get(id).map(Entry::value)
    }

    /// Inserts or replaces `key`, making it the MRU entry.
    ///
    /// Returns the superseded value when the key was already resident. Never
    /// trims: the engine may end up over any limit until the next trim.
    pub fn insert(&mut self, key: K, value: Arc<V>, cost: u64, now: Instant) -> Option<Arc<V>> {
        if let Some(&id) = self.index.get(&key) {
            if let Some(entry) = self.list.get_mut(id) {
                let old = mem::replace(&mut entry.value, value);
                self.total_cost = self
                    .total_cost
                    .saturating_sub(entry.cost)
                    .saturating_add(cost);
                entry.cost = cost;
                entry.last_access = now;
                self.list.move_to_front(id);
                #[cfg(feature = "metrics")]
                self.metrics.record_insert_update();
                return Some(old);
            }
            debug_assert!(false, "index points at an empty slot");
        }

        let id = self.list.push_front(Entry::new(key.clone(), value, cost, now));
        self.index.insert(key, id);
        self.total_cost = self.total_cost.saturating_add(cost);
        #[cfg(feature = "metrics")]
        self.metrics.record_insert_new();
        None
    }

    /// Detaches `key` from index and list.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<Entry<K, V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let id = self.index.remove(key)?;
        let entry = self.list.remove(id)?;
        self.total_cost = self.total_cost.saturating_sub(entry.cost);
        #[cfg(feature = "metrics")]
        self.metrics.record_remove();
        Some(entry)
    }

    /// Detaches the least recently used entry.
    pub fn pop_lru(&mut self) -> Option<Entry<K, V>> {
        let entry = self.list.pop_back()?;
        self.index.remove(&entry.key);
        self.total_cost = self.total_cost.saturating_sub(entry.cost);
        Some(entry)
    }

    /// Key of the least recently used entry.
    pub fn peek_lru(&self) -> Option<&K> {
        self.list.back().map(Entry::key)
    }

    /// Moves every entry out in one step and resets the aggregates.
    ///
    /// The old index and list are returned whole, so the work done here does
    /// not depend on how many entries there were.
    pub fn take_all(&mut self) -> Detached<K, V> {
        let detached = self.detach_all();
        #[cfg(feature = "metrics")]
        self.metrics.record_clear(detached.len());
        detached
    }

    /// Empties the engine like [`take_all`](Self::take_all), but accounts the
    /// entries as victims of `target` rather than as a clear.
    pub fn trim_all(&mut self, target: TrimTarget) -> Detached<K, V> {
        let detached = self.detach_all();
        #[cfg(feature = "metrics")]
        {
            let reason = TrimReason::from(target);
            self.metrics.record_trim_call(reason);
            self.metrics.record_evicted(reason, detached.len());
        }
        #[cfg(not(feature = "metrics"))]
        let _ = target;
        detached
    }

    fn detach_all(&mut self) -> Detached<K, V> {
        let list = mem::take(&mut self.list);
        let index = mem::take(&mut self.index);
        self.total_cost = 0;
        Detached::All { list, index }
    }

    /// Returns `true` if `target` already holds.
    pub fn is_within(&self, target: TrimTarget) -> bool {
        match target {
            TrimTarget::Count(count) => self.index.len() <= count,
            TrimTarget::Cost(cost) => self.total_cost <= cost,
            TrimTarget::Age { max_age, now } => self
                .list
                .back()
                .is_none_or(|tail| tail.age(now) <= max_age),
        }
    }

    /// Evicts from the LRU end until `target` holds or `max_victims` entries
    /// have been taken.
    pub fn trim(&mut self, target: TrimTarget, max_victims: usize) -> Vec<Entry<K, V>> {
        #[cfg(feature = "metrics")]
        self.metrics.record_trim_call(TrimReason::from(target));

        let mut victims = Vec::new();
        while victims.len() < max_victims && !self.is_within(target) {
            match self.pop_lru() {
                Some(entry) => victims.push(entry),
                None => break,
            }
        }

        #[cfg(feature = "metrics")]
        self.metrics
            .record_evicted(TrimReason::from(target), victims.len());
        victims
    }

    pub fn trim_to_count(&mut self, count: usize) -> Vec<Entry<K, V>> {
        self.trim(TrimTarget::Count(count), usize::MAX)
    }

    pub fn trim_to_cost(&mut self, cost: u64) -> Vec<Entry<K, V>> {
        self.trim(TrimTarget::Cost(cost), usize::MAX)
    }

    pub fn trim_to_age(&mut self, max_age: Duration, now: Instant) -> Vec<Entry<K, V>> {
        self.trim(TrimTarget::Age { max_age, now }, usize::MAX)
    }

    /// Keys from most to least recently used.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.list.iter().map(Entry::key)
    }

    /// Checks that index, list and aggregates agree.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        self.list.check_invariants()?;

        if self.index.len() != self.list.len() {
            return Err(InvariantError::new(format!(
                "index holds {} keys but recency list holds {} entries",
                self.index.len(),
                self.list.len()
            )));
        }

        let mut summed: u64 = 0;
        for (key, &id) in &self.index {
            let entry = self.list.get(id).ok_or_else(|| {
                InvariantError::new(format!("index points at empty slot {:?}", id))
            })?;
            if entry.key() != key {
                return Err(InvariantError::new(format!(
                    "slot {:?} holds a different key than the index",
                    id
                )));
            }
            summed = summed.saturating_add(entry.cost);
        }

        if summed != self.total_cost {
            return Err(InvariantError::new(format!(
                "total_cost {} != summed cost {}",
                self.total_cost, summed
            )));
        }
        Ok(())
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        if let Err(err) = self.check_invariants() {
            panic!("engine invariant violated: {err}");
        }
    }

    #[cfg(feature = "metrics")]
    pub fn metrics_snapshot(&self) -> MemoryCacheMetricsSnapshot {
        MemoryCacheMetricsSnapshot::capture(&self.metrics, self.total_count(), self.total_cost)
    }
}

impl<K, V> Default for LruEngine<K, V>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "metrics")]
impl From<TrimTarget> for TrimReason {
    fn from(target: TrimTarget) -> Self {
        match target {
            TrimTarget::Count(_) => TrimReason::Count,
            TrimTarget::Cost(_) => TrimReason::Cost,
            TrimTarget::Age { .. } => TrimReason::Age,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_with(keys: &[(&'static str, u64)], now: Instant) -> LruEngine<&'static str, u32> {
        let mut engine = LruEngine::new();
        for (i, &(key, cost)) in keys.iter().enumerate() {
            engine.insert(key, Arc::new(i as u32), cost, now);
        }
        engine
    }

    fn keys(engine: &LruEngine<&'static str, u32>) -> Vec<&'static str> {
        engine.keys().copied().collect()
    }

    fn victim_keys(victims: &[Entry<&'static str, u32>]) -> Vec<&'static str> {
        victims.iter().map(|e| *e.key()).collect()
    }

    mod access {
        use super::*;

        #[test]
        fn insert_new_keys_updates_aggregates() {
            let now = Instant::now();
            let engine = engine_with(&[("a", 1), ("b", 2), ("c", 3)], now);
            assert_eq!(engine.total_count(), 3);
            assert_eq!(engine.total_cost(), 6);
            assert_eq!(keys(&engine), vec!["c", "b", "a"]);
            engine.debug_validate_invariants();
        }

        #[test]
        fn insert_existing_key_replaces_in_place() {
            let now = Instant::now();
            let mut engine = engine_with(&[("a", 5), ("b", 5)], now);
            let old = engine.insert("a", Arc::new(99), 2, now);
            assert_eq!(old.as_deref(), Some(&0));
            assert_eq!(engine.total_count(), 2);
            assert_eq!(engine.total_cost(), 7);
            assert_eq!(keys(&engine), vec!["a", "b"]);
            assert_eq!(engine.peek("a").map(|v| **v), Some(99));
            engine.debug_validate_invariants();
        }

        #[test]
        fn get_moves_to_front_and_stamps_time() {
            let t0 = Instant::now();
            let mut engine = engine_with(&[("a", 0), ("b", 0)], t0);
            let later = t0 + Duration::from_secs(3);
            assert_eq!(engine.get("a", later).map(|v| **v), Some(0));
            assert_eq!(keys(&engine), vec!["a", "b"]);

            let victims = engine.trim_to_age(Duration::from_secs(1), later);
            assert_eq!(victim_keys(&victims), vec!["b"]);
        }

        #[test]
        fn get_miss_has_no_side_effect() {
            let now = Instant::now();
            let mut engine = engine_with(&[("a", 1), ("b", 1)], now);
            assert!(engine.get("zz", now).is_none());
            assert_eq!(keys(&engine), vec!["b", "a"]);
        }

        #[test]
        fn peek_does_not_reorder() {
            let now = Instant::now();
            let engine = engine_with(&[("a", 0), ("b", 0)], now);
            assert!(engine.peek("a").is_some());
            assert_eq!(keys(&engine), vec!["b", "a"]);
        }

        #[test]
        fn remove_detaches_entry_and_cost() {
            let now = Instant::now();
            let mut engine = engine_with(&[("a", 4), ("b", 6)], now);
            let removed = engine.remove("a").unwrap();
            assert_eq!(*removed.key(), "a");
            assert_eq!(removed.cost(), 4);
            assert_eq!(engine.total_count(), 1);
            assert_eq!(engine.total_cost(), 6);
            assert!(!engine.contains_key("a"));
            assert!(engine.remove("a").is_none());
            engine.debug_validate_invariants();
        }

        #[test]
        fn take_all_resets_everything() {
            let now = Instant::now();
            let mut engine = engine_with(&[("a", 4), ("b", 6), ("c", 1)], now);
            let detached = engine.take_all();
            assert_eq!(detached.len(), 3);
            assert_eq!(engine.total_count(), 0);
            assert_eq!(engine.total_cost(), 0);
            assert!(engine.get("a", now).is_none());
            engine.debug_validate_invariants();

            engine.insert("d", Arc::new(1), 1, now);
            assert_eq!(keys(&engine), vec!["d"]);
            engine.debug_validate_invariants();
        }

        #[test]
        fn borrowed_lookup_with_string_keys() {
            let now = Instant::now();
            let mut engine: LruEngine<String, u8> = LruEngine::new();
            engine.insert("alpha".to_string(), Arc::new(1), 0, now);
            assert!(engine.contains_key("alpha"));
            assert!(engine.get("alpha", now).is_some());
            assert!(engine.remove("alpha").is_some());
        }
    }

    mod trimming {
        use super::*;

        #[test]
        fn trim_to_count_keeps_most_recent() {
            let now = Instant::now();
            let mut engine = engine_with(&[("a", 0), ("b", 0), ("c", 0)], now);
            let victims = engine.trim_to_count(2);
            assert_eq!(victim_keys(&victims), vec!["a"]);
            assert_eq!(keys(&engine), vec!["c", "b"]);
            engine.debug_validate_invariants();
        }

        #[test]
        fn trim_to_count_under_limit_is_noop() {
            let now = Instant::now();
            let mut engine = engine_with(&[("a", 0)], now);
            assert!(engine.trim_to_count(5).is_empty());
            assert_eq!(engine.total_count(), 1);
        }

        #[test]
        fn trim_all_detaches_everything_at_once() {
            let now = Instant::now();
            let mut engine = engine_with(&[("a", 0), ("b", 3), ("c", 4)], now);
            let detached = engine.trim_all(TrimTarget::Cost(0));
            assert!(matches!(detached, Detached::All { .. }));
            assert_eq!(detached.len(), 3);
            assert!(engine.is_empty());
            assert_eq!(engine.total_cost(), 0);
            engine.debug_validate_invariants();
        }

        #[test]
        fn trim_to_count_zero_empties() {
            let now = Instant::now();
            let mut engine = engine_with(&[("a", 1), ("b", 2)], now);
            assert_eq!(engine.trim_to_count(0).len(), 2);
            assert!(engine.is_empty());
            assert_eq!(engine.total_cost(), 0);
        }

        #[test]
        fn trim_to_cost_respects_recency() {
            let now = Instant::now();
            let mut engine = engine_with(&[("a", 5), ("b", 5)], now);
            engine.get("a", now);
            let victims = engine.trim_to_cost(6);
            assert_eq!(victim_keys(&victims), vec!["b"]);
            assert_eq!(keys(&engine), vec!["a"]);
            assert_eq!(engine.total_cost(), 5);
        }

        #[test]
        fn trim_to_cost_evicts_single_oversized_entry() {
            let now = Instant::now();
            let mut engine = engine_with(&[("big", 100)], now);
            let victims = engine.trim_to_cost(10);
            assert_eq!(victim_keys(&victims), vec!["big"]);
            assert!(engine.is_empty());
        }

        #[test]
        fn trim_to_age_stops_at_first_young_entry() {
            let t0 = Instant::now();
            let mut engine = LruEngine::new();
            engine.insert("old1", Arc::new(0u32), 0, t0);
            engine.insert("old2", Arc::new(0), 0, t0 + Duration::from_secs(1));
            engine.insert("young", Arc::new(0), 0, t0 + Duration::from_secs(9));

            let now = t0 + Duration::from_secs(10);
            let victims = engine.trim_to_age(Duration::from_secs(5), now);
            assert_eq!(victim_keys(&victims), vec!["old1", "old2"]);
            assert_eq!(keys(&engine), vec!["young"]);
        }

        #[test]
        fn trim_to_age_boundary_is_kept() {
            let t0 = Instant::now();
            let mut engine = engine_with(&[("a", 0)], t0);
            let victims = engine.trim_to_age(Duration::from_secs(5), t0 + Duration::from_secs(5));
            assert!(victims.is_empty());
            assert_eq!(engine.total_count(), 1);
        }

        #[test]
        fn bounded_trim_takes_at_most_max_victims() {
            let now = Instant::now();
            let mut engine = engine_with(&[("a", 0), ("b", 0), ("c", 0), ("d", 0)], now);
            let first = engine.trim(TrimTarget::Count(0), 3);
            assert_eq!(victim_keys(&first), vec!["a", "b", "c"]);
            assert!(!engine.is_within(TrimTarget::Count(0)));
            let rest = engine.trim(TrimTarget::Count(0), 3);
            assert_eq!(victim_keys(&rest), vec!["d"]);
            assert!(engine.is_within(TrimTarget::Count(0)));
        }

        #[test]
        fn empty_engine_is_within_every_target() {
            let engine: LruEngine<u8, u8> = LruEngine::new();
            let now = Instant::now();
            assert!(engine.is_within(TrimTarget::Count(0)));
            assert!(engine.is_within(TrimTarget::Cost(0)));
            assert!(engine.is_within(TrimTarget::Age {
                max_age: Duration::ZERO,
                now
            }));
        }
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            Set(u8, u16),
            Get(u8),
            Remove(u8),
            TrimCount(u8),
            TrimCost(u32),
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                4 => (0u8..32, 0u16..100).prop_map(|(k, c)| Op::Set(k, c)),
                3 => (0u8..32).prop_map(Op::Get),
                1 => (0u8..32).prop_map(Op::Remove),
                1 => (0u8..16).prop_map(Op::TrimCount),
                1 => (0u32..800).prop_map(Op::TrimCost),
            ]
        }

        proptest! {
            /// Aggregates match the resident set after every operation.
            #[cfg_attr(miri, ignore)]
            #[test]
            fn prop_aggregates_track_resident_set(ops in prop::collection::vec(op(), 0..200)) {
                let now = Instant::now();
                let mut engine: LruEngine<u8, u8> = LruEngine::new();
                let mut model: std::collections::HashMap<u8, u64> = Default::default();

                for op in ops {
                    match op {
                        Op::Set(k, c) => {
                            engine.insert(k, Arc::new(k), u64::from(c), now);
                            model.insert(k, u64::from(c));
                        },
                        Op::Get(k) => {
                            prop_assert_eq!(engine.get(&k, now).is_some(), model.contains_key(&k));
                        },
                        Op::Remove(k) => {
                            prop_assert_eq!(engine.remove(&k).is_some(), model.remove(&k).is_some());
                        },
                        Op::TrimCount(n) => {
                            for victim in engine.trim_to_count(usize::from(n)) {
                                model.remove(victim.key());
                            }
                        },
                        Op::TrimCost(c) => {
                            for victim in engine.trim_to_cost(u64::from(c)) {
                                model.remove(victim.key());
                            }
                            prop_assert!(engine.total_cost() <= u64::from(c));
                        },
                    }
                    prop_assert_eq!(engine.total_count(), model.len());
                    prop_assert_eq!(engine.total_cost(), model.values().sum::<u64>());
                    prop_assert!(engine.check_invariants().is_ok());
                }
            }

            /// trim_to_count(n) keeps exactly the n most recently used keys.
            #[cfg_attr(miri, ignore)]
            #[test]
            fn prop_trim_to_count_keeps_mru_prefix(
                keys in prop::collection::vec(0u8..64, 0..100),
                n in 0usize..40
            ) {
                let now = Instant::now();
                let mut engine: LruEngine<u8, u8> = LruEngine::new();
                for &k in &keys {
                    engine.insert(k, Arc::new(k), 0, now);
                }
                let before: Vec<u8> = engine.keys().copied().collect();
                let victims = engine.trim_to_count(n);
                let after: Vec<u8> = engine.keys().copied().collect();

                prop_assert_eq!(after.len(), n.min(before.len()));
                prop_assert_eq!(&after[..], &before[..after.len()]);
                let evicted: Vec<u8> = victims.iter().map(|e| *e.key()).collect();
                let expected: Vec<u8> = before[after.len()..].iter().rev().copied().collect();
                prop_assert_eq!(evicted, expected);
            }
        }
    }
}
