//! Recency-ordered doubly linked list of cache entries, backed by `SlotArena`.
//!
//! Entries are stored in a [`SlotArena`] and linked through the `prev`/`next`
//! handles carried by each [`Entry`], giving O(1) insert, unlink and
//! move-to-front without owning pointers in both directions.
//!
//! ## Architecture
//!
//! ```text
//!   arena (SlotArena<Entry<K, V>>)
//!   ┌────────┬──────────────────────────────────────────────────────┐
//!   │ SlotId │ Entry { key, value, cost, last_access, prev, next }  │
//!   ├────────┼──────────────────────────────────────────────────────┤
//!   │ id_0   │ { key: "a", prev: Some(id_2), next: None }           │
//!   │ id_1   │ { key: "b", prev: None,       next: Some(id_2) }     │
//!   │ id_2   │ { key: "c", prev: Some(id_1), next: Some(id_0) }     │
//!   └────────┴──────────────────────────────────────────────────────┘
//!
//!   head ─► [id_1] ◄──► [id_2] ◄──► [id_0] ◄── tail
//!            MRU                      LRU
//! ```
//!
//! Walking from the tail visits entries in non-decreasing recency, which is
//! what lets age trimming stop at the first entry that is young enough.

use crate::ds::slot_arena::{SlotArena, SlotId};
use crate::entry::Entry;
use crate::error::InvariantError;

/// Arena-backed MRU → LRU list of [`Entry`] values.
#[derive(Debug)]
pub struct RecencyList<K, V> {
    arena: SlotArena<Entry<K, V>>,
    head: Option<SlotId>,
    tail: Option<SlotId>,
}

impl<K, V> RecencyList<K, V> {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self {
            arena: SlotArena::new(),
            head: None,
            tail: None,
        }
    }

    /// Creates an empty list with room for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            arena: SlotArena::with_capacity(capacity),
            head: None,
            tail: None,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    #[inline]
    pub fn contains(&self, id: SlotId) -> bool {
        self.arena.contains(id)
    }

    /// Handle of the most recently used entry.
    #[inline]
    pub fn front_id(&self) -> Option<SlotId> {
        self.head
    }

    /// Handle of the least recently used entry.
    #[inline]
    pub fn back_id(&self) -> Option<SlotId> {
        self.tail
    }

    /// The least recently used entry.
    #[inline]
    pub fn back(&self) -> Option<&Entry<K, V>> {
        self.tail.and_then(|id| self.arena.get(id))
    }

    #[inline]
    pub fn get(&self, id: SlotId) -> Option<&Entry<K, V>> {
        self.arena.get(id)
    }

    /// Mutable access to an entry. Callers must not touch its links.
    #[inline]
    pub fn get_mut(&mut self, id: SlotId) -> Option<&mut Entry<K, V>> {
        self.arena.get_mut(id)
    }

    /// Links `entry` in as the new head and returns its handle.
    pub fn push_front(&mut self, mut entry: Entry<K, V>) -> SlotId {
        entry.prev = None;
        entry.next = self.head;
        let id = self.arena.insert(entry);
        match self.head {
            Some(old_head) => {
                if let Some(node) = self.arena.get_mut(old_head) {
                    node.prev = Some(id);
                }
            },
            None => self.tail = Some(id),
        }
        self.head = Some(id);
        id
    }

    /// Moves an existing entry to the head; returns `false` if `id` is not present.
    pub fn move_to_front(&mut self, id: SlotId) -> bool {
        if !self.arena.contains(id) {
            return false;
        }
        if self.head == Some(id) {
            return true;
        }
        self.unlink(id);
        self.link_front(id);
        true
    }

    /// Unlinks and returns the entry at `id`, with its links cleared.
    pub fn remove(&mut self, id: SlotId) -> Option<Entry<K, V>> {
        self.unlink(id)?;
        self.arena.remove(id)
    }

    /// Unlinks and returns the least recently used entry.
    pub fn pop_back(&mut self) -> Option<Entry<K, V>> {
        let id = self.tail?;
        self.remove(id)
    }

    /// Iterates entries from MRU to LRU.
    pub fn iter(&self) -> RecencyIter<'_, K, V> {
        RecencyIter {
            list: self,
            current: self.head,
        }
    }

    /// Iterates entries from LRU to MRU.
    pub fn iter_rev(&self) -> RecencyRevIter<'_, K, V> {
        RecencyRevIter {
            list: self,
            current: self.tail,
        }
    }

    /// Walks the list in both directions and checks every link.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        if self.head.is_none() || self.tail.is_none() {
            if self.head.is_some() || self.tail.is_some() || !self.arena.is_empty() {
                return Err(InvariantError::new(format!(
                    "empty list has head {:?}, tail {:?}, {} nodes",
                    self.head,
                    self.tail,
                    self.arena.len()
                )));
            }
            return Ok(());
        }

        let mut count = 0usize;
        let mut prev: Option<SlotId> = None;
        let mut current = self.head;
        while let Some(id) = current {
            let node = self
                .arena
                .get(id)
                .ok_or_else(|| InvariantError::new(format!("stale SlotId {:?} in list", id)))?;
            if node.prev != prev {
                return Err(InvariantError::new(format!(
                    "node {:?} has prev {:?}, expected {:?}",
                    id, node.prev, prev
                )));
            }
            count += 1;
            if count > self.arena.len() {
                return Err(InvariantError::new("cycle detected in recency list"));
            }
            prev = Some(id);
            current = node.next;
        }

        if prev != self.tail {
            return Err(InvariantError::new(format!(
                "walk ended at {:?} but tail is {:?}",
                prev, self.tail
            )));
        }
        if count != self.arena.len() {
            return Err(InvariantError::new(format!(
                "walked {} nodes but arena holds {}",
                count,
                self.arena.len()
            )));
        }
        Ok(())
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        if let Err(err) = self.check_invariants() {
            panic!("recency list invariant violated: {err}");
        }
    }

    fn unlink(&mut self, id: SlotId) -> Option<()> {
        let (prev, next) = {
            let node = self.arena.get(id)?;
            (node.prev, node.next)
        };

        match prev {
            Some(prev_id) => {
                if let Some(prev_node) = self.arena.get_mut(prev_id) {
                    prev_node.next = next;
                }
            },
            None => self.head = next,
        }
        match next {
            Some(next_id) => {
                if let Some(next_node) = self.arena.get_mut(next_id) {
                    next_node.prev = prev;
                }
            },
            None => self.tail = prev,
        }

        if let Some(node) = self.arena.get_mut(id) {
            node.prev = None;
            node.next = None;
        }
        Some(())
    }

    fn link_front(&mut self, id: SlotId) {
        let old_head = self.head;
        if let Some(node) = self.arena.get_mut(id) {
            node.prev = None;
            node.next = old_head;
        } else {
            return;
        }
        match old_head {
            Some(old_head) => {
                if let Some(head_node) = self.arena.get_mut(old_head) {
                    head_node.prev = Some(id);
                }
            },
            None => self.tail = Some(id),
        }
        self.head = Some(id);
    }
}

impl<K, V> Default for RecencyList<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// MRU → LRU iterator.
pub struct RecencyIter<'a, K, V> {
    list: &'a RecencyList<K, V>,
    current: Option<SlotId>,
}

impl<'a, K, V> Iterator for RecencyIter<'a, K, V> {
    type Item = &'a Entry<K, V>;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.list.arena.get(self.current?)?;
        self.current = node.next;
        Some(node)
    }
}

/// LRU → MRU iterator.
pub struct RecencyRevIter<'a, K, V> {
    list: &'a RecencyList<K, V>,
    current: Option<SlotId>,
}

impl<'a, K, V> Iterator for RecencyRevIter<'a, K, V> {
    type Item = &'a Entry<K, V>;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.list.arena.get(self.current?)?;
        self.current = node.prev;
        Some(node)
    }
}
