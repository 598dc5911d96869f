//! Ordered map with a stateful traversal cursor.
//!
//! A thin layer over a balanced tree that adds the cursor discipline the
//! rest of the engine relies on: a per-map current position that survives
//! mutation, is invalidated only by deletion of the current node (in which
//! case it advances to the successor), and drives cooperative traversal
//! loops. One generic covers the string-, integer- and address-keyed
//! variants through the key type.

use std::collections::BTreeMap;
use std::ops::Bound;

/// Ordered map keyed by any `Ord + Clone` type, carrying a traversal cursor.
///
/// All keyed operations are O(log n); traversal is O(n).
/// The map owns its keys and values.
#[derive(Debug, Clone)]
pub struct OrdMap<K: Ord + Clone, V> {
    map: BTreeMap<K, V>,
    /// Current traversal position. `None` means "beyond end".
    cursor: Option<K>,
}

impl<K: Ord + Clone, V> Default for OrdMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + Clone, V> OrdMap<K, V> {
    /// Creates an empty map with the cursor beyond end.
    pub fn new() -> Self {
        Self {
            map: BTreeMap::new(),
            cursor: None,
        }
    }

    /// Number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns true when the map holds no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Inserts `value` under `key`, returning the previous value if any.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        self.map.insert(key, value)
    }

    /// Removes `key`. If the cursor sat on it, the cursor advances to the
    /// successor entry.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        if self.cursor.as_ref() == Some(key) {
            self.cursor = self.successor_key(key);
        }
        self.map.remove(key)
    }

    /// Looks up `key`.
    #[inline]
    pub fn get(&self, key: &K) -> Option<&V> {
        self.map.get(key)
    }

    /// Looks up `key` mutably.
    #[inline]
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.map.get_mut(key)
    }

    /// Returns true if `key` is present.
    #[inline]
    pub fn contains_key(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    /// Smallest key in the map.
    pub fn first_key(&self) -> Option<&K> {
        self.map.keys().next()
    }

    /// Largest key in the map.
    pub fn last_key(&self) -> Option<&K> {
        self.map.keys().next_back()
    }

    // ---------------------------------------------------------------------
    // CURSOR
    // ---------------------------------------------------------------------

    /// Moves the cursor to the first entry and returns it.
    pub fn cursor_first(&mut self) -> Option<(&K, &V)> {
        self.cursor = self.map.keys().next().cloned();
        self.cursor_entry()
    }

    /// Moves the cursor to the last entry and returns it.
    pub fn cursor_last(&mut self) -> Option<(&K, &V)> {
        self.cursor = self.map.keys().next_back().cloned();
        self.cursor_entry()
    }

    /// Advances the cursor to the next entry in key order.
    ///
    /// Returns `None` once the cursor moves beyond the last entry; the
    /// cursor then reads as beyond-end until repositioned.
    pub fn cursor_next(&mut self) -> Option<(&K, &V)> {
        let cur = self.cursor.take()?;
        self.cursor = self.successor_key(&cur);
        self.cursor_entry()
    }

    /// Steps the cursor back to the previous entry in key order.
    pub fn cursor_prev(&mut self) -> Option<(&K, &V)> {
        let cur = self.cursor.take()?;
        self.cursor = self
            .map
            .range((Bound::Unbounded, Bound::Excluded(cur)))
            .next_back()
            .map(|(k, _)| k.clone());
        self.cursor_entry()
    }

    /// Positions the cursor on `key` if present.
    pub fn cursor_goto(&mut self, key: &K) -> bool {
        if self.map.contains_key(key) {
            self.cursor = Some(key.clone());
            true
        } else {
            false
        }
    }

    /// True when the cursor has run past the final entry (or was never set).
    #[inline]
    pub fn cursor_beyond_end(&self) -> bool {
        self.cursor.is_none()
    }

    /// Key under the cursor.
    pub fn cursor_key(&self) -> Option<&K> {
        self.cursor.as_ref()
    }

    /// Entry under the cursor.
    pub fn cursor_entry(&self) -> Option<(&K, &V)> {
        let key = self.cursor.as_ref()?;
        self.map.get_key_value(key)
    }

    /// Value under the cursor, mutably.
    pub fn cursor_value_mut(&mut self) -> Option<&mut V> {
        let key = self.cursor.clone()?;
        self.map.get_mut(&key)
    }

    /// Removes the entry under the cursor, advancing it to the successor.
    pub fn remove_at_cursor(&mut self) -> Option<(K, V)> {
        let key = self.cursor.clone()?;
        self.cursor = self.successor_key(&key);
        self.map.remove_entry(&key)
    }

    /// In-order iteration, independent of the cursor.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.map.iter()
    }

    /// In-order key iteration.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.map.keys()
    }

    fn successor_key(&self, key: &K) -> Option<K> {
        self.map
            .range((Bound::Excluded(key.clone()), Bound::Unbounded))
            .next()
            .map(|(k, _)| k.clone())
    }
}

impl<V> OrdMap<u32, V> {
    /// Appends `value` under the next free integer key and returns the key.
    pub fn append(&mut self, value: V) -> u32 {
        let key = self.last_key().map_or(0, |k| k + 1);
        self.map.insert(key, value);
        key
    }
}

impl<V> OrdMap<u64, V> {
    /// Appends `value` under the next free integer key and returns the key.
    pub fn append(&mut self, value: V) -> u64 {
        let key = self.last_key().map_or(0, |k| k + 1);
        self.map.insert(key, value);
        key
    }
}

impl<K: Ord + Clone, V: AsRef<str>> OrdMap<K, V> {
    /// Sequential scan for the first entry whose value starts with `prefix`.
    pub fn search_by_value_prefix(&self, prefix: &str) -> Option<(&K, &V)> {
        self.map.iter().find(|(_, v)| v.as_ref().starts_with(prefix))
    }
}
