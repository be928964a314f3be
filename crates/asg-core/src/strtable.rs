//! String interning for node attributes.
//!
//! A [`StringTable`] maps small integer [`Key`]s to owned strings and dedups
//! storage: interning the same text twice yields the same key. Entries are
//! never removed while the table lives, so a key held by a node stays valid.
//!
//! Persisting a graph only writes the strings actually referenced by saved
//! nodes; the codec flags those with [`StringTable::mark_for_save`] and then
//! writes [`StringTable::marked`]. Loading goes through
//! [`StringTable::restore`], which keeps the saved key when it can and
//! records an old→new [`KeyRemap`] otherwise (e.g. when several saved graphs
//! are merged into one table).

use std::collections::{BTreeMap, HashMap};

use crate::id::Key;

#[derive(Debug, Clone)]
struct Entry {
    text: String,
    save: bool,
}

/// Interning table for attribute strings.
#[derive(Debug, Clone, Default)]
pub struct StringTable {
    /// Entries indexed by key, ordered for deterministic output.
    entries: BTreeMap<Key, Entry>,
    /// Reverse lookup from text to key.
    lookup: HashMap<String, Key>,
    /// Next key to hand out. Key 0 is the empty string.
    next: u32,
}

/// Mapping from keys of one table to keys of another.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyRemap {
    map: HashMap<Key, Key>,
}

impl KeyRemap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the new key for `old`. The empty key always maps to itself.
    pub fn get(&self, old: Key) -> Option<Key> {
        if old.is_empty() {
            return Some(Key::EMPTY);
        }
        self.map.get(&old).copied()
    }

    pub fn insert(&mut self, old: Key, new: Key) {
        self.map.insert(old, new);
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Returns `true` if every recorded key maps to itself.
    pub fn is_identity(&self) -> bool {
        self.map.iter().all(|(old, new)| old == new)
    }
}

impl StringTable {
    pub fn new() -> Self {
        StringTable {
            entries: BTreeMap::new(),
            lookup: HashMap::new(),
            next: 1,
        }
    }

    /// Interns `text`, returning its key. The empty string is always [`Key::EMPTY`].
    pub fn intern(&mut self, text: &str) -> Key {
        if text.is_empty() {
            return Key::EMPTY;
        }
        if let Some(&key) = self.lookup.get(text) {
            return key;
        }
        let key = self.free_key();
        self.next = key.0.saturating_add(1);
        self.insert_entry(key, text);
        key
    }

    /// The next unused key. Restored keys may sit anywhere in the key space,
    /// so when `next` is taken the lowest gap is used instead.
    fn free_key(&self) -> Key {
        let next = Key(self.next.max(1));
        if !self.entries.contains_key(&next) {
            return next;
        }
        let mut candidate = 1u32;
        for key in self.entries.keys() {
            if key.0 != candidate {
                break;
            }
            candidate = candidate.saturating_add(1);
        }
        Key(candidate)
    }

    /// Looks up the text of `key`.
    pub fn get(&self, key: Key) -> Option<&str> {
        if key.is_empty() {
            return Some("");
        }
        self.entries.get(&key).map(|e| e.text.as_str())
    }

    /// Returns the key of `text` without inserting it.
    pub fn key_of(&self, text: &str) -> Option<Key> {
        if text.is_empty() {
            return Some(Key::EMPTY);
        }
        self.lookup.get(text).copied()
    }

    /// Returns `true` if `key` resolves in this table.
    pub fn contains(&self, key: Key) -> bool {
        key.is_empty() || self.entries.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates all entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (Key, &str)> + '_ {
        self.entries.iter().map(|(k, e)| (*k, e.text.as_str()))
    }

    /// Flags `key` to be written by the next save. Unknown keys are ignored.
    pub fn mark_for_save(&mut self, key: Key) {
        if let Some(entry) = self.entries.get_mut(&key) {
            entry.save = true;
        }
    }

    /// Clears every save flag.
    pub fn clear_save_marks(&mut self) {
        for entry in self.entries.values_mut() {
            entry.save = false;
        }
    }

    /// Iterates the entries flagged for saving, in key order.
    pub fn marked(&self) -> impl Iterator<Item = (Key, &str)> + '_ {
        self.entries
            .iter()
            .filter(|(_, e)| e.save)
            .map(|(k, e)| (*k, e.text.as_str()))
    }

    /// Restores a saved `(key, text)` pair, recording the key it ended up
    /// under in `remap`.
    ///
    /// The saved key is kept when this table does not know the text yet and
    /// the key is free, so loading into a fresh table reproduces the original
    /// keys. Otherwise the text is interned normally.
    pub fn restore(&mut self, key: Key, text: &str, remap: &mut KeyRemap) -> Key {
        let new_key = if key.is_empty() || text.is_empty() {
            Key::EMPTY
        } else if let Some(&existing) = self.lookup.get(text) {
            existing
        } else if !self.entries.contains_key(&key) {
            self.insert_entry(key, text);
            self.next = self.next.max(key.0.saturating_add(1));
            key
        } else {
            self.intern(text)
        };
        remap.insert(key, new_key);
        new_key
    }

    /// Copies the text of `key` into `target`, memoizing the mapping in `remap`.
    ///
    /// Returns `None` if `key` is not part of this table.
    pub fn transfer(&self, key: Key, target: &mut StringTable, remap: &mut KeyRemap) -> Option<Key> {
        if let Some(mapped) = remap.get(key) {
            return Some(mapped);
        }
        let text = self.get(key)?;
        let new_key = target.intern(text);
        remap.insert(key, new_key);
        Some(new_key)
    }

    fn insert_entry(&mut self, key: Key, text: &str) {
        self.entries.insert(
            key,
            Entry {
                text: text.to_string(),
                save: false,
            },
        );
        self.lookup.insert(text.to_string(), key);
    }
}
