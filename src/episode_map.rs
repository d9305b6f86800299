//! Collision-safe keyed container for source files and destination episodes.
//!
//! Every item carries an optional episode number.
//! Items with a unique number live in `matches`,
//! everything else (no number, or a number that is already taken) goes to `overflow`.
//! None of the operations can fail: malformed input is diverted, never rejected.

use std::collections::BTreeMap;
use std::path::Path;

/// An item that can be stored in an [`EpisodeMap`].
pub trait Keyed {
    /// Episode number of this item, `None` when unresolved.
    fn key(&self) -> Option<u32>;

    /// Replace the episode number.
    fn set_key(&mut self, key: Option<u32>);
}

/// An item that is backed by a file on disk and can be located by its filename.
pub trait FileBacked {
    fn path(&self) -> &Path;
}

/// Keyed container with unique keys in `matches` and the rest in `overflow`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeMap<T> {
    matches: BTreeMap<u32, T>,
    overflow: Vec<T>,
}

impl<T> Default for EpisodeMap<T> {
    fn default() -> Self {
        Self {
            matches: BTreeMap::new(),
            overflow: Vec::new(),
        }
    }
}

impl<T: Keyed> EpisodeMap<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an item.
    ///
    /// Items without a key are appended to the overflow.
    /// If the key is already taken, the first inserted item keeps the slot
    /// and the new item goes to the overflow with its key cleared.
    pub fn insert(&mut self, mut item: T) {
        match item.key() {
            None => self.overflow.push(item),
            Some(key) if self.matches.contains_key(&key) => {
                item.set_key(None);
                self.overflow.push(item);
            }
            Some(key) => {
                self.matches.insert(key, item);
            }
        }
    }

    /// Items with a unique key, ordered by key.
    #[must_use]
    pub const fn matches(&self) -> &BTreeMap<u32, T> {
        &self.matches
    }

    /// Items without a key or with a collided key, in insertion order.
    #[must_use]
    pub fn overflow(&self) -> &[T] {
        &self.overflow
    }

    #[must_use]
    pub fn get(&self, key: u32) -> Option<&T> {
        self.matches.get(&key)
    }

    #[must_use]
    pub fn contains_key(&self, key: u32) -> bool {
        self.matches.contains_key(&key)
    }

    /// Total number of items in both buckets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.matches.len() + self.overflow.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty() && self.overflow.is_empty()
    }

    /// Iterate over all items: matches by key first, then the overflow.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.matches.values().chain(self.overflow.iter())
    }
}

impl<T: Keyed + FileBacked> EpisodeMap<T> {
    /// Move the item with the given filename to a new key.
    ///
    /// An item already holding `new_key` is evicted to the overflow with its key cleared.
    /// Does nothing if the filename is not found or the item already has `new_key`.
    pub fn reassign_key(&mut self, new_key: Option<u32>, filename: &Path) {
        let Some(mut item) = self.take_by_filename(filename, new_key) else {
            return;
        };

        if let Some(key) = new_key
            && let Some(mut occupant) = self.matches.remove(&key)
        {
            occupant.set_key(None);
            self.overflow.push(occupant);
        }

        item.set_key(new_key);
        self.insert(item);
    }

    /// Remove the item with the given filename from wherever it resides.
    pub fn remove_by_filename(&mut self, filename: &Path) {
        let matched_key = self
            .matches
            .iter()
            .find(|(_, item)| item.path() == filename)
            .map(|(key, _)| *key);

        if let Some(key) = matched_key {
            self.matches.remove(&key);
        } else {
            self.overflow.retain(|item| item.path() != filename);
        }
    }

    /// Find an item by its filename.
    #[must_use]
    pub fn find_by_filename(&self, filename: &Path) -> Option<&T> {
        self.iter().find(|item| item.path() == filename)
    }

    /// Detach the item with the given filename unless it already holds `new_key`.
    fn take_by_filename(&mut self, filename: &Path, new_key: Option<u32>) -> Option<T> {
        if let Some(key) = self
            .matches
            .iter()
            .find(|(_, item)| item.path() == filename)
            .map(|(key, _)| *key)
        {
            if Some(key) == new_key {
                return None;
            }
            return self.matches.remove(&key);
        }

        let index = self.overflow.iter().position(|item| item.path() == filename)?;
        if new_key.is_none() {
            // Overflow items are always unresolved already
            return None;
        }
        Some(self.overflow.remove(index))
    }
}

impl<T: Keyed> FromIterator<T> for EpisodeMap<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut map = Self::new();
        for item in iter {
            map.insert(item);
        }
        map
    }
}

impl<T: Keyed> Extend<T> for EpisodeMap<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.insert(item);
        }
    }
}
