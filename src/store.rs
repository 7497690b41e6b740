use std::collections::HashMap;

use crate::zset::SortedSet;

/// The key space. Owned by the event loop and only ever touched from that thread, so it carries no
/// locking of its own.
#[derive(Debug, Default)]
pub struct Store {
    keys: HashMap<String, SortedSet>,
}

impl Store {
    pub fn new() -> Store {
        Store::default()
    }

    pub fn zset(&self, key: &str) -> Option<&SortedSet> {
        self.keys.get(key)
    }

    pub fn zset_mut(&mut self, key: &str) -> Option<&mut SortedSet> {
        self.keys.get_mut(key)
    }

    /// Returns the sorted set at `key`, creating an empty one if needed.
    pub fn zset_or_default(&mut self, key: &str) -> &mut SortedSet {
        self.keys.entry(key.to_string()).or_default()
    }

    /// Drops `key` if its sorted set has no members left. Returns whether the key was removed.
    pub fn remove_if_empty(&mut self, key: &str) -> bool {
        if self.keys.get(key).is_some_and(SortedSet::is_empty) {
            self.keys.remove(key);
            return true;
        }
        false
    }

}
