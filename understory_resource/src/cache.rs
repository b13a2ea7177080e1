// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bounded cache of keys known to be missing from a dictionary's subtree.

use smallvec::SmallVec;

use crate::key::ResourceKey;
use crate::options::DEFAULT_NOT_FOUND_CACHE_CAPACITY;

/// A small FIFO set of recently missed keys.
///
/// Lookups are a linear scan; the cache is meant to stay tiny. When full, the
/// oldest entry is evicted to make room.
#[derive(Clone, Debug)]
pub(crate) struct NotFoundCache {
    keys: SmallVec<[ResourceKey; DEFAULT_NOT_FOUND_CACHE_CAPACITY]>,
    capacity: usize,
}

impl NotFoundCache {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            keys: SmallVec::new(),
            capacity,
        }
    }

    pub(crate) fn contains(&self, key: &ResourceKey) -> bool {
        self.keys.iter().any(|k| k == key)
    }

    /// Records a miss. Returns `false` if caching is disabled or the key was
    /// already recorded.
    pub(crate) fn insert(&mut self, key: ResourceKey) -> bool {
        if self.capacity == 0 || self.contains(&key) {
            return false;
        }
        if self.keys.len() >= self.capacity {
            self.keys.remove(0);
        }
        self.keys.push(key);
        true
    }

    pub(crate) fn remove(&mut self, key: &ResourceKey) -> bool {
        if let Some(pos) = self.keys.iter().position(|k| k == key) {
            self.keys.remove(pos);
            true
        } else {
            false
        }
    }

    pub(crate) fn clear(&mut self) {
        self.keys.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.keys.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;

    fn key(i: usize) -> ResourceKey {
        ResourceKey::named(&format!("Key{i}"))
    }

    #[test]
    fn evicts_oldest_when_full() {
        let mut cache = NotFoundCache::new(8);
        for i in 0..8 {
            assert!(cache.insert(key(i)));
        }
        assert_eq!(cache.len(), 8);

        assert!(cache.insert(key(8)));
        assert_eq!(cache.len(), 8);
        assert!(!cache.contains(&key(0)), "oldest entry should be evicted");
        assert!(cache.contains(&key(1)));
        assert!(cache.contains(&key(8)));
    }

    #[test]
    fn duplicate_insert_is_ignored() {
        let mut cache = NotFoundCache::new(2);
        assert!(cache.insert(key(0)));
        assert!(!cache.insert(key(0)));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn remove_and_clear() {
        let mut cache = NotFoundCache::new(4);
        cache.insert(key(0));
        cache.insert(key(1));
        assert!(cache.remove(&key(0)));
        assert!(!cache.remove(&key(0)));
        assert!(cache.contains(&key(1)));
        cache.clear();
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn zero_capacity_never_caches() {
        let mut cache = NotFoundCache::new(0);
        assert!(!cache.insert(key(0)));
        assert!(!cache.contains(&key(0)));
    }
}
