//! Index store: token address -> set of item addresses

use dashmap::DashMap;
use doogle_crypto::DoogleAddress;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

/// Item addresses stored under one index key
///
/// Created on first store for its key and never removed. The set has its own
/// lock so adding to one entry never blocks readers of the map.
#[derive(Debug, Default)]
pub struct IndexEntry {
    items: Mutex<HashSet<DoogleAddress>>,
}

impl IndexEntry {
    /// Add an item address; returns false when it was already present
    pub fn add(&self, item: DoogleAddress) -> bool {
        self.items.lock().insert(item)
    }

    pub fn contains(&self, item: &DoogleAddress) -> bool {
        self.items.lock().contains(item)
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Snapshot of the item addresses, in no particular order
    pub fn items(&self) -> Vec<DoogleAddress> {
        self.items.lock().iter().copied().collect()
    }
}

/// Concurrent index store
#[derive(Debug, Default)]
pub struct IndexStore {
    entries: DashMap<DoogleAddress, Arc<IndexEntry>>,
}

impl IndexStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry for `key`, created if absent
    ///
    /// Concurrent callers for the same fresh key all get the same entry.
    pub fn entry(&self, key: DoogleAddress) -> Arc<IndexEntry> {
        self.entries.entry(key).or_default().clone()
    }

    /// Record that `item` is indexed under `key`
    ///
    /// Idempotent; returns false when the pair was already stored.
    pub fn add(&self, key: DoogleAddress, item: DoogleAddress) -> bool {
        // Shard guard is released before the entry lock is taken
        let entry = self.entry(key);
        entry.add(item)
    }

    pub fn get(&self, key: &DoogleAddress) -> Option<Arc<IndexEntry>> {
        self.entries.get(key).map(|e| Arc::clone(e.value()))
    }

    /// Snapshot of the items stored under `key`
    pub fn item_addresses(&self, key: &DoogleAddress) -> Vec<DoogleAddress> {
        self.get(key).map(|e| e.items()).unwrap_or_default()
    }

    /// Number of index keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_creates_entry() {
        let store = IndexStore::new();
        let key = DoogleAddress::hash_of("rust");
        let item = DoogleAddress::hash_of("http://rust-lang.org");

        assert!(store.add(key, item));
        assert_eq!(store.len(), 1);
        assert_eq!(store.item_addresses(&key), vec![item]);
    }

    #[test]
    fn test_add_is_idempotent() {
        let store = IndexStore::new();
        let key = DoogleAddress::hash_of("rust");
        let item = DoogleAddress::hash_of("http://rust-lang.org");

        assert!(store.add(key, item));
        assert!(!store.add(key, item));
        assert_eq!(store.get(&key).unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_key() {
        let store = IndexStore::new();
        assert!(store.get(&DoogleAddress::hash_of("none")).is_none());
        assert!(store.item_addresses(&DoogleAddress::hash_of("none")).is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn test_concurrent_first_store_shares_entry() {
        let store = Arc::new(IndexStore::new());
        let key = DoogleAddress::hash_of("shared");

        let handles: Vec<_> = (0..16u8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for j in 0..32u8 {
                        store.add(key, DoogleAddress::from_bytes([i; 20]));
                        store.add(key, DoogleAddress::from_bytes([j; 20]));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len(), 1);
        // 0..32 covers every thread id
        assert_eq!(store.get(&key).unwrap().len(), 32);
    }
}
