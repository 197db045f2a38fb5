//! Item store: crawled page metadata by item address

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use doogle_crypto::DoogleAddress;

/// A crawled page as stored on a responsible node
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    /// SHA-1 of the URL
    pub address: DoogleAddress,

    pub url: String,

    pub title: String,

    pub description: String,

    /// Addresses of the outgoing links
    pub edges: Vec<DoogleAddress>,

    /// Node-local PageRank score; never overwritten by a re-store
    pub local_rank: f64,
}

impl Item {
    /// Build an item from a page, hashing the URL and outgoing links
    pub fn new<S: AsRef<str>>(
        url: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        edges: &[S],
    ) -> Self {
        let url = url.into();
        Item {
            address: DoogleAddress::hash_of(&url),
            url,
            title: title.into(),
            description: description.into(),
            edges: edges
                .iter()
                .map(|edge| DoogleAddress::hash_of(edge.as_ref()))
                .collect(),
            local_rank: 0.0,
        }
    }
}

/// Concurrent item store
#[derive(Debug, Default)]
pub struct ItemStore {
    items: DashMap<DoogleAddress, Item>,
}

impl ItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an item, keeping the stored local rank
    ///
    /// Returns true when the address was new. The read of the old rank and
    /// the write happen under the same shard lock.
    pub fn upsert(&self, mut item: Item) -> bool {
        match self.items.entry(item.address) {
            Entry::Occupied(mut existing) => {
                item.local_rank = existing.get().local_rank;
                existing.insert(item);
                false
            }
            Entry::Vacant(vacant) => {
                vacant.insert(item);
                true
            }
        }
    }

    /// Set the local rank of a stored item; false when the item is unknown
    pub fn set_rank(&self, address: &DoogleAddress, rank: f64) -> bool {
        match self.items.get_mut(address) {
            Some(mut item) => {
                item.local_rank = rank;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, address: &DoogleAddress) -> Option<Item> {
        self.items.get(address).map(|item| item.value().clone())
    }

    pub fn contains(&self, address: &DoogleAddress) -> bool {
        self.items.contains_key(address)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
