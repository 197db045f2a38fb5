//! K-bucket implementation for the routing table

use doogle_crypto::DoogleAddress;
use std::collections::{BTreeMap, HashMap};

use crate::node_info::{now, PeerContact};
use crate::K;

/// What an insert did to the bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BucketUpdate {
    /// Contact was already present; timestamp bumped and moved to the tail
    Refreshed,
    /// Contact appended into spare capacity
    Inserted,
    /// Bucket was full; the head was evicted to make room
    Evicted(PeerContact),
}

/// A k-bucket for storing contacts at one XOR distance bit-index
///
/// Contacts are kept in recency order, least recently seen first. Each
/// contact is keyed by a monotonically increasing sequence number so moving
/// one to the tail is a remove and insert instead of a shift.
#[derive(Debug, Clone)]
pub struct KBucket {
    /// Bucket index (0-159)
    pub index: usize,

    /// Maximum number of contacts
    capacity: usize,

    /// Contacts by recency sequence, oldest first
    contacts: BTreeMap<u64, PeerContact>,

    /// Recency sequence of each contact, by address
    positions: HashMap<DoogleAddress, u64>,

    next_seq: u64,

    /// Last time this bucket was updated
    pub last_updated: u64,
}

impl KBucket {
    /// Create a new k-bucket holding up to [`K`] contacts
    pub fn new(index: usize) -> Self {
        Self::with_capacity(index, K)
    }

    pub fn with_capacity(index: usize, capacity: usize) -> Self {
        KBucket {
            index,
            capacity,
            contacts: BTreeMap::new(),
            positions: HashMap::with_capacity(capacity),
            next_seq: 0,
            last_updated: 0,
        }
    }

    /// Get number of contacts in bucket
    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.contacts.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Find contact by address
    pub fn find_node(&self, address: &DoogleAddress) -> Option<&PeerContact> {
        self.positions
            .get(address)
            .and_then(|seq| self.contacts.get(seq))
    }

    pub fn contains(&self, address: &DoogleAddress) -> bool {
        self.positions.contains_key(address)
    }

    /// Least recently seen contact
    pub fn oldest(&self) -> Option<&PeerContact> {
        self.contacts.values().next()
    }

    /// Contacts in recency order, least recently seen first
    pub fn iter(&self) -> impl Iterator<Item = &PeerContact> {
        self.contacts.values()
    }

    /// Snapshot of the contacts, least recently seen first
    pub fn contacts(&self) -> Vec<PeerContact> {
        self.contacts.values().cloned().collect()
    }

    fn push_back(&mut self, contact: PeerContact) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.positions.insert(contact.address, seq);
        self.contacts.insert(seq, contact);
    }

    fn pop_front(&mut self) -> Option<PeerContact> {
        let (_, head) = self.contacts.pop_first()?;
        self.positions.remove(&head.address);
        Some(head)
    }

    /// Add or refresh a contact
    ///
    /// A known contact gets its timestamp bumped and moves to the tail. A new
    /// contact is appended; if the bucket is full the head (oldest) contact is
    /// evicted first. There is no liveness check before eviction.
    pub fn add_or_update(&mut self, contact: PeerContact) -> BucketUpdate {
        self.last_updated = now();

        if let Some(seq) = self.positions.remove(&contact.address) {
            if let Some(mut existing) = self.contacts.remove(&seq) {
                existing.touch();
                self.push_back(existing);
                return BucketUpdate::Refreshed;
            }
        }

        let mut contact = contact;
        contact.touch();

        if !self.is_full() {
            self.push_back(contact);
            return BucketUpdate::Inserted;
        }

        let evicted = self.pop_front();
        self.push_back(contact);
        match evicted {
            Some(head) => BucketUpdate::Evicted(head),
            None => BucketUpdate::Inserted,
        }
    }

    /// Up to `count` contacts closest to `target`
    ///
    /// When the bucket holds at most `count` contacts they are returned as
    /// they are, in recency order. Otherwise the `count` contacts with the
    /// smallest XOR distance to `target`, nearest first.
    pub fn closest_to(&self, target: &DoogleAddress, count: usize) -> Vec<PeerContact> {
        if self.len() <= count {
            return self.contacts();
        }

        let mut sorted = self.contacts();
        sorted.sort_by_key(|contact| contact.distance_to(target));
        sorted.truncate(count);
        sorted
    }
}
