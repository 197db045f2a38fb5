//! Kademlia routing table

use doogle_crypto::{DoogleAddress, ADDRESS_BITS};
use parking_lot::Mutex;

use crate::error::{DhtError, Result};
use crate::kbucket::{BucketUpdate, KBucket};
use crate::node_info::PeerContact;
use crate::K;

/// Kademlia routing table
///
/// One k-bucket per bit of address distance. Each bucket sits behind its own
/// lock, so concurrent updates landing in different buckets never contend and
/// the table is shared by reference across request handlers.
#[derive(Debug)]
pub struct RoutingTable {
    /// Our local doogle address
    local_address: DoogleAddress,

    /// 160 k-buckets (one per bit of address distance)
    buckets: Vec<Mutex<KBucket>>,
}

impl RoutingTable {
    /// Create a new routing table with [`K`]-sized buckets
    pub fn new(local_address: DoogleAddress) -> Self {
        Self::with_bucket_size(local_address, K)
    }

    pub fn with_bucket_size(local_address: DoogleAddress, bucket_size: usize) -> Self {
        let buckets: Vec<Mutex<KBucket>> = (0..ADDRESS_BITS)
            .map(|i| Mutex::new(KBucket::with_capacity(i, bucket_size)))
            .collect();
        assert_eq!(buckets.len(), ADDRESS_BITS);

        RoutingTable {
            local_address,
            buckets,
        }
    }

    /// Get our local doogle address
    pub fn local_address(&self) -> &DoogleAddress {
        &self.local_address
    }

    /// Calculate bucket index for an address
    ///
    /// Bucket index is the position of the first differing bit:
    /// - Bucket 0: MSB of first byte differs (most distant)
    /// - Bucket 159: LSB of last byte differs (closest)
    ///
    /// Returns `None` when the address equals ours.
    pub fn bucket_index(&self, address: &DoogleAddress) -> Option<usize> {
        self.local_address.xor(address).most_significant_bit()
    }

    /// Add or refresh a contact
    ///
    /// Fails with [`DhtError::AddressCollision`] when the contact claims our
    /// own address; the table is left untouched in that case.
    pub fn update(&self, contact: PeerContact) -> Result<BucketUpdate> {
        let idx = self
            .bucket_index(&contact.address)
            .ok_or(DhtError::AddressCollision)?;
        Ok(self.buckets[idx].lock().add_or_update(contact))
    }

    /// Up to `count` contacts from the bucket `target` falls into
    ///
    /// Only the single bucket at the target's index is consulted. Fails with
    /// [`DhtError::AddressCollision`] when `target` is our own address.
    pub fn closest_in_bucket(&self, target: &DoogleAddress, count: usize) -> Result<Vec<PeerContact>> {
        let idx = self
            .bucket_index(target)
            .ok_or(DhtError::AddressCollision)?;
        Ok(self.buckets[idx].lock().closest_to(target, count))
    }

    /// Find a contact by address
    pub fn find(&self, address: &DoogleAddress) -> Option<PeerContact> {
        let idx = self.bucket_index(address)?;
        self.buckets[idx].lock().find_node(address).cloned()
    }

    /// Total contacts across all buckets
    pub fn len(&self) -> usize {
        self.buckets.iter().map(|b| b.lock().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(|b| b.lock().is_empty())
    }

    /// Snapshot of every contact, ordered by bucket index
    pub fn contacts(&self) -> Vec<PeerContact> {
        self.buckets
            .iter()
            .flat_map(|b| b.lock().contacts())
            .collect()
    }

    /// Snapshot of a single bucket
    pub fn bucket(&self, index: usize) -> Option<KBucket> {
        self.buckets.get(index).map(|b| b.lock().clone())
    }

    /// Number of non-empty buckets
    pub fn active_buckets(&self) -> usize {
        self.buckets.iter().filter(|b| !b.lock().is_empty()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn address(first: u8, last: u8) -> DoogleAddress {
        let mut bytes = [0u8; 20];
        bytes[0] = first;
        bytes[19] = last;
        DoogleAddress::from_bytes(bytes)
    }

    fn contact(addr: DoogleAddress) -> PeerContact {
        PeerContact::new(addr, "127.0.0.1:4000")
    }

    #[test]
    fn test_new_routing_table() {
        let table = RoutingTable::new(address(0, 0));
        assert!(table.is_empty());
        assert_eq!(table.len(), 0);
        assert!(table.bucket(ADDRESS_BITS - 1).is_some());
        assert!(table.bucket(ADDRESS_BITS).is_none());
    }

    #[test]
    fn test_bucket_index() {
        let table = RoutingTable::new(address(0, 0));
        assert_eq!(table.bucket_index(&address(0x80, 0)), Some(0));
        assert_eq!(table.bucket_index(&address(0x01, 0)), Some(7));
        assert_eq!(table.bucket_index(&address(0, 1)), Some(159));
        assert_eq!(table.bucket_index(&address(0, 0)), None);
    }

    #[test]
    fn test_update_places_contact_in_bucket() {
        let table = RoutingTable::new(address(0, 0));
        let update = table.update(contact(address(0x01, 0))).unwrap();
        assert_eq!(update, BucketUpdate::Inserted);

        assert_eq!(table.len(), 1);
        assert_eq!(table.bucket(7).unwrap().len(), 1);
        assert!(table.find(&address(0x01, 0)).is_some());
        assert_eq!(table.active_buckets(), 1);
    }

    #[test]
    fn test_update_own_address_is_collision() {
        let local = address(0x42, 0x42);
        let table = RoutingTable::new(local);
        assert!(matches!(
            table.update(contact(local)),
            Err(DhtError::AddressCollision)
        ));
        assert!(table.is_empty());
    }

    #[test]
    fn test_bucket_never_exceeds_k() {
        let table = RoutingTable::new(address(0, 0));
        for i in 0..(K as u8 + 10) {
            // All share bucket 0
            table.update(contact(address(0x80, i))).unwrap();
        }
        assert_eq!(table.bucket(0).unwrap().len(), K);
        assert_eq!(table.len(), K);
    }

    #[test]
    fn test_contacts_leave_only_by_eviction() {
        let table = RoutingTable::new(address(0, 0));
        for i in 0..K as u8 {
            table.update(contact(address(0x80, i))).unwrap();
        }
        // Refreshing never drops anyone
        for i in 0..K as u8 {
            table.update(contact(address(0x80, i))).unwrap();
        }
        assert_eq!(table.len(), K);

        let update = table.update(contact(address(0x80, 0xff))).unwrap();
        match update {
            BucketUpdate::Evicted(head) => assert_eq!(head.address, address(0x80, 0)),
            other => panic!("Expected eviction, got {:?}", other),
        }
        assert_eq!(table.len(), K);
        assert!(table.find(&address(0x80, 0)).is_none());
        for i in 1..K as u8 {
            assert!(table.find(&address(0x80, i)).is_some());
        }
    }

    #[test]
    fn test_closest_in_bucket_reads_single_bucket() {
        let table = RoutingTable::new(address(0, 0));
        table.update(contact(address(0x80, 1))).unwrap();
        table.update(contact(address(0x40, 1))).unwrap();

        let closest = table.closest_in_bucket(&address(0x80, 7), 3).unwrap();
        assert_eq!(closest.len(), 1);
        assert_eq!(closest[0].address, address(0x80, 1));

        assert!(table.closest_in_bucket(&address(0x20, 0), 3).unwrap().is_empty());
        assert!(matches!(
            table.closest_in_bucket(&address(0, 0), 3),
            Err(DhtError::AddressCollision)
        ));
    }

    #[test]
    fn test_concurrent_updates() {
        let table = Arc::new(RoutingTable::new(address(0, 0)));
        let handles: Vec<_> = (0..8u8)
            .map(|t| {
                let table = Arc::clone(&table);
                std::thread::spawn(move || {
                    for i in 0..50u8 {
                        table.update(contact(address(1 << (t % 8), i))).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        for idx in 0..ADDRESS_BITS {
            assert!(table.bucket(idx).unwrap().len() <= K);
        }
        assert_eq!(table.len(), 8 * K);
    }
}
