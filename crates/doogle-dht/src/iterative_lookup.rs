//! Iterative FIND_NODE lookup state
//!
//! The walk queries the local node's own table each round, feeds every
//! returned contact back into the routing table and stops once a round brings
//! nothing new. This module only tracks the round-to-round state; the driver
//! loop lives in [`crate::node::Node::lookup`].

use doogle_crypto::DoogleAddress;
use std::collections::HashSet;

use crate::node_info::PeerContact;
use crate::MAX_LOOKUP_ITERATIONS;

/// What a single round told us
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundOutcome {
    /// Contacts not returned by the previous round
    pub new_contacts: usize,

    /// Contacts already returned by the previous round
    pub duplicates: usize,

    /// No new contacts; the walk is done
    pub converged: bool,
}

/// Manages iterative lookup state
#[derive(Debug, Clone)]
pub struct IterativeLookup {
    /// Address we're looking for
    target: DoogleAddress,

    /// Network addresses returned by the previous round
    previous: HashSet<String>,

    /// Contacts returned by the latest round
    latest: Vec<PeerContact>,

    /// Maximum number of rounds before giving up
    max_rounds: usize,

    /// Current round number
    current_round: usize,

    converged: bool,
}

impl IterativeLookup {
    /// Create a new iterative lookup
    pub fn new(target: DoogleAddress) -> Self {
        Self::with_max_rounds(target, MAX_LOOKUP_ITERATIONS)
    }

    pub fn with_max_rounds(target: DoogleAddress, max_rounds: usize) -> Self {
        IterativeLookup {
            target,
            previous: HashSet::new(),
            latest: Vec::new(),
            max_rounds,
            current_round: 0,
            converged: false,
        }
    }

    pub fn target(&self) -> &DoogleAddress {
        &self.target
    }

    /// Whether the previous round already returned this network address
    pub fn seen_last_round(&self, network_address: &str) -> bool {
        self.previous.contains(network_address)
    }

    /// Record the contacts one round returned
    ///
    /// Contacts are compared with the previous round by network address. A
    /// round whose every contact was already seen last round converges the
    /// walk, which covers an empty result and a bucket smaller than alpha.
    pub fn observe_round(&mut self, contacts: Vec<PeerContact>) -> RoundOutcome {
        self.current_round += 1;

        let duplicates = contacts
            .iter()
            .filter(|c| self.previous.contains(&c.network_address))
            .count();
        let new_contacts = contacts.len() - duplicates;

        self.previous = contacts.iter().map(|c| c.network_address.clone()).collect();
        self.latest = contacts;
        self.converged = new_contacts == 0;

        RoundOutcome {
            new_contacts,
            duplicates,
            converged: self.converged,
        }
    }

    /// Check if the lookup is complete
    pub fn is_complete(&self) -> bool {
        self.converged || self.current_round >= self.max_rounds
    }

    /// Contacts returned by the latest round
    pub fn closest(&self) -> &[PeerContact] {
        &self.latest
    }

    /// Finish the walk, yielding the latest round's contacts
    pub fn into_closest(self) -> Vec<PeerContact> {
        self.latest
    }

    /// Get statistics about the lookup
    pub fn stats(&self) -> LookupStats {
        LookupStats {
            rounds: self.current_round,
            returned: self.latest.len(),
            converged: self.converged,
        }
    }
}

/// Statistics about a lookup operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookupStats {
    pub rounds: usize,
    pub returned: usize,
    pub converged: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(id: u8) -> PeerContact {
        PeerContact::new(
            DoogleAddress::from_bytes([id; 20]),
            format!("10.0.0.{}:4000", id),
        )
    }

    #[test]
    fn test_empty_round_converges_immediately() {
        let mut lookup = IterativeLookup::new(DoogleAddress::from_bytes([1u8; 20]));
        assert!(!lookup.is_complete());

        let outcome = lookup.observe_round(Vec::new());
        assert!(outcome.converged);
        assert!(lookup.is_complete());
        assert!(lookup.into_closest().is_empty());
    }

    #[test]
    fn test_repeated_full_set_converges_on_second_round() {
        let mut lookup = IterativeLookup::new(DoogleAddress::default());

        let first = lookup.observe_round(vec![contact(1), contact(2), contact(3)]);
        assert_eq!(first.new_contacts, 3);
        assert!(!lookup.is_complete());
        assert!(lookup.seen_last_round("10.0.0.2:4000"));
        assert!(!lookup.seen_last_round("10.0.0.9:4000"));

        let second = lookup.observe_round(vec![contact(1), contact(2), contact(3)]);
        assert_eq!(second.duplicates, 3);
        assert!(second.converged);
        assert_eq!(lookup.stats().rounds, 2);
        assert_eq!(lookup.closest().len(), 3);
    }

    #[test]
    fn test_smaller_than_alpha_still_converges() {
        let mut lookup = IterativeLookup::new(DoogleAddress::default());
        lookup.observe_round(vec![contact(7)]);
        let outcome = lookup.observe_round(vec![contact(7)]);
        assert!(outcome.converged);
    }

    #[test]
    fn test_changed_set_keeps_walking() {
        let mut lookup = IterativeLookup::new(DoogleAddress::default());
        lookup.observe_round(vec![contact(1), contact(2), contact(3)]);

        let outcome = lookup.observe_round(vec![contact(1), contact(2), contact(4)]);
        assert_eq!(outcome.new_contacts, 1);
        assert_eq!(outcome.duplicates, 2);
        assert!(!lookup.is_complete());

        let ids: Vec<u8> = lookup
            .closest()
            .iter()
            .map(|c| c.address.as_bytes()[0])
            .collect();
        assert_eq!(ids, vec![1, 2, 4]);
    }

    #[test]
    fn test_round_ceiling() {
        let mut lookup = IterativeLookup::with_max_rounds(DoogleAddress::default(), 2);
        lookup.observe_round(vec![contact(1)]);
        lookup.observe_round(vec![contact(2)]);
        assert!(lookup.is_complete());
        assert!(!lookup.stats().converged);
    }
}
