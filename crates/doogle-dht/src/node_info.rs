//! Peer contact information for the routing table

use doogle_crypto::DoogleAddress;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::Result;
use crate::operations::NodeInfo;

/// Get current timestamp
pub(crate) fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// A known peer: where it lives in address space and how to reach it
///
/// Created or refreshed whenever a certificate from the peer verifies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerContact {
    /// Peer doogle address
    pub address: DoogleAddress,

    /// `host:port` the peer listens on
    pub network_address: String,

    /// Last time the peer was seen (Unix timestamp)
    pub last_seen: u64,
}

impl PeerContact {
    pub fn new(address: DoogleAddress, network_address: impl Into<String>) -> Self {
        PeerContact {
            address,
            network_address: network_address.into(),
            last_seen: now(),
        }
    }

    /// Record that the peer was seen just now
    pub fn touch(&mut self) {
        self.last_seen = now();
    }

    /// XOR distance to a target address
    pub fn distance_to(&self, target: &DoogleAddress) -> DoogleAddress {
        self.address.xor(target)
    }

    /// Wire form sent in FIND_NODE replies
    pub fn to_wire(&self) -> NodeInfo {
        NodeInfo {
            doogle_address: self.address.as_bytes().to_vec(),
            network_address: self.network_address.clone(),
        }
    }

    /// Contact from a FIND_NODE reply entry
    pub fn from_wire(info: &NodeInfo) -> Result<Self> {
        let address = DoogleAddress::from_slice(&info.doogle_address)?;
        Ok(Self::new(address, info.network_address.clone()))
    }
}
