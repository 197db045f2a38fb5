//! Node certificates
//!
//! A certificate is a self-describing proof that its holder solved the address
//! puzzle for the claimed network address and public key. It travels with
//! every authenticated RPC and is immutable once created.

use serde::{Deserialize, Serialize};

use crate::address::DoogleAddress;
use crate::error::{CryptoError, Result};
use crate::puzzle::{check_address, new_node_address};

/// Wire form of a node's proof-of-work identity
///
/// Byte fields are kept variable-length so malformed input can be rejected
/// by [`NodeCertificate::verify`] instead of failing deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeCertificate {
    /// `host:port` the node listens on
    pub network_address: String,

    /// Claimed doogle address (20 bytes)
    pub doogle_address: Vec<u8>,

    /// Node public key
    pub public_key: Vec<u8>,

    /// Puzzle nonce
    pub nonce: Vec<u8>,

    /// Difficulty the nonce was solved for
    pub difficulty: u32,
}

impl NodeCertificate {
    /// Solve the puzzle and build a certificate for a local node
    pub fn generate(network_address: &str, public_key: &[u8], difficulty: u32) -> Result<Self> {
        let (address, nonce) = new_node_address(network_address, public_key, difficulty)?;
        Ok(NodeCertificate {
            network_address: network_address.to_string(),
            doogle_address: address.as_bytes().to_vec(),
            public_key: public_key.to_vec(),
            nonce,
            difficulty,
        })
    }

    /// The claimed address, if it is long enough to be one
    pub fn address(&self) -> Result<DoogleAddress> {
        DoogleAddress::from_slice(&self.doogle_address)
    }

    /// Verify the certificate against a local admission threshold
    ///
    /// Returns the proven address. Short addresses and claimed difficulties
    /// below `min_difficulty` are rejected before any hashing.
    pub fn verify(&self, min_difficulty: u32) -> Result<DoogleAddress> {
        let address = self.address()?;
        if self.difficulty < min_difficulty {
            return Err(CryptoError::DifficultyTooLow {
                claimed: self.difficulty,
                required: min_difficulty,
            });
        }

        check_address(
            &address,
            &self.network_address,
            &self.public_key,
            &self.nonce,
            self.difficulty,
        )?;
        Ok(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::ADDRESS_LENGTH;

    fn fixture(difficulty: u32) -> NodeCertificate {
        NodeCertificate {
            network_address: "ab:80".to_string(),
            doogle_address: vec![
                137, 247, 252, 74, 101, 232, 49, 193, 122, 237, 123, 84, 199, 94, 78, 176, 92,
                104, 69, 253,
            ],
            public_key: b"pk".to_vec(),
            nonce: vec![172, 171, 254, 98, 171, 6, 169, 186, 105, 145],
            difficulty,
        }
    }

    #[test]
    fn test_generate_and_verify() {
        let cert = NodeCertificate::generate("127.0.0.1:4000", b"key", 1).unwrap();
        assert_eq!(cert.doogle_address.len(), ADDRESS_LENGTH);
        assert_eq!(cert.verify(0).unwrap(), cert.address().unwrap());
        assert_eq!(cert.verify(1).unwrap(), cert.address().unwrap());
    }

    #[test]
    fn test_verify_fixture() {
        assert!(fixture(2).verify(0).is_ok());
        assert_eq!(
            fixture(10).verify(0).unwrap_err(),
            CryptoError::InvalidProofOfWork(10)
        );
    }

    #[test]
    fn test_verify_rejects_low_difficulty() {
        let err = fixture(2).verify(3).unwrap_err();
        assert_eq!(
            err,
            CryptoError::DifficultyTooLow {
                claimed: 2,
                required: 3
            }
        );
    }

    #[test]
    fn test_verify_rejects_short_address() {
        let mut cert = fixture(2);
        cert.doogle_address.truncate(19);
        assert!(matches!(
            cert.verify(0),
            Err(CryptoError::InvalidAddressLength { actual: 19, .. })
        ));

        let empty = NodeCertificate {
            network_address: String::new(),
            doogle_address: Vec::new(),
            public_key: Vec::new(),
            nonce: Vec::new(),
            difficulty: 10,
        };
        assert!(empty.verify(0).is_err());
    }

    #[test]
    fn test_verify_rejects_zero_address() {
        let cert = NodeCertificate {
            network_address: "localhost:1234".to_string(),
            doogle_address: vec![0u8; ADDRESS_LENGTH],
            public_key: Vec::new(),
            nonce: Vec::new(),
            difficulty: 10,
        };
        assert!(cert.verify(0).is_err());
    }
}
