//! Doogle cryptography module
//!
//! Core identity primitives shared by every doogle node:
//! - 160-bit addresses and the XOR distance metric
//! - Proof-of-work address puzzle (Sybil resistance)
//! - Node certificates presented with every authenticated RPC
//! - Node key generation (Ed25519)

pub mod address;
pub mod certificate;
pub mod error;
pub mod keys;
pub mod puzzle;

pub use address::{DoogleAddress, ADDRESS_BITS, ADDRESS_LENGTH};
pub use certificate::NodeCertificate;
pub use error::{CryptoError, Result};
pub use keys::NodeKeypair;
pub use puzzle::{new_node_address, verify_address, NONCE_LENGTH};
