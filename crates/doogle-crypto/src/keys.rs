//! Node key generation

use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use std::fmt;

/// A node's Ed25519 key pair
///
/// Only the public half is published, as part of the node certificate.
#[derive(Clone)]
pub struct NodeKeypair {
    signing_key: SigningKey,
}

impl NodeKeypair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        NodeKeypair {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Restore a key pair from its 32-byte secret
    pub fn from_secret_bytes(secret: &[u8; 32]) -> Self {
        NodeKeypair {
            signing_key: SigningKey::from_bytes(secret),
        }
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Export the public key as bytes
    pub fn public_key_bytes(&self) -> Vec<u8> {
        self.verifying_key().to_bytes().to_vec()
    }
}

impl fmt::Debug for NodeKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeKeypair")
            .field("public_key", &hex::encode(self.public_key_bytes()))
            .finish()
    }
}
