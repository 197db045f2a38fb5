//! Proof-of-work address puzzle
//!
//! A node address is bound to the node's network address and public key:
//!
//! ```text
//! address = SHA1(host || port || public_key)
//! puzzle  = SHA1(address || nonce)
//! ```
//!
//! The certificate holds when `puzzle` starts with at least `difficulty` zero
//! bytes. Solving takes ~256^difficulty hash attempts on average, verifying
//! takes two hashes.

use rand::Rng;
use sha1::{Digest, Sha1};

use crate::address::{count_leading_zero_bits, DoogleAddress, ADDRESS_LENGTH};
use crate::error::{CryptoError, Result};

/// Length of the randomly sampled puzzle nonce
pub const NONCE_LENGTH: usize = 10;

/// Identity hash input for a `host:port` network address
///
/// The final `:` separator is dropped, so `"ab:80"` hashes as `"ab80"`.
/// Addresses without a port are used as is.
pub fn canonical_network_address(network_address: &str) -> String {
    match network_address.rsplit_once(':') {
        Some((host, port)) => format!("{}{}", host, port),
        None => network_address.to_string(),
    }
}

/// Address bound to a network address and public key
pub fn identity_address(network_address: &str, public_key: &[u8]) -> DoogleAddress {
    let mut hasher = Sha1::new();
    hasher.update(canonical_network_address(network_address).as_bytes());
    hasher.update(public_key);
    let mut out = [0u8; ADDRESS_LENGTH];
    out.copy_from_slice(&hasher.finalize());
    DoogleAddress::from_bytes(out)
}

fn puzzle_holds(address: &DoogleAddress, nonce: &[u8], difficulty: u32) -> bool {
    let mut hasher = Sha1::new();
    hasher.update(address.as_bytes());
    hasher.update(nonce);
    let digest = hasher.finalize();

    count_leading_zero_bits(&digest) >= difficulty * 8
}

/// Solve the address puzzle for this node
///
/// Samples random nonces until the puzzle holds. CPU-bound and unbounded in
/// time for a feasible difficulty; run it once at startup.
pub fn new_node_address(
    network_address: &str,
    public_key: &[u8],
    difficulty: u32,
) -> Result<(DoogleAddress, Vec<u8>)> {
    if difficulty as usize > ADDRESS_LENGTH {
        return Err(CryptoError::DifficultyTooHigh {
            difficulty,
            max: ADDRESS_LENGTH,
        });
    }

    let address = identity_address(network_address, public_key);
    let mut rng = rand::thread_rng();
    let mut nonce = vec![0u8; NONCE_LENGTH];
    loop {
        rng.fill(&mut nonce[..]);
        if puzzle_holds(&address, &nonce, difficulty) {
            return Ok((address, nonce));
        }
    }
}

/// Check a claimed address against its network address, public key and nonce
///
/// Pure and deterministic.
pub fn verify_address(
    address: &DoogleAddress,
    network_address: &str,
    public_key: &[u8],
    nonce: &[u8],
    difficulty: u32,
) -> bool {
    check_address(address, network_address, public_key, nonce, difficulty).is_ok()
}

/// Like [`verify_address`] but reports which check failed
pub fn check_address(
    address: &DoogleAddress,
    network_address: &str,
    public_key: &[u8],
    nonce: &[u8],
    difficulty: u32,
) -> Result<()> {
    if difficulty as usize > ADDRESS_LENGTH {
        return Err(CryptoError::DifficultyTooHigh {
            difficulty,
            max: ADDRESS_LENGTH,
        });
    }
    if identity_address(network_address, public_key) != *address {
        return Err(CryptoError::AddressMismatch);
    }
    if !puzzle_holds(address, nonce, difficulty) {
        return Err(CryptoError::InvalidProofOfWork(difficulty));
    }
    Ok(())
}
