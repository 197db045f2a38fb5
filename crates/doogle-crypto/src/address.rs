//! Doogle addresses and the XOR distance metric
//!
//! Every node, item and index token lives in the same 160-bit address space.
//! Node addresses come out of the proof-of-work puzzle, item addresses are the
//! SHA-1 of the URL and index keys are the SHA-1 of the token string.

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::fmt;

use crate::error::{CryptoError, Result};

/// Size of a doogle address in bytes
pub const ADDRESS_LENGTH: usize = 20;

/// Size of a doogle address in bits (one routing bucket per bit)
pub const ADDRESS_BITS: usize = ADDRESS_LENGTH * 8;

/// A 160-bit identifier for a node, item or index key
///
/// Ordering is lexicographic over the bytes, most significant byte first, so
/// comparing two XOR distances with `<` compares them numerically.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct DoogleAddress([u8; ADDRESS_LENGTH]);

impl DoogleAddress {
    /// Create an address from a byte array
    pub fn from_bytes(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        DoogleAddress(bytes)
    }

    /// Create an address from a wire field
    ///
    /// Fields shorter than [`ADDRESS_LENGTH`] are rejected; longer fields
    /// contribute their first [`ADDRESS_LENGTH`] bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < ADDRESS_LENGTH {
            return Err(CryptoError::InvalidAddressLength {
                expected: ADDRESS_LENGTH,
                actual: bytes.len(),
            });
        }

        let mut arr = [0u8; ADDRESS_LENGTH];
        arr.copy_from_slice(&bytes[..ADDRESS_LENGTH]);
        Ok(DoogleAddress(arr))
    }

    /// SHA-1 address of arbitrary content (URL, token, identity input)
    pub fn hash_of(data: impl AsRef<[u8]>) -> Self {
        let digest = Sha1::digest(data.as_ref());
        let mut arr = [0u8; ADDRESS_LENGTH];
        arr.copy_from_slice(&digest);
        DoogleAddress(arr)
    }

    /// Get the bytes of this address
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }

    /// Bitwise exclusive-or, the Kademlia distance between two addresses
    pub fn xor(&self, other: &DoogleAddress) -> DoogleAddress {
        let mut out = [0u8; ADDRESS_LENGTH];
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = self.0[i] ^ other.0[i];
        }
        DoogleAddress(out)
    }

    /// Index of the most significant set bit
    ///
    /// Index 0 is the top bit of the first byte and 159 the bottom bit of the
    /// last one. Returns `None` for the all-zero value, which for a distance
    /// means the two addresses collide.
    pub fn most_significant_bit(&self) -> Option<usize> {
        self.0
            .iter()
            .enumerate()
            .find(|(_, &byte)| byte != 0)
            .map(|(byte_idx, &byte)| byte_idx * 8 + byte.leading_zeros() as usize)
    }

    /// Number of leading zero bits
    pub fn leading_zero_bits(&self) -> u32 {
        count_leading_zero_bits(&self.0)
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|e| CryptoError::SerializationError(e.to_string()))?;
        if bytes.len() != ADDRESS_LENGTH {
            return Err(CryptoError::InvalidAddressLength {
                expected: ADDRESS_LENGTH,
                actual: bytes.len(),
            });
        }
        Self::from_slice(&bytes)
    }
}

/// Count leading zero bits in a byte array
pub(crate) fn count_leading_zero_bits(data: &[u8]) -> u32 {
    let mut count = 0u32;
    for &byte in data {
        if byte == 0 {
            count += 8;
        } else {
            count += byte.leading_zeros();
            break;
        }
    }
    count
}

impl fmt::Debug for DoogleAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DoogleAddress({})", self.to_hex())
    }
}

impl fmt::Display for DoogleAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

impl From<[u8; ADDRESS_LENGTH]> for DoogleAddress {
    fn from(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        DoogleAddress(bytes)
    }
}

impl Serialize for DoogleAddress {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_bytes(&self.0)
    }
}

impl<'de> Deserialize<'de> for DoogleAddress {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct AddressVisitor;

        impl<'de> serde::de::Visitor<'de> for AddressVisitor {
            type Value = DoogleAddress;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                write!(formatter, "a byte array of length {}", ADDRESS_LENGTH)
            }

            fn visit_bytes<E>(self, v: &[u8]) -> std::result::Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                if v.len() != ADDRESS_LENGTH {
                    return Err(E::custom(format!(
                        "Invalid address length: expected {}, got {}",
                        ADDRESS_LENGTH,
                        v.len()
                    )));
                }
                let mut bytes = [0u8; ADDRESS_LENGTH];
                bytes.copy_from_slice(v);
                Ok(DoogleAddress(bytes))
            }

            fn visit_seq<A>(self, mut seq: A) -> std::result::Result<Self::Value, A::Error>
            where
                A: serde::de::SeqAccess<'de>,
            {
                let mut bytes = [0u8; ADDRESS_LENGTH];
                for (i, byte) in bytes.iter_mut().enumerate() {
                    *byte = seq
                        .next_element()?
                        .ok_or_else(|| serde::de::Error::invalid_length(i, &self))?;
                }
                Ok(DoogleAddress(bytes))
            }
        }

        deserializer.deserialize_bytes(AddressVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(first: u8, last: u8) -> DoogleAddress {
        let mut bytes = [0u8; ADDRESS_LENGTH];
        bytes[0] = first;
        bytes[ADDRESS_LENGTH - 1] = last;
        DoogleAddress::from_bytes(bytes)
    }

    #[test]
    fn test_xor_with_self_is_collision() {
        let a = DoogleAddress::hash_of("http://example.com");
        assert_eq!(a.xor(&a), DoogleAddress::default());
        assert_eq!(a.xor(&a).most_significant_bit(), None);
    }

    #[test]
    fn test_most_significant_bit_range() {
        assert_eq!(addr(0b1000_0000, 0).most_significant_bit(), Some(0));
        assert_eq!(addr(0b0001_0000, 0).most_significant_bit(), Some(3));
        assert_eq!(addr(0, 1).most_significant_bit(), Some(ADDRESS_BITS - 1));

        let a = DoogleAddress::hash_of("a");
        let b = DoogleAddress::hash_of("b");
        let idx = a.xor(&b).most_significant_bit().unwrap();
        assert!(idx < ADDRESS_BITS);
    }

    #[test]
    fn test_distance_ordering_is_numeric() {
        assert!(addr(0, 5) < addr(1, 0));
        assert!(addr(1, 0) < addr(1, 1));
        assert!(addr(0x7f, 0xff) < addr(0x80, 0));
    }

    #[test]
    fn test_from_slice_rejects_short_input() {
        let err = DoogleAddress::from_slice(&[1u8; 19]).unwrap_err();
        assert_eq!(
            err,
            CryptoError::InvalidAddressLength {
                expected: ADDRESS_LENGTH,
                actual: 19
            }
        );

        let long = [7u8; 32];
        let a = DoogleAddress::from_slice(&long).unwrap();
        assert_eq!(a.as_bytes(), &[7u8; ADDRESS_LENGTH]);
    }

    #[test]
    fn test_hex_roundtrip() {
        let a = DoogleAddress::hash_of("token");
        let parsed = DoogleAddress::from_hex(&a.to_hex()).unwrap();
        assert_eq!(a, parsed);
        assert_eq!(format!("{}", a).len(), 16);
    }

    #[test]
    fn test_count_leading_zero_bits() {
        assert_eq!(count_leading_zero_bits(&[0u8; 8]), 64);
        assert_eq!(count_leading_zero_bits(&[0b00010000, 0, 0, 0]), 3);
        assert_eq!(count_leading_zero_bits(&[0, 0, 0b00000001, 0]), 7 + 8 + 8);
        assert_eq!(count_leading_zero_bits(&[0b10000000, 0, 0, 0]), 0);
    }
}
