//! Error types for address and certificate operations

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CryptoError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CryptoError {
    #[error("Invalid address length: expected {expected}, got {actual}")]
    InvalidAddressLength { expected: usize, actual: usize },

    #[error("Difficulty {difficulty} is infeasible (max {max})")]
    DifficultyTooHigh { difficulty: u32, max: usize },

    #[error("Difficulty {claimed} below required minimum {required}")]
    DifficultyTooLow { claimed: u32, required: u32 },

    #[error("Address does not match network address and public key")]
    AddressMismatch,

    #[error("Invalid proof-of-work for difficulty {0}")]
    InvalidProofOfWork(u32),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}
