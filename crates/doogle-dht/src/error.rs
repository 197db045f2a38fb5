//! DHT error types

use doogle_crypto::CryptoError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::crawler::CrawlError;

/// DHT-specific errors
#[derive(Error, Debug)]
pub enum DhtError {
    #[error("Invalid certificate: {0}")]
    InvalidCertificate(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Address collision with local node")]
    AddressCollision,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Operation timeout")]
    Timeout,

    #[error("Remote call failed: {0}")]
    Remote(Status),

    #[error("Unexpected reply to {0}")]
    UnexpectedReply(&'static str),

    #[error("Not implemented: {0}")]
    Unimplemented(&'static str),

    #[error("Crawl failed: {0}")]
    Crawl(#[from] CrawlError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DhtError {
    /// Status code reported to RPC callers for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            DhtError::InvalidCertificate(_)
            | DhtError::InvalidRequest(_)
            | DhtError::Crypto(_) => StatusCode::InvalidArgument,
            DhtError::Unimplemented(_) => StatusCode::Unimplemented,
            DhtError::Remote(status) => status.code,
            _ => StatusCode::Internal,
        }
    }
}

/// Result type for DHT operations
pub type Result<T> = std::result::Result<T, DhtError>;

/// Error category carried on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusCode {
    /// The caller's input (usually its certificate) was rejected
    InvalidArgument,
    /// Server-side failure
    Internal,
    /// Reserved operation
    Unimplemented,
}

/// Typed RPC failure returned to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub code: StatusCode,
    pub message: String,
}

impl Status {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Status {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(StatusCode::InvalidArgument, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Internal, message)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl From<DhtError> for Status {
    fn from(err: DhtError) -> Self {
        match err {
            DhtError::Remote(status) => status,
            other => Status::new(other.status_code(), other.to_string()),
        }
    }
}
