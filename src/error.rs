//! Error types shared across the crate

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    /// Malformed bytes: bad varint, truncated message, invalid SEC prefix,
    /// non-canonical DER, point not on curve.
    #[error("parse error: {0}")]
    Parse(String),

    /// Cryptographic check failed: bad signature, checksum mismatch,
    /// proof of work above target.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// Peer protocol violation: unexpected message, magic or checksum
    /// mismatch, failed handshake.
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Precondition violation inside the core, e.g. mixing field elements
    /// of different primes or a scalar outside the group order.
    #[error("invariant violation: {0}")]
    Invariant(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
