//! Decoding errors for CTAP messages

use fidopin_crypto::CryptoError;
use thiserror::Error;

/// Errors raised while encoding or decoding CTAP messages
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CtapError {
    /// The bytes are not well-formed CBOR
    #[error("Invalid CBOR")]
    InvalidCbor,

    /// The response carried no status byte
    #[error("Empty response")]
    EmptyResponse,

    /// A required map entry is absent
    #[error("Missing parameter 0x{0:02x}")]
    MissingParameter(i32),

    /// A map entry has the wrong CBOR type
    #[error("Unexpected type for parameter 0x{0:02x}")]
    UnexpectedType(i32),

    /// The COSE key is not a P-256 ECDH key
    #[error("Invalid COSE key")]
    InvalidCoseKey,

    /// A cryptographic operation on message content failed
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// Result type alias for CTAP message handling
pub type Result<T> = std::result::Result<T, CtapError>;
