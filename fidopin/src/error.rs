//! Error and outcome types for a PIN-change session

use fidopin_crypto::CryptoError;
use fidopin_ctap::{CtapError, PinStatus};
use fidopin_transport::TransportError;
use thiserror::Error;

/// Choosing a device failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("No FIDO security key found. Make sure it's plugged in.")]
    NoDevices,

    #[error("Invalid selection: {0:?} is not a number")]
    NotANumber(String),

    #[error("Invalid selection: {index} is not between 1 and {count}")]
    OutOfRange { index: usize, count: usize },

    #[error("No device was selected")]
    NoInput,
}

/// The entered PINs were rejected before contacting the device
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Current PIN cannot be empty")]
    EmptyCurrentPin,

    #[error("New PIN is {len} bytes, at least {min} are required")]
    NewPinTooShort { len: usize, min: usize },

    #[error("New PIN is {len} bytes, at most {max} are allowed")]
    NewPinTooLong { len: usize, max: usize },

    #[error("New PINs do not match")]
    Mismatch,

    #[error("No PIN was entered")]
    NoInput,
}

/// The PIN/UV auth protocol exchange could not proceed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("The authenticator does not support PINs")]
    PinNotSupported,

    #[error("Unsupported PIN/UV auth protocol {0}")]
    UnsupportedProtocol(u8),

    #[error("The authenticator returned an invalid key agreement key")]
    InvalidKeyAgreement,

    #[error("The session has already finished")]
    SessionFinished,

    #[error("Malformed authenticator response: {0}")]
    Decode(#[from] CtapError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// Any failure of a PIN-change session
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The authenticator rejected the request
    #[error("{0}")]
    Device(PinStatus),
}

impl From<CtapError> for Error {
    fn from(err: CtapError) -> Self {
        Error::Protocol(ProtocolError::Decode(err))
    }
}

impl From<CryptoError> for Error {
    fn from(err: CryptoError) -> Self {
        Error::Protocol(ProtocolError::Crypto(err))
    }
}

/// Result type alias for session operations
pub type Result<T> = std::result::Result<T, Error>;

/// How a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The authenticator confirmed the new PIN
    Done,
    /// The PIN was not changed
    Failed(Error),
    /// The request reached the device but its result was lost
    Unknown(String),
}

impl SessionOutcome {
    pub fn is_done(&self) -> bool {
        matches!(self, SessionOutcome::Done)
    }

    /// The device status behind a failure, if the device reported one
    pub fn device_status(&self) -> Option<PinStatus> {
        match self {
            SessionOutcome::Failed(Error::Device(status)) => Some(*status),
            _ => None,
        }
    }
}
