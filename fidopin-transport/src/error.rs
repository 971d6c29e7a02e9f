//! Transport errors

use thiserror::Error;

/// Errors raised while talking to an authenticator
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// HID I/O failed, typically because the device was unplugged
    #[error("HID error: {0}")]
    Hid(String),

    /// No complete response arrived within the command timeout
    #[error("Timed out waiting for the authenticator")]
    Timeout,

    /// Another client holds the authenticator
    #[error("Authenticator channel is busy")]
    ChannelBusy,

    /// The authenticator answered with a CTAPHID error frame
    #[error("CTAPHID error 0x{0:02x}")]
    Device(u8),

    /// The response could not be framed or was not what was asked for
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// No device with the requested identifier
    #[error("Device not found: {0}")]
    NotFound(String),
}

/// Result type alias for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;
