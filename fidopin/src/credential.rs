//! Validated PIN pair for a change request

use crate::error::ValidationError;

use std::fmt;

use zeroize::Zeroizing;

/// Shortest PIN an authenticator accepts, in bytes
pub const MIN_PIN_LENGTH: usize = 4;

/// Longest PIN that fits the 64-byte padded block with a terminator, in bytes
pub const MAX_PIN_LENGTH: usize = 63;

/// Current and new PIN, checked and held in zeroizing buffers
///
/// Only [`PinCredential::validate`] constructs one, so a value always has a
/// non-empty current PIN and a new PIN of 4 to 63 bytes.
pub struct PinCredential {
    current: Zeroizing<Vec<u8>>,
    new: Zeroizing<Vec<u8>>,
}

impl PinCredential {
    /// Check the entered PINs
    ///
    /// Lengths are counted in bytes of the UTF-8 encoding. The confirmation
    /// is compared only after the new PIN passed the length check.
    pub fn validate(
        current: impl Into<Zeroizing<Vec<u8>>>,
        new: impl Into<Zeroizing<Vec<u8>>>,
        confirm: impl Into<Zeroizing<Vec<u8>>>,
    ) -> Result<Self, ValidationError> {
        let current = current.into();
        let new = new.into();
        let confirm = confirm.into();

        if current.is_empty() {
            return Err(ValidationError::EmptyCurrentPin);
        }
        if new.len() < MIN_PIN_LENGTH {
            return Err(ValidationError::NewPinTooShort {
                len: new.len(),
                min: MIN_PIN_LENGTH,
            });
        }
        if new.len() > MAX_PIN_LENGTH {
            return Err(ValidationError::NewPinTooLong {
                len: new.len(),
                max: MAX_PIN_LENGTH,
            });
        }
        if *new != *confirm {
            return Err(ValidationError::Mismatch);
        }

        Ok(Self { current, new })
    }

    pub fn current(&self) -> &[u8] {
        &self.current
    }

    pub fn new_pin(&self) -> &[u8] {
        &self.new
    }
}

impl fmt::Debug for PinCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PinCredential")
            .field("current", &"<redacted>")
            .field("new", &"<redacted>")
            .finish()
    }
}
