//! CTAP2 commands used for PIN management

pub mod client_pin;
pub mod get_info;

use std::fmt;

/// CTAP2 command codes
///
/// Only the commands a PIN-changing client sends are listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CtapCommand {
    /// authenticatorGetInfo (0x04) - Get authenticator information
    GetInfo = 0x04,
    /// authenticatorClientPIN (0x06) - PIN/UV protocol operations
    ClientPin = 0x06,
}

impl CtapCommand {
    /// Get the command code as a byte value
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Create a CtapCommand from a byte value
    ///
    /// Returns `None` if the byte is not a command this crate sends.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x04 => Some(Self::GetInfo),
            0x06 => Some(Self::ClientPin),
            _ => None,
        }
    }
}

impl From<CtapCommand> for u8 {
    fn from(cmd: CtapCommand) -> Self {
        cmd.as_u8()
    }
}

impl fmt::Display for CtapCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GetInfo => write!(f, "GetInfo(0x04)"),
            Self::ClientPin => write!(f, "ClientPin(0x06)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_codes() {
        assert_eq!(CtapCommand::GetInfo.as_u8(), 0x04);
        assert_eq!(u8::from(CtapCommand::ClientPin), 0x06);
    }

    #[test]
    fn test_from_u8() {
        assert_eq!(CtapCommand::from_u8(0x04), Some(CtapCommand::GetInfo));
        assert_eq!(CtapCommand::from_u8(0x06), Some(CtapCommand::ClientPin));
        assert_eq!(CtapCommand::from_u8(0x01), None);
    }
}
