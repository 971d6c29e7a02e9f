//! CTAP2 message layer for PIN management
//!
//! This crate builds and parses the CBOR payloads of the commands a client
//! needs to change an authenticator PIN:
//! - `authenticatorGetInfo` (0x04), to learn the supported PIN/UV auth protocols
//! - `authenticatorClientPIN` (0x06) sub-commands getPinRetries, getKeyAgreement
//!   and changePIN
//!
//! Spec: <https://fidoalliance.org/specs/fido-v2.1-ps-20210615/fido-client-to-authenticator-protocol-v2.1-ps-20210615.html>

pub mod cbor;
pub mod commands;
pub mod cose;
pub mod error;
pub mod response;
pub mod status;

pub use commands::client_pin::{ClientPinRequest, ClientPinResponse, SubCommand};
pub use commands::get_info::AuthenticatorInfo;
pub use commands::CtapCommand;
pub use cose::CoseKey;
pub use error::{CtapError, Result};
pub use response::CtapResponse;
pub use status::{PinStatus, StatusCode};
