//! Change the PIN of a FIDO2 authenticator over CTAP2
//!
//! The flow lives in [`session`]: list devices, select one, validate the
//! entered PINs, negotiate a PIN/UV auth protocol, agree on keys and send
//! changePIN. Hardware access goes through the
//! [`fidopin_transport::Transport`] and [`fidopin_transport::DeviceEnumerator`]
//! traits; with the `usb` feature the CTAPHID implementation is available as
//! [`fidopin_transport::HidEnumerator`].

#![warn(unused_extern_crates)]

pub mod client_pin;
pub mod config;
pub mod credential;
pub mod error;
pub mod session;

pub use client_pin::{build_change_pin, KeyAgreement, PinProtocol};
pub use config::{SessionConfig, SessionConfigBuilder};
pub use credential::{PinCredential, MAX_PIN_LENGTH, MIN_PIN_LENGTH};
pub use error::{Error, ProtocolError, Result, SelectionError, SessionOutcome, ValidationError};
pub use session::{run, select_device, Interaction, PinEntry, Session, SessionState};

pub use fidopin_ctap::PinStatus;
pub use fidopin_transport::{DeviceDescriptor, DeviceEnumerator, Transport, TransportError};
