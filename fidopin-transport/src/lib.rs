//! CTAP Transport Layer
//!
//! This crate provides the channel a PIN client uses to reach an authenticator:
//! - The [`Transport`] contract: one CTAP2 command in, raw response bytes out
//! - Device discovery through [`DeviceEnumerator`]
//! - CTAP HID protocol (message framing, fragmentation, reassembly)
//! - USB HID transport (via hidapi, behind the `usb` feature)
//!
//! Spec: <https://fidoalliance.org/specs/fido-v2.1-ps-20210615/fido-client-to-authenticator-protocol-v2.1-ps-20210615.html#usb>

pub mod ctaphid;
pub mod error;
#[cfg(feature = "usb")]
pub mod hid;

use std::fmt;

// Re-export commonly used types
pub use ctaphid::{Cmd, Message, Packet};
pub use error::{Result, TransportError};
#[cfg(feature = "usb")]
pub use hid::{HidChannel, HidEnumerator};

/// A channel to one authenticator
///
/// Taking `&mut self` keeps a single command in flight per device.
pub trait Transport {
    /// Send a CTAP2 command and wait for its response
    ///
    /// `payload` is the CBOR parameter map (possibly empty). The returned
    /// bytes start with the CTAP2 status byte.
    fn send_cbor(&mut self, command: u8, payload: &[u8]) -> Result<Vec<u8>>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn send_cbor(&mut self, command: u8, payload: &[u8]) -> Result<Vec<u8>> {
        (**self).send_cbor(command, payload)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send_cbor(&mut self, command: u8, payload: &[u8]) -> Result<Vec<u8>> {
        (**self).send_cbor(command, payload)
    }
}

/// Discovers and opens authenticators
pub trait DeviceEnumerator {
    type Device: Transport;

    /// List connected authenticators; an empty list is not an error
    fn list(&mut self) -> Result<Vec<DeviceDescriptor>>;

    /// Open a listed authenticator for exclusive use
    fn open(&mut self, descriptor: &DeviceDescriptor) -> Result<Self::Device>;
}

/// A connected authenticator as seen during enumeration
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceDescriptor {
    /// Opaque, platform-specific path
    pub id: String,
    pub product: Option<String>,
    pub manufacturer: Option<String>,
    pub vendor_id: u16,
    pub product_id: u16,
}

impl DeviceDescriptor {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            product: None,
            manufacturer: None,
            vendor_id: 0,
            product_id: 0,
        }
    }

    /// Human-readable label for selection prompts
    pub fn label(&self) -> String {
        let name: Vec<&str> = [self.manufacturer.as_deref(), self.product.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();

        if name.is_empty() {
            self.id.clone()
        } else {
            format!("{} ({})", name.join(" "), self.id)
        }
    }
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}
