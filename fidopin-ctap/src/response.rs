//! CTAP2 response envelope
//!
//! A response is one status byte followed by an optional CBOR map.

use crate::cbor::MapParser;
use crate::error::{CtapError, Result};
use crate::status::{PinStatus, StatusCode};

/// A raw authenticator response split into status and body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CtapResponse {
    pub status: u8,
    pub data: Vec<u8>,
}

impl CtapResponse {
    /// Split response bytes into status and CBOR body
    ///
    /// An empty input has no status byte and is rejected.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let (&status, data) = bytes.split_first().ok_or(CtapError::EmptyResponse)?;
        Ok(Self {
            status,
            data: data.to_vec(),
        })
    }

    /// Whether the status byte is CTAP2_OK
    pub fn is_success(&self) -> bool {
        self.status == StatusCode::Success.as_u8()
    }

    /// The status byte classified as a PIN outcome
    pub fn pin_status(&self) -> PinStatus {
        PinStatus::from(self.status)
    }

    /// Parse the body as an integer-keyed CBOR map
    ///
    /// An empty body parses as an empty map.
    pub fn parser(&self) -> Result<MapParser> {
        if self.data.is_empty() {
            return MapParser::from_value(ciborium::Value::Map(Vec::new()));
        }
        MapParser::from_bytes(&self.data)
    }
}
