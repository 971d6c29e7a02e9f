//! authenticatorGetInfo command
//!
//! The request has no parameters. The response describes, among other things:
//! - Supported versions
//! - AAGUID
//! - Options (rk, up, uv, clientPin, etc.)
//! - PIN/UV auth protocols
//! - PIN policy (minimum length, forced change)
//!
//! Only the fields a PIN client acts on are decoded; the rest are skipped.
//!
//! Spec: <https://fidoalliance.org/specs/fido-v2.1-ps-20210615/fido-client-to-authenticator-protocol-v2.1-ps-20210615.html#authenticatorGetInfo>

use crate::cbor::{MapBuilder, MapParser};
use crate::error::{CtapError, Result};

use std::collections::BTreeMap;

/// GetInfo response keys
pub mod keys {
    pub const VERSIONS: i32 = 0x01;
    pub const EXTENSIONS: i32 = 0x02;
    pub const AAGUID: i32 = 0x03;
    pub const OPTIONS: i32 = 0x04;
    pub const MAX_MSG_SIZE: i32 = 0x05;
    pub const PIN_UV_AUTH_PROTOCOLS: i32 = 0x06;
    pub const FORCE_PIN_CHANGE: i32 = 0x0C;
    pub const MIN_PIN_LENGTH: i32 = 0x0D;
    pub const FIRMWARE_VERSION: i32 = 0x0E;
}

/// Option name for the PIN capability
pub const OPTION_CLIENT_PIN: &str = "clientPin";

/// Decoded authenticatorGetInfo response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthenticatorInfo {
    pub versions: Vec<String>,
    pub extensions: Vec<String>,
    pub aaguid: Vec<u8>,
    pub options: BTreeMap<String, bool>,
    pub max_msg_size: Option<u64>,
    /// `None` when the authenticator omits the list (CTAP 2.0 devices)
    pub pin_uv_auth_protocols: Option<Vec<u8>>,
    pub force_pin_change: Option<bool>,
    pub min_pin_length: Option<u8>,
    pub firmware_version: Option<u64>,
}

impl AuthenticatorInfo {
    /// Decode a response body (without the status byte)
    pub fn from_cbor(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Err(CtapError::MissingParameter(keys::VERSIONS));
        }
        let parser = MapParser::from_bytes(data)?;

        Ok(Self {
            versions: parser.get(keys::VERSIONS)?,
            extensions: parser.get_opt(keys::EXTENSIONS)?.unwrap_or_default(),
            aaguid: if parser.contains_key(keys::AAGUID) {
                parser.get_bytes(keys::AAGUID)?
            } else {
                Vec::new()
            },
            options: parser.get_opt(keys::OPTIONS)?.unwrap_or_default(),
            max_msg_size: parser.get_opt(keys::MAX_MSG_SIZE)?,
            pin_uv_auth_protocols: parser.get_opt(keys::PIN_UV_AUTH_PROTOCOLS)?,
            force_pin_change: parser.get_opt(keys::FORCE_PIN_CHANGE)?,
            min_pin_length: parser.get_opt(keys::MIN_PIN_LENGTH)?,
            firmware_version: parser.get_opt(keys::FIRMWARE_VERSION)?,
        })
    }

    /// Encode the response body
    pub fn to_cbor(&self) -> Result<Vec<u8>> {
        let mut builder = MapBuilder::new().insert(keys::VERSIONS, &self.versions)?;
        if !self.extensions.is_empty() {
            builder = builder.insert(keys::EXTENSIONS, &self.extensions)?;
        }
        if !self.aaguid.is_empty() {
            builder = builder.insert_bytes(keys::AAGUID, &self.aaguid);
        }
        if !self.options.is_empty() {
            builder = builder.insert(keys::OPTIONS, &self.options)?;
        }
        builder
            .insert_opt(keys::MAX_MSG_SIZE, self.max_msg_size)?
            .insert_opt(keys::PIN_UV_AUTH_PROTOCOLS, self.pin_uv_auth_protocols.as_ref())?
            .insert_opt(keys::FORCE_PIN_CHANGE, self.force_pin_change)?
            .insert_opt(keys::MIN_PIN_LENGTH, self.min_pin_length)?
            .insert_opt(keys::FIRMWARE_VERSION, self.firmware_version)?
            .build()
    }

    /// The `clientPin` option
    ///
    /// `None` means the device has no PIN capability, `Some(false)` means a
    /// PIN is supported but not set.
    pub fn client_pin(&self) -> Option<bool> {
        self.options.get(OPTION_CLIENT_PIN).copied()
    }

    /// Whether the device advertises the given PIN/UV auth protocol
    ///
    /// Devices that omit the list only speak protocol 1.
    pub fn supports_protocol(&self, version: u8) -> bool {
        match &self.pin_uv_auth_protocols {
            Some(protocols) => protocols.contains(&version),
            None => version == 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AuthenticatorInfo {
        let mut options = BTreeMap::new();
        options.insert("rk".to_string(), true);
        options.insert(OPTION_CLIENT_PIN.to_string(), true);
        AuthenticatorInfo {
            versions: vec!["FIDO_2_0".into(), "FIDO_2_1".into()],
            aaguid: vec![0x5a; 16],
            options,
            pin_uv_auth_protocols: Some(vec![2, 1]),
            min_pin_length: Some(4),
            ..Default::default()
        }
    }

    #[test]
    fn test_round_trip() {
        let info = sample();
        let decoded = AuthenticatorInfo::from_cbor(&info.to_cbor().unwrap()).unwrap();
        assert_eq!(decoded, info);
        assert_eq!(decoded.client_pin(), Some(true));
        assert!(decoded.supports_protocol(2));
        assert!(!decoded.supports_protocol(3));
    }

    #[test]
    fn test_missing_protocol_list_means_v1() {
        let info = AuthenticatorInfo {
            versions: vec!["FIDO_2_0".into()],
            ..Default::default()
        };
        let decoded = AuthenticatorInfo::from_cbor(&info.to_cbor().unwrap()).unwrap();
        assert_eq!(decoded.pin_uv_auth_protocols, None);
        assert!(decoded.supports_protocol(1));
        assert!(!decoded.supports_protocol(2));
        assert_eq!(decoded.client_pin(), None);
    }

    #[test]
    fn test_client_pin_not_set() {
        let mut info = sample();
        info.options.insert(OPTION_CLIENT_PIN.to_string(), false);
        let decoded = AuthenticatorInfo::from_cbor(&info.to_cbor().unwrap()).unwrap();
        assert_eq!(decoded.client_pin(), Some(false));
    }

    #[test]
    fn test_unknown_fields_are_skipped() {
        let cbor = MapBuilder::new()
            .insert(keys::VERSIONS, vec!["FIDO_2_1"])
            .unwrap()
            .insert(0x0A, vec![1u8, 2, 3])
            .unwrap()
            .insert(0x14, 25u32)
            .unwrap()
            .build()
            .unwrap();

        let info = AuthenticatorInfo::from_cbor(&cbor).unwrap();
        assert_eq!(info.versions, vec!["FIDO_2_1".to_string()]);
    }

    #[test]
    fn test_versions_required() {
        let cbor = MapBuilder::new()
            .insert(keys::MIN_PIN_LENGTH, 6u8)
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(
            AuthenticatorInfo::from_cbor(&cbor),
            Err(CtapError::MissingParameter(keys::VERSIONS))
        );
        assert!(AuthenticatorInfo::from_cbor(&[]).is_err());
    }
}
