//! authenticatorClientPIN command
//!
//! Client-side encoding of the sub-commands used to change a PIN:
//! - Getting the PIN retry counter
//! - Getting the authenticator key agreement key
//! - Changing the PIN
//!
//! Requests can also be decoded and responses encoded, which is what an
//! authenticator (or a test double of one) needs.
//!
//! Spec: <https://fidoalliance.org/specs/fido-v2.1-ps-20210615/fido-client-to-authenticator-protocol-v2.1-ps-20210615.html#authenticatorClientPIN>

use crate::cbor::{MapBuilder, MapParser};
use crate::cose::CoseKey;
use crate::error::{CtapError, Result};

/// ClientPIN subcommands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SubCommand {
    GetPinRetries = 0x01,
    GetKeyAgreement = 0x02,
    SetPin = 0x03,
    ChangePin = 0x04,
    GetPinToken = 0x05,
    GetPinUvAuthTokenUsingUvWithPermissions = 0x06,
    GetUvRetries = 0x07,
    GetPinUvAuthTokenUsingPinWithPermissions = 0x09,
}

impl SubCommand {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::GetPinRetries),
            0x02 => Some(Self::GetKeyAgreement),
            0x03 => Some(Self::SetPin),
            0x04 => Some(Self::ChangePin),
            0x05 => Some(Self::GetPinToken),
            0x06 => Some(Self::GetPinUvAuthTokenUsingUvWithPermissions),
            0x07 => Some(Self::GetUvRetries),
            0x09 => Some(Self::GetPinUvAuthTokenUsingPinWithPermissions),
            _ => None,
        }
    }
}

/// Request parameter keys
pub mod req_keys {
    pub const PIN_UV_AUTH_PROTOCOL: i32 = 0x01;
    pub const SUBCOMMAND: i32 = 0x02;
    pub const KEY_AGREEMENT: i32 = 0x03;
    pub const PIN_UV_AUTH_PARAM: i32 = 0x04;
    pub const NEW_PIN_ENC: i32 = 0x05;
    pub const PIN_HASH_ENC: i32 = 0x06;
}

/// Response field keys
pub mod resp_keys {
    pub const KEY_AGREEMENT: i32 = 0x01;
    pub const PIN_UV_AUTH_TOKEN: i32 = 0x02;
    pub const PIN_RETRIES: i32 = 0x03;
    pub const POWER_CYCLE_STATE: i32 = 0x04;
    pub const UV_RETRIES: i32 = 0x05;
}

/// An authenticatorClientPIN request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientPinRequest {
    pub protocol: Option<u8>,
    pub sub_command: SubCommand,
    pub key_agreement: Option<CoseKey>,
    pub pin_uv_auth_param: Option<Vec<u8>>,
    pub new_pin_enc: Option<Vec<u8>>,
    pub pin_hash_enc: Option<Vec<u8>>,
}

impl ClientPinRequest {
    fn bare(protocol: u8, sub_command: SubCommand) -> Self {
        Self {
            protocol: Some(protocol),
            sub_command,
            key_agreement: None,
            pin_uv_auth_param: None,
            new_pin_enc: None,
            pin_hash_enc: None,
        }
    }

    /// getPinRetries: `{1: protocol, 2: 0x01}`
    pub fn get_pin_retries(protocol: u8) -> Self {
        Self::bare(protocol, SubCommand::GetPinRetries)
    }

    /// getKeyAgreement: `{1: protocol, 2: 0x02}`
    pub fn get_key_agreement(protocol: u8) -> Self {
        Self::bare(protocol, SubCommand::GetKeyAgreement)
    }

    /// changePIN with already encrypted and authenticated parameters
    pub fn change_pin(
        protocol: u8,
        key_agreement: CoseKey,
        pin_uv_auth_param: Vec<u8>,
        new_pin_enc: Vec<u8>,
        pin_hash_enc: Vec<u8>,
    ) -> Self {
        Self {
            protocol: Some(protocol),
            sub_command: SubCommand::ChangePin,
            key_agreement: Some(key_agreement),
            pin_uv_auth_param: Some(pin_uv_auth_param),
            new_pin_enc: Some(new_pin_enc),
            pin_hash_enc: Some(pin_hash_enc),
        }
    }

    /// Encode as the canonical CBOR payload of command 0x06
    pub fn to_cbor(&self) -> Result<Vec<u8>> {
        let mut builder = MapBuilder::new()
            .insert_opt(req_keys::PIN_UV_AUTH_PROTOCOL, self.protocol)?
            .insert(req_keys::SUBCOMMAND, self.sub_command.as_u8())?;

        if let Some(key) = &self.key_agreement {
            builder = builder.insert_value(req_keys::KEY_AGREEMENT, key.to_value()?);
        }
        if let Some(param) = &self.pin_uv_auth_param {
            builder = builder.insert_bytes(req_keys::PIN_UV_AUTH_PARAM, param);
        }
        if let Some(enc) = &self.new_pin_enc {
            builder = builder.insert_bytes(req_keys::NEW_PIN_ENC, enc);
        }
        if let Some(enc) = &self.pin_hash_enc {
            builder = builder.insert_bytes(req_keys::PIN_HASH_ENC, enc);
        }

        builder.build()
    }

    /// Decode a request payload
    pub fn from_cbor(data: &[u8]) -> Result<Self> {
        let parser = MapParser::from_bytes(data)?;

        let sub_command: u8 = parser.get(req_keys::SUBCOMMAND)?;
        let sub_command = SubCommand::from_u8(sub_command)
            .ok_or(CtapError::UnexpectedType(req_keys::SUBCOMMAND))?;

        let key_agreement = parser
            .get_raw(req_keys::KEY_AGREEMENT)
            .map(CoseKey::from_value)
            .transpose()?;

        Ok(Self {
            protocol: parser.get_opt(req_keys::PIN_UV_AUTH_PROTOCOL)?,
            sub_command,
            key_agreement,
            pin_uv_auth_param: optional_bytes(&parser, req_keys::PIN_UV_AUTH_PARAM)?,
            new_pin_enc: optional_bytes(&parser, req_keys::NEW_PIN_ENC)?,
            pin_hash_enc: optional_bytes(&parser, req_keys::PIN_HASH_ENC)?,
        })
    }
}

fn optional_bytes(parser: &MapParser, key: i32) -> Result<Option<Vec<u8>>> {
    if parser.contains_key(key) {
        parser.get_bytes(key).map(Some)
    } else {
        Ok(None)
    }
}

/// An authenticatorClientPIN response body
///
/// changePIN answers with an empty body, so every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientPinResponse {
    pub key_agreement: Option<CoseKey>,
    pub pin_uv_auth_token: Option<Vec<u8>>,
    pub pin_retries: Option<u8>,
    pub power_cycle_state: Option<bool>,
    pub uv_retries: Option<u8>,
}

impl ClientPinResponse {
    /// Decode a response body (without the status byte)
    pub fn from_cbor(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Ok(Self::default());
        }
        Self::from_parser(&MapParser::from_bytes(data)?)
    }

    /// Decode from an already parsed response map
    pub fn from_parser(parser: &MapParser) -> Result<Self> {
        let key_agreement = parser
            .get_raw(resp_keys::KEY_AGREEMENT)
            .map(CoseKey::from_value)
            .transpose()?;

        Ok(Self {
            key_agreement,
            pin_uv_auth_token: optional_bytes(parser, resp_keys::PIN_UV_AUTH_TOKEN)?,
            pin_retries: parser.get_opt(resp_keys::PIN_RETRIES)?,
            power_cycle_state: parser.get_opt(resp_keys::POWER_CYCLE_STATE)?,
            uv_retries: parser.get_opt(resp_keys::UV_RETRIES)?,
        })
    }

    /// Encode the response body; an empty response encodes to no bytes
    pub fn to_cbor(&self) -> Result<Vec<u8>> {
        if self == &Self::default() {
            return Ok(Vec::new());
        }

        let mut builder = MapBuilder::new();
        if let Some(key) = &self.key_agreement {
            builder = builder.insert_value(resp_keys::KEY_AGREEMENT, key.to_value()?);
        }
        if let Some(token) = &self.pin_uv_auth_token {
            builder = builder.insert_bytes(resp_keys::PIN_UV_AUTH_TOKEN, token);
        }
        builder
            .insert_opt(resp_keys::PIN_RETRIES, self.pin_retries)?
            .insert_opt(resp_keys::POWER_CYCLE_STATE, self.power_cycle_state)?
            .insert_opt(resp_keys::UV_RETRIES, self.uv_retries)?
            .build()
    }
}
