//! COSE_Key encoding for the PIN/UV auth key agreement
//!
//! Both sides exchange EC2 P-256 keys. The platform tags its key with the
//! ECDH-ES+HKDF-256 algorithm identifier; other key types are rejected.

use crate::cbor::{MapBuilder, MapParser};
use crate::error::{CtapError, Result};

use ciborium::Value;
use fidopin_crypto::ecdh;
use p256::PublicKey;

/// COSE key parameter labels
pub mod labels {
    pub const KTY: i32 = 1;
    pub const ALG: i32 = 3;
    pub const CRV: i32 = -1;
    pub const X: i32 = -2;
    pub const Y: i32 = -3;
}

/// kty: EC2
pub const KTY_EC2: i32 = 2;

/// alg: ECDH-ES+HKDF-256
pub const ALG_ECDH_ES_HKDF_256: i32 = -25;

/// crv: P-256
pub const CRV_P256: i32 = 1;

/// A P-256 public key in COSE form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoseKey {
    pub x: [u8; 32],
    pub y: [u8; 32],
}

impl CoseKey {
    /// Build from a parsed public key
    pub fn from_public_key(public: &PublicKey) -> Self {
        let (x, y) = ecdh::coordinates(public);
        Self { x, y }
    }

    /// Validate the point and convert it into a usable public key
    pub fn to_public_key(&self) -> Result<PublicKey> {
        Ok(ecdh::public_key_from_coordinates(&self.x, &self.y)?)
    }

    /// Encode as a canonical CBOR map value
    pub fn to_value(&self) -> Result<Value> {
        MapBuilder::new()
            .insert(labels::KTY, KTY_EC2)?
            .insert(labels::ALG, ALG_ECDH_ES_HKDF_256)?
            .insert(labels::CRV, CRV_P256)?
            .insert_bytes(labels::X, &self.x)
            .insert_bytes(labels::Y, &self.y)
            .build_value()
    }

    /// Decode from a CBOR map value
    ///
    /// The key type and curve must identify an EC2 P-256 key. The algorithm
    /// label is not checked: authenticators omit it or send other values.
    pub fn from_value(value: &Value) -> Result<Self> {
        let parser = MapParser::from_value(value.clone()).map_err(|_| CtapError::InvalidCoseKey)?;

        let kty: i32 = parser.get(labels::KTY).map_err(|_| CtapError::InvalidCoseKey)?;
        let crv: i32 = parser.get(labels::CRV).map_err(|_| CtapError::InvalidCoseKey)?;
        if kty != KTY_EC2 || crv != CRV_P256 {
            return Err(CtapError::InvalidCoseKey);
        }

        let x = coordinate(&parser, labels::X)?;
        let y = coordinate(&parser, labels::Y)?;
        Ok(Self { x, y })
    }
}

fn coordinate(parser: &MapParser, label: i32) -> Result<[u8; 32]> {
    let bytes = parser
        .get_bytes(label)
        .map_err(|_| CtapError::InvalidCoseKey)?;
    bytes.try_into().map_err(|_| CtapError::InvalidCoseKey)
}

impl From<&PublicKey> for CoseKey {
    fn from(public: &PublicKey) -> Self {
        Self::from_public_key(public)
    }
}
