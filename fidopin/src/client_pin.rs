//! PIN/UV auth protocol engine
//!
//! [`KeyAgreement`] holds the shared keys of one session: it is created by
//! a getKeyAgreement exchange (or from known key pairs) and then encrypts
//! and authenticates changePIN parameters.

use crate::error::{Error, ProtocolError, Result, ValidationError};

use fidopin_crypto::{pin_protocol, KeyPair};
use fidopin_ctap::commands::client_pin::resp_keys;
use fidopin_ctap::{
    ClientPinRequest, ClientPinResponse, CoseKey, CtapCommand, CtapError, CtapResponse, PinStatus,
};
use fidopin_transport::Transport;

use std::fmt;

use p256::PublicKey;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

/// Size of the zero-padded new PIN block
pub const PADDED_PIN_LENGTH: usize = 64;

/// PIN protocol versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PinProtocol {
    /// PIN protocol version 1
    V1 = 1,
    /// PIN protocol version 2 (for FIPS certified authenticators)
    V2 = 2,
}

impl PinProtocol {
    /// The pinUvAuthProtocol number sent on the wire
    pub fn version(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for PinProtocol {
    type Error = ProtocolError;

    fn try_from(value: u8) -> std::result::Result<Self, ProtocolError> {
        match value {
            1 => Ok(PinProtocol::V1),
            2 => Ok(PinProtocol::V2),
            other => Err(ProtocolError::UnsupportedProtocol(other)),
        }
    }
}

impl fmt::Display for PinProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PIN/UV auth protocol {}", self.version())
    }
}

/// Shared keys of one PIN/UV auth protocol session
///
/// Secret material is wiped on drop and never formatted.
pub struct KeyAgreement {
    protocol: PinProtocol,
    platform: KeyPair,
    encryption_key: Zeroizing<[u8; 32]>,
    hmac_key: Zeroizing<[u8; 32]>,
}

impl KeyAgreement {
    /// Run getKeyAgreement and derive shared keys with a fresh key pair
    pub fn establish<T: Transport + ?Sized>(transport: &mut T, protocol: PinProtocol) -> Result<Self> {
        let request = ClientPinRequest::get_key_agreement(protocol.version()).to_cbor()?;
        log::debug!("Requesting key agreement for {}", protocol);

        let raw = transport.send_cbor(CtapCommand::ClientPin.as_u8(), &request)?;
        let response = CtapResponse::parse(&raw)?;
        if !response.is_success() {
            return Err(Error::Device(response.pin_status()));
        }

        let body =
            ClientPinResponse::from_cbor(&response.data).map_err(|_| ProtocolError::InvalidKeyAgreement)?;
        let peer = body
            .key_agreement
            .ok_or(ProtocolError::InvalidKeyAgreement)?
            .to_public_key()
            .map_err(|_| ProtocolError::InvalidKeyAgreement)?;

        Self::from_parts(protocol, KeyPair::generate(), peer)
    }

    /// Derive shared keys from a known key pair and peer public key
    ///
    /// Derivation is deterministic: both ends of an exchange, each passing
    /// its own key pair and the other's public key, arrive at the same keys.
    pub fn from_parts(protocol: PinProtocol, platform: KeyPair, peer: PublicKey) -> Result<Self> {
        let shared = platform.shared_secret(&peer);
        let (encryption_key, hmac_key) = match protocol {
            PinProtocol::V1 => {
                let (enc, mac) = pin_protocol::v1::derive_keys(&shared);
                (Zeroizing::new(enc), Zeroizing::new(mac))
            }
            PinProtocol::V2 => (
                Zeroizing::new(pin_protocol::v2::derive_encryption_key(&shared)?),
                Zeroizing::new(pin_protocol::v2::derive_hmac_key(&shared)?),
            ),
        };

        Ok(Self {
            protocol,
            platform,
            encryption_key,
            hmac_key,
        })
    }

    pub fn protocol(&self) -> PinProtocol {
        self.protocol
    }

    /// Our public key, sent back as the keyAgreement parameter
    pub fn platform_cose_key(&self) -> CoseKey {
        CoseKey::from_public_key(self.platform.public_key())
    }

    /// Encrypt block-aligned data
    ///
    /// Protocol 1 uses a zero IV; protocol 2 prepends a random IV.
    pub fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        let ciphertext = match self.protocol {
            PinProtocol::V1 => pin_protocol::v1::encrypt(&self.encryption_key, data)?,
            PinProtocol::V2 => pin_protocol::v2::encrypt(&self.encryption_key, data)?,
        };
        Ok(ciphertext)
    }

    /// Decrypt data produced by [`KeyAgreement::encrypt`] on the other end
    pub fn decrypt(&self, data: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        let plaintext = match self.protocol {
            PinProtocol::V1 => pin_protocol::v1::decrypt(&self.encryption_key, data)?,
            PinProtocol::V2 => pin_protocol::v2::decrypt(&self.encryption_key, data)?,
        };
        Ok(Zeroizing::new(plaintext))
    }

    /// Zero-pad a PIN to 64 bytes and encrypt it
    pub fn encrypt_pin(&self, pin: &[u8]) -> Result<Vec<u8>> {
        if pin.len() >= PADDED_PIN_LENGTH {
            return Err(ValidationError::NewPinTooLong {
                len: pin.len(),
                max: PADDED_PIN_LENGTH - 1,
            }
            .into());
        }
        let mut padded = Zeroizing::new([0u8; PADDED_PIN_LENGTH]);
        padded[..pin.len()].copy_from_slice(pin);
        self.encrypt(&padded[..])
    }

    /// pinUvAuthParam over `message`: 16 bytes for protocol 1, 32 for protocol 2
    pub fn authenticate(&self, message: &[u8]) -> Vec<u8> {
        match self.protocol {
            PinProtocol::V1 => pin_protocol::v1::authenticate(&self.hmac_key, message).to_vec(),
            PinProtocol::V2 => pin_protocol::v2::authenticate(&self.hmac_key, message).to_vec(),
        }
    }

    /// Check a pinUvAuthParam in constant time
    pub fn verify(&self, message: &[u8], param: &[u8]) -> bool {
        match self.protocol {
            PinProtocol::V1 => pin_protocol::v1::verify(&self.hmac_key, message, param),
            PinProtocol::V2 => pin_protocol::v2::verify(&self.hmac_key, message, param),
        }
    }
}

impl fmt::Debug for KeyAgreement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyAgreement")
            .field("protocol", &self.protocol)
            .finish_non_exhaustive()
    }
}

/// First 16 bytes of SHA-256(pin), as carried in pinHashEnc
pub fn pin_hash(pin: &[u8]) -> Zeroizing<[u8; 16]> {
    let digest: Zeroizing<[u8; 32]> = Zeroizing::new(Sha256::digest(pin).into());
    let mut out = Zeroizing::new([0u8; 16]);
    out.copy_from_slice(&digest[..16]);
    out
}

/// Build the changePIN payload for command 0x06
///
/// ```text
/// newPinEnc      = encrypt(pad64(new))
/// pinHashEnc     = encrypt(LEFT(SHA-256(current), 16))
/// pinUvAuthParam = authenticate(newPinEnc || pinHashEnc)
/// ```
pub fn build_change_pin(key_agreement: &KeyAgreement, current: &[u8], new: &[u8]) -> Result<Vec<u8>> {
    let new_pin_enc = key_agreement.encrypt_pin(new)?;
    let pin_hash_enc = key_agreement.encrypt(&pin_hash(current)[..])?;

    let mut message = Vec::with_capacity(new_pin_enc.len() + pin_hash_enc.len());
    message.extend_from_slice(&new_pin_enc);
    message.extend_from_slice(&pin_hash_enc);
    let pin_uv_auth_param = key_agreement.authenticate(&message);

    let request = ClientPinRequest::change_pin(
        key_agreement.protocol().version(),
        key_agreement.platform_cose_key(),
        pin_uv_auth_param,
        new_pin_enc,
        pin_hash_enc,
    );
    Ok(request.to_cbor()?)
}

/// Query the PIN retry counter
pub fn get_pin_retries<T: Transport + ?Sized>(transport: &mut T, protocol: PinProtocol) -> Result<u8> {
    let request = ClientPinRequest::get_pin_retries(protocol.version()).to_cbor()?;
    let raw = transport.send_cbor(CtapCommand::ClientPin.as_u8(), &request)?;
    let response = CtapResponse::parse(&raw)?;
    if !response.is_success() {
        return Err(Error::Device(response.pin_status()));
    }

    let body = ClientPinResponse::from_cbor(&response.data)?;
    body.pin_retries
        .ok_or_else(|| Error::from(CtapError::MissingParameter(resp_keys::PIN_RETRIES)))
}

/// Classify a changePIN response
pub fn change_pin_status(raw: &[u8]) -> Result<PinStatus> {
    Ok(CtapResponse::parse(raw)?.pin_status())
}
