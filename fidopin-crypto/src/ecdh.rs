//! P-256 ECDH key agreement
//!
//! Both sides of the PIN/UV auth protocol exchange uncompressed P-256 points
//! as COSE keys and use the x-coordinate of the ECDH product as the input
//! to key derivation.

use crate::error::{CryptoError, Result};

use p256::ecdh::diffie_hellman;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::{PublicKey, SecretKey};
use rand::rngs::OsRng;
use zeroize::Zeroizing;

/// Ephemeral P-256 key pair
///
/// The secret scalar is wiped when the key pair is dropped.
pub struct KeyPair {
    secret: SecretKey,
    public: PublicKey,
}

impl KeyPair {
    /// Generate a fresh key pair from the OS random number generator
    pub fn generate() -> Self {
        let secret = SecretKey::random(&mut OsRng);
        let public = secret.public_key();
        Self { secret, public }
    }

    /// Rebuild a key pair from a 32-byte big-endian secret scalar
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self> {
        let secret = SecretKey::from_slice(bytes).map_err(|_| CryptoError::InvalidPrivateKey)?;
        let public = secret.public_key();
        Ok(Self { secret, public })
    }

    /// The public half of the pair
    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Affine coordinates of the public key, as carried in a COSE key
    pub fn public_key_cose(&self) -> ([u8; 32], [u8; 32]) {
        coordinates(&self.public)
    }

    /// Compute the ECDH shared secret with a peer public key
    ///
    /// Returns the 32-byte x-coordinate of the shared point.
    pub fn shared_secret(&self, peer: &PublicKey) -> Zeroizing<[u8; 32]> {
        let shared = diffie_hellman(self.secret.to_nonzero_scalar(), peer.as_affine());
        let mut out = Zeroizing::new([0u8; 32]);
        out.copy_from_slice(shared.raw_secret_bytes().as_slice());
        out
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public_key_cose())
            .finish_non_exhaustive()
    }
}

/// Parse a P-256 public key from its affine coordinates
///
/// Fails when the point is not on the curve.
pub fn public_key_from_coordinates(x: &[u8], y: &[u8]) -> Result<PublicKey> {
    if x.len() != 32 {
        return Err(CryptoError::InvalidKeyLength {
            expected: 32,
            actual: x.len(),
        });
    }
    if y.len() != 32 {
        return Err(CryptoError::InvalidKeyLength {
            expected: 32,
            actual: y.len(),
        });
    }

    // Uncompressed SEC1 encoding: 0x04 || x || y
    let mut uncompressed = [0u8; 65];
    uncompressed[0] = 0x04;
    uncompressed[1..33].copy_from_slice(x);
    uncompressed[33..].copy_from_slice(y);

    PublicKey::from_sec1_bytes(&uncompressed).map_err(|_| CryptoError::InvalidPublicKey)
}

/// Affine coordinates of a P-256 public key
pub fn coordinates(public: &PublicKey) -> ([u8; 32], [u8; 32]) {
    let point = public.to_encoded_point(false);
    let mut x = [0u8; 32];
    let mut y = [0u8; 32];
    // Uncompressed points always carry both coordinates
    x.copy_from_slice(&point.as_bytes()[1..33]);
    y.copy_from_slice(&point.as_bytes()[33..65]);
    (x, y)
}
