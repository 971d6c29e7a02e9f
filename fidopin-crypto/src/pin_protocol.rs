//! PIN/UV authentication protocols (V1 and V2)
//!
//! Spec: <https://fidoalliance.org/specs/fido-v2.1-ps-20210615/fido-client-to-authenticator-protocol-v2.1-ps-20210615.html#authenticatorClientPIN>
//!
//! Protocol V1: SHA-256 KDF, AES-256-CBC with zero IV, HMAC-SHA-256 truncated to 16 bytes
//! Protocol V2: HKDF-SHA-256 KDF, AES-256-CBC with random IV, full HMAC-SHA-256

use crate::error::{CryptoError, Result};

use aes::Aes256;
use cbc::{
    cipher::{block_padding::NoPadding, BlockDecryptMut, BlockEncryptMut, KeyIvInit},
    Decryptor, Encryptor,
};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;
type Aes256CbcEnc = Encryptor<Aes256>;
type Aes256CbcDec = Decryptor<Aes256>;

/// AES block size in bytes
pub const BLOCK_SIZE: usize = 16;

fn cbc_encrypt(key: &[u8; 32], iv: &[u8; BLOCK_SIZE], plaintext: &[u8]) -> Result<Vec<u8>> {
    if plaintext.len() % BLOCK_SIZE != 0 {
        return Err(CryptoError::UnalignedData(plaintext.len()));
    }

    let mut buffer = plaintext.to_vec();
    let len = buffer.len();
    Aes256CbcEnc::new(key.into(), iv.into())
        .encrypt_padded_mut::<NoPadding>(&mut buffer, len)
        .map_err(|_| CryptoError::EncryptionFailed)?;

    Ok(buffer)
}

fn cbc_decrypt(key: &[u8; 32], iv: &[u8; BLOCK_SIZE], ciphertext: &[u8]) -> Result<Vec<u8>> {
    if ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(CryptoError::UnalignedData(ciphertext.len()));
    }

    let mut buffer = ciphertext.to_vec();
    Aes256CbcDec::new(key.into(), iv.into())
        .decrypt_padded_mut::<NoPadding>(&mut buffer)
        .map_err(|_| CryptoError::DecryptionFailed)?;

    Ok(buffer)
}

fn hmac_sha256(key: &[u8; 32], data: &[u8]) -> [u8; 32] {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key).expect("HMAC accepts any key size");
    mac.update(data);
    mac.finalize().into_bytes().into()
}

/// PIN Protocol Version 1
///
/// - Key derivation: SHA-256 of the shared secret, one key for both purposes
/// - Encryption: AES-256-CBC with an all-zero IV and no padding
/// - Authentication: first 16 bytes of HMAC-SHA-256
pub mod v1 {
    use super::*;

    /// Length of a V1 pinUvAuthParam
    pub const TAG_LEN: usize = 16;

    /// Derive encryption and HMAC keys from the ECDH shared secret
    ///
    /// In V1 both keys are SHA-256(sharedSecret).
    pub fn derive_keys(shared_secret: &[u8; 32]) -> ([u8; 32], [u8; 32]) {
        let key: [u8; 32] = Sha256::digest(shared_secret).into();
        (key, key)
    }

    /// Encrypt block-aligned plaintext with AES-256-CBC and a zero IV
    ///
    /// # Examples
    ///
    /// ```
    /// use fidopin_crypto::pin_protocol::v1;
    ///
    /// let key = [0x42u8; 32];
    /// let ciphertext = v1::encrypt(&key, &[0u8; 16]).unwrap();
    /// assert_eq!(ciphertext.len(), 16);
    /// ```
    pub fn encrypt(key: &[u8; 32], plaintext: &[u8]) -> Result<Vec<u8>> {
        cbc_encrypt(key, &[0u8; BLOCK_SIZE], plaintext)
    }

    /// Decrypt AES-256-CBC ciphertext produced with a zero IV
    pub fn decrypt(key: &[u8; 32], ciphertext: &[u8]) -> Result<Vec<u8>> {
        cbc_decrypt(key, &[0u8; BLOCK_SIZE], ciphertext)
    }

    /// Compute HMAC-SHA-256 and return the first 16 bytes
    pub fn authenticate(key: &[u8; 32], data: &[u8]) -> [u8; TAG_LEN] {
        let full = hmac_sha256(key, data);
        let mut out = [0u8; TAG_LEN];
        out.copy_from_slice(&full[..TAG_LEN]);
        out
    }

    /// Verify a V1 tag in constant time
    pub fn verify(key: &[u8; 32], data: &[u8], expected: &[u8]) -> bool {
        if expected.len() != TAG_LEN {
            return false;
        }
        authenticate(key, data)[..].ct_eq(expected).into()
    }
}

/// PIN Protocol Version 2
///
/// - Key derivation: HKDF-SHA-256 with a 32-byte zero salt, separate AES
///   and HMAC keys
/// - Encryption: AES-256-CBC with a random IV prepended to the ciphertext
/// - Authentication: full 32-byte HMAC-SHA-256
pub mod v2 {
    use super::*;

    use hkdf::Hkdf;
    use rand::RngCore;

    /// Length of a V2 pinUvAuthParam
    pub const TAG_LEN: usize = 32;

    const HMAC_KEY_INFO: &[u8] = b"CTAP2 HMAC key";
    const AES_KEY_INFO: &[u8] = b"CTAP2 AES key";

    fn hkdf_expand(shared_secret: &[u8; 32], info: &[u8]) -> Result<[u8; 32]> {
        let salt = [0u8; 32];
        let hkdf = Hkdf::<Sha256>::new(Some(&salt), shared_secret);
        let mut key = [0u8; 32];
        hkdf.expand(info, &mut key)
            .map_err(|_| CryptoError::KeyDerivationFailed)?;
        Ok(key)
    }

    /// HKDF-SHA-256(salt = 32 zero bytes, IKM = sharedSecret, info = "CTAP2 HMAC key")
    pub fn derive_hmac_key(shared_secret: &[u8; 32]) -> Result<[u8; 32]> {
        hkdf_expand(shared_secret, HMAC_KEY_INFO)
    }

    /// HKDF-SHA-256(salt = 32 zero bytes, IKM = sharedSecret, info = "CTAP2 AES key")
    pub fn derive_encryption_key(shared_secret: &[u8; 32]) -> Result<[u8; 32]> {
        hkdf_expand(shared_secret, AES_KEY_INFO)
    }

    /// Encrypt with a fresh random IV
    ///
    /// Format: `IV (16 bytes) || AES-256-CBC(key, IV, plaintext)`
    pub fn encrypt(key: &[u8; 32], plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut iv = [0u8; BLOCK_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut iv);
        encrypt_with_iv(key, &iv, plaintext)
    }

    /// Encrypt with a caller-supplied IV
    ///
    /// Only exposed so that known-answer tests can pin the IV.
    pub fn encrypt_with_iv(key: &[u8; 32], iv: &[u8; BLOCK_SIZE], plaintext: &[u8]) -> Result<Vec<u8>> {
        let ciphertext = cbc_encrypt(key, iv, plaintext)?;
        let mut output = Vec::with_capacity(BLOCK_SIZE + ciphertext.len());
        output.extend_from_slice(iv);
        output.extend_from_slice(&ciphertext);
        Ok(output)
    }

    /// Decrypt `IV || ciphertext`
    pub fn decrypt(key: &[u8; 32], ciphertext: &[u8]) -> Result<Vec<u8>> {
        if ciphertext.len() < BLOCK_SIZE {
            return Err(CryptoError::DecryptionFailed);
        }
        let (iv, data) = ciphertext.split_at(BLOCK_SIZE);
        let mut iv_block = [0u8; BLOCK_SIZE];
        iv_block.copy_from_slice(iv);
        cbc_decrypt(key, &iv_block, data)
    }

    /// Compute the full 32-byte HMAC-SHA-256
    pub fn authenticate(key: &[u8; 32], data: &[u8]) -> [u8; TAG_LEN] {
        hmac_sha256(key, data)
    }

    /// Verify a V2 tag in constant time
    pub fn verify(key: &[u8; 32], data: &[u8], expected: &[u8]) -> bool {
        if expected.len() != TAG_LEN {
            return false;
        }
        authenticate(key, data)[..].ct_eq(expected).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // SHA-256 of 32 zero bytes
    const SHA256_ZEROS: [u8; 32] = [
        0x66, 0x68, 0x7a, 0xad, 0xf8, 0x62, 0xbd, 0x77, 0x6c, 0x8f, 0xc1, 0x8b, 0x8e, 0x9f, 0x8e,
        0x20, 0x08, 0x97, 0x14, 0x85, 0x6e, 0xe2, 0x33, 0xb3, 0x90, 0x2a, 0x59, 0x1d, 0x0d, 0x5f,
        0x29, 0x25,
    ];

    #[test]
    fn test_v1_derive_keys_known_answer() {
        let (enc_key, hmac_key) = v1::derive_keys(&[0u8; 32]);
        assert_eq!(enc_key, SHA256_ZEROS);
        assert_eq!(enc_key, hmac_key);
    }

    #[test]
    fn test_v1_encrypt_decrypt() {
        let key = [0x42u8; 32];
        let plaintext = [0x55u8; 64];

        let ciphertext = v1::encrypt(&key, &plaintext).unwrap();
        assert_eq!(ciphertext.len(), 64);
        assert_ne!(&ciphertext[..], &plaintext[..]);

        let decrypted = v1::decrypt(&key, &ciphertext).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_v1_is_deterministic() {
        let key = [0x42u8; 32];
        let a = v1::encrypt(&key, &[7u8; 32]).unwrap();
        let b = v1::encrypt(&key, &[7u8; 32]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_unaligned_plaintext_is_rejected() {
        let key = [0x42u8; 32];
        assert_eq!(
            v1::encrypt(&key, b"Hello, FIDO2!"),
            Err(CryptoError::UnalignedData(13))
        );
        assert_eq!(
            v2::encrypt(&key, b"Hello, FIDO2!"),
            Err(CryptoError::UnalignedData(13))
        );
    }

    #[test]
    fn test_v1_authenticate_and_verify() {
        let key = [0x42u8; 32];
        let data = b"new_pin_enc || pin_hash_enc";

        let mac = v1::authenticate(&key, data);
        assert_eq!(mac.len(), 16);
        assert!(v1::verify(&key, data, &mac));
        assert!(!v1::verify(&key, b"wrong_data", &mac));
    }

    #[test]
    fn test_v2_tag_extends_v1_tag() {
        let key = [0x42u8; 32];
        let data = b"client_data_hash";

        let short = v1::authenticate(&key, data);
        let full = v2::authenticate(&key, data);

        assert_eq!(full.len(), 32);
        assert_eq!(&full[..16], &short[..]);
    }

    #[test]
    fn test_verify_rejects_wrong_tag_length() {
        let key = [0x42u8; 32];
        let data = b"data";
        let full = v2::authenticate(&key, data);

        assert!(!v1::verify(&key, data, &full));
        assert!(!v2::verify(&key, data, &full[..16]));
    }

    #[test]
    fn test_v2_encrypt_prepends_iv() {
        let key = [0x42u8; 32];
        let iv = [0x24u8; 16];
        let plaintext = [0x99u8; 64];

        let ciphertext = v2::encrypt_with_iv(&key, &iv, &plaintext).unwrap();
        assert_eq!(ciphertext.len(), 80);
        assert_eq!(&ciphertext[..16], &iv);

        let decrypted = v2::decrypt(&key, &ciphertext).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_v2_random_iv_differs() {
        let key = [0x42u8; 32];
        let a = v2::encrypt(&key, &[1u8; 16]).unwrap();
        let b = v2::encrypt(&key, &[1u8; 16]).unwrap();
        assert_ne!(a, b);
        assert_eq!(v2::decrypt(&key, &a).unwrap(), v2::decrypt(&key, &b).unwrap());
    }

    #[test]
    fn test_v2_decrypt_short_input() {
        let key = [0x42u8; 32];
        assert_eq!(v2::decrypt(&key, &[0u8; 8]), Err(CryptoError::DecryptionFailed));
    }

    // Z.x of the RFC 5903 section 8.1 P-256 exchange
    const RFC5903_SHARED_X: &str = "d6840f6b42f6edafd13116e0e12565202fef8e9ece7dce03812464d04b9442de";

    fn shared(hex_str: &str) -> [u8; 32] {
        hex::decode(hex_str).unwrap().try_into().unwrap()
    }

    #[test]
    fn test_v1_derive_keys_rfc5903_secret() {
        let (key, _) = v1::derive_keys(&shared(RFC5903_SHARED_X));
        assert_eq!(
            hex::encode(key),
            "0519dc09b36efad1d00aef1d5b53b100202eb910b5de0dede75f190a357a367d"
        );
    }

    #[test]
    fn test_v2_derive_keys_known_answer() {
        let secret = shared(RFC5903_SHARED_X);
        assert_eq!(
            hex::encode(v2::derive_hmac_key(&secret).unwrap()),
            "b9111d382554aa6ba0a8704b14ba83e59260204b3ed2e08bf1c887602f9d4636"
        );
        assert_eq!(
            hex::encode(v2::derive_encryption_key(&secret).unwrap()),
            "41c8213da7d845552c23da07f946f6fe28951e81f62e2103043af94b29fe1b18"
        );
    }

    #[test]
    fn test_v2_derive_keys() {
        let shared_secret = [0x55u8; 32];
        let hmac_key = v2::derive_hmac_key(&shared_secret).unwrap();
        let enc_key = v2::derive_encryption_key(&shared_secret).unwrap();

        assert_ne!(hmac_key, enc_key);
        assert_eq!(hmac_key, v2::derive_hmac_key(&shared_secret).unwrap());

        // V2 keys never coincide with the V1 hash
        let (v1_key, _) = v1::derive_keys(&shared_secret);
        assert_ne!(v1_key, hmac_key);
        assert_ne!(v1_key, enc_key);
    }
}
