//! Cryptographic primitives for the CTAP2 PIN/UV auth protocols
//!
//! - [`ecdh`]: ephemeral P-256 key pairs and ECDH shared secrets
//! - [`pin_protocol`]: key derivation, encryption and authentication for
//!   PIN/UV auth protocol one and two
//!
//! Spec: <https://fidoalliance.org/specs/fido-v2.1-ps-20210615/fido-client-to-authenticator-protocol-v2.1-ps-20210615.html#pinProto1>

pub mod ecdh;
pub mod error;
pub mod pin_protocol;

pub use ecdh::KeyPair;
pub use error::{CryptoError, Result};
