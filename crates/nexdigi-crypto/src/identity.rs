//! Ed25519 node identity: generation, signing, and public-key export/import
//! for the challenge–response auth protocol (§4.8).

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::CryptoError;

/// A node's Ed25519 identity keypair.
///
/// The signing key never leaves this type; only [`NodeIdentity::public_key`]
/// (a [`PublicKey`]) is ever serialized or sent to a peer.
#[derive(Clone)]
pub struct NodeIdentity {
    signing_key: SigningKey,
}

impl NodeIdentity {
    /// Generates a fresh identity from cryptographically secure entropy.
    #[must_use]
    pub fn generate() -> Self {
        let mut seed = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut seed);
        Self { signing_key: SigningKey::from_bytes(&seed) }
    }

    /// Builds an identity from a raw 32-byte seed, e.g. loaded from a
    /// persisted key file.
    #[must_use]
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self { signing_key: SigningKey::from_bytes(&seed) }
    }

    /// The raw 32-byte seed, for persistence.
    #[must_use]
    pub fn to_seed(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    /// This node's exportable public key.
    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        PublicKey { bytes: self.signing_key.verifying_key().to_bytes() }
    }

    /// Signs `message` (the 32-byte auth challenge), producing a raw
    /// 64-byte Ed25519 signature.
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }
}

/// An Ed25519 public key, exportable as base64 text for the trusted-node
/// table and the `AUTH_REQUEST` wire body.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PublicKey {
    bytes: [u8; 32],
}

impl PublicKey {
    /// Builds a public key from its raw 32 bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidPublicKey`] if the bytes do not decode
    /// to a valid Ed25519 point.
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, CryptoError> {
        VerifyingKey::from_bytes(&bytes).map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(Self { bytes })
    }

    /// The raw 32 bytes.
    #[must_use]
    pub fn to_bytes(self) -> [u8; 32] {
        self.bytes
    }

    /// Verifies `signature` over `message` against this public key.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::VerificationFailed`] if the signature does
    /// not verify.
    pub fn verify(&self, message: &[u8], signature: &[u8; 64]) -> Result<(), CryptoError> {
        let verifying_key = VerifyingKey::from_bytes(&self.bytes).map_err(|_| CryptoError::InvalidPublicKey)?;
        let sig = Signature::from_bytes(signature);
        verifying_key.verify(message, &sig).map_err(|_| CryptoError::VerificationFailed)
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicKey({})", self.to_base64())
    }
}

impl PublicKey {
    /// Encodes this key as standard base64 text, the on-disk/trust-table
    /// form.
    #[must_use]
    pub fn to_base64(self) -> String {
        BASE64.encode(self.bytes)
    }

    /// Decodes a base64-encoded public key.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::MalformedPublicKey`] if `text` is not valid
    /// base64 or does not decode to 32 bytes, or [`CryptoError::InvalidPublicKey`]
    /// if the bytes are not a valid Ed25519 point.
    pub fn from_base64(text: &str) -> Result<Self, CryptoError> {
        let decoded = BASE64.decode(text).map_err(|e| CryptoError::MalformedPublicKey(e.to_string()))?;
        let bytes: [u8; 32] =
            decoded.try_into().map_err(|_| CryptoError::MalformedPublicKey("expected 32 bytes".to_string()))?;
        Self::from_bytes(bytes)
    }
}

impl TryFrom<String> for PublicKey {
    type Error = CryptoError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_base64(&value)
    }
}

impl From<PublicKey> for String {
    fn from(key: PublicKey) -> Self {
        key.to_base64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify_round_trips() {
        let identity = NodeIdentity::generate();
        let challenge = [7u8; 32];
        let sig = identity.sign(&challenge);
        assert!(identity.public_key().verify(&challenge, &sig).is_ok());
    }

    #[test]
    fn verification_fails_for_wrong_key() {
        let a = NodeIdentity::generate();
        let b = NodeIdentity::generate();
        let challenge = [1u8; 32];
        let sig = a.sign(&challenge);
        assert!(matches!(b.public_key().verify(&challenge, &sig), Err(CryptoError::VerificationFailed)));
    }

    #[test]
    fn verification_fails_for_tampered_message() {
        let identity = NodeIdentity::generate();
        let sig = identity.sign(&[1u8; 32]);
        assert!(identity.public_key().verify(&[2u8; 32], &sig).is_err());
    }

    #[test]
    fn base64_round_trips() {
        let identity = NodeIdentity::generate();
        let pk = identity.public_key();
        let text = pk.to_base64();
        let back = PublicKey::from_base64(&text).unwrap();
        assert_eq!(pk, back);
    }

    #[test]
    fn seed_round_trips_to_same_identity() {
        let identity = NodeIdentity::generate();
        let seed = identity.to_seed();
        let restored = NodeIdentity::from_seed(seed);
        assert_eq!(identity.public_key(), restored.public_key());
    }

    #[test]
    fn rejects_malformed_base64() {
        assert!(matches!(PublicKey::from_base64("not base64!!"), Err(CryptoError::MalformedPublicKey(_))));
    }
}
