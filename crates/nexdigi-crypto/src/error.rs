//! Identity-key errors.

use thiserror::Error;

/// Errors produced by node identity key handling (C8's cryptographic base).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CryptoError {
    /// A public key string did not decode to 32 bytes of valid base64.
    #[error("malformed public key: {0}")]
    MalformedPublicKey(String),
    /// The decoded bytes were not a valid Ed25519 verifying key.
    #[error("invalid Ed25519 public key")]
    InvalidPublicKey,
    /// Signature verification failed.
    #[error("signature verification failed")]
    VerificationFailed,
}
