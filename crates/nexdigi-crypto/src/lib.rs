//! Ed25519 node identity: key generation, signing, and verification — the
//! cryptographic base `nexdigi-trust` (C8) builds its challenge–response
//! protocol on.
//!
//! Pure and deterministic given its inputs; randomness is only consumed for
//! key generation and always drawn from the OS CSPRNG (challenge bytes and
//! nonces are produced by the caller via [`nexdigi_core::Environment`], not
//! here, so the trust plane stays testable with a seeded environment).

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod error;
mod identity;

pub use error::CryptoError;
pub use identity::{NodeIdentity, PublicKey};

/// Convenience `Result` alias used throughout this crate.
pub type Result<T> = std::result::Result<T, CryptoError>;
