//! Trust plane (C8): Ed25519 challenge–response node authentication with
//! nonce replay protection, session lifetimes, and per-peer rate limits.
//!
//! [`AuthManager`] is the sole entry point: it consumes inbound
//! [`nexdigi_proto::ControlMessage`]s carrying auth-handshake bodies and
//! returns the reply to send, exactly mirroring the Sans-IO shape of
//! `nexdigi-core`'s `DigipeaterEngine`.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod error;
mod handshake;
mod nonce_cache;
mod rate_limit;
mod session;
mod trust_store;

pub use error::AuthError;
pub use handshake::AuthManager;
pub use nonce_cache::{NonceCache, NonceOutcome, DEFAULT_WINDOW};
pub use rate_limit::{RateLimiter, DEFAULT_MAX_ATTEMPTS_PER_MINUTE};
pub use session::{Session, SessionState, SessionTable, DEFAULT_SESSION_TIMEOUT, PENDING_CHALLENGE_TIMEOUT};
pub use trust_store::{TrustPolicy, TrustedNodeTable};

/// Convenience `Result` alias used throughout this crate.
pub type Result<T> = std::result::Result<T, AuthError>;
