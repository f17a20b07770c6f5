//! Trust-plane errors.

use thiserror::Error;

/// Errors produced by the auth handshake state machine (C8).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    /// No outstanding `AUTH_REQUEST` exists for this peer; an unsolicited
    /// `AUTH_CHALLENGE` was received.
    #[error("no outstanding auth request to {0}")]
    NoOutstandingRequest(String),

    /// No outstanding challenge exists for this peer; an unsolicited
    /// `AUTH_RESPONSE` was received.
    #[error("no outstanding challenge for {0}")]
    NoOutstandingChallenge(String),

    /// The message's timestamp fell outside the `[-60s, +300s]` freshness
    /// window relative to the local clock.
    #[error("stale timestamp from {0}")]
    StaleTimestamp(String),

    /// The `(peer, nonce)` pair was already present in the replay cache.
    #[error("nonce reused by {0}")]
    NonceReused(String),

    /// The response's Ed25519 signature did not verify against the peer's
    /// bound public key.
    #[error("signature invalid from {0}")]
    SignatureInvalid(String),

    /// The peer is not in the trusted-node table and the configured policy
    /// is not trust-on-first-use.
    #[error("{0} is not a trusted node")]
    UntrustedPeer(String),

    /// The peer exceeded its per-minute attempt budget; the message was
    /// dropped silently (no `AUTH_FAILURE` reply, per §7).
    #[error("rate limited: {0}")]
    RateLimited(String),
}
