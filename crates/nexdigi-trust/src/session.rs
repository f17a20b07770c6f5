//! Auth session state (§3 "Auth Session"): per-peer handshake progress and
//! the authenticated-session lifetime.

use std::collections::HashMap;
use std::time::Duration;

use nexdigi_core::Environment;
use nexdigi_crypto::PublicKey;
use nexdigi_proto::Callsign;

/// Default session lifetime: a successful handshake's `isAuthenticated`
/// check holds for this long before re-authentication is required.
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(300);

/// Window within which a pending challenge issued to a peer remains valid.
pub const PENDING_CHALLENGE_TIMEOUT: Duration = Duration::from_secs(60);

/// One peer's handshake progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// We sent `AUTH_REQUEST` to this peer and are awaiting its challenge.
    AuthRequested,
    /// We received a challenge and replied with a signed response; awaiting
    /// `AUTH_SUCCESS`/`AUTH_FAILURE`.
    ChallengeResponded,
    /// The handshake completed successfully.
    Authenticated,
}

/// Per-peer session bookkeeping. A node plays both initiator and responder
/// roles across its peers, so one entry tracks whichever role-specific
/// fields are in use: `outstanding_request`/`state` track this node acting
/// as initiator, `pending_challenge` tracks this node acting as responder
/// to the peer's own `AUTH_REQUEST`.
#[derive(Debug, Clone)]
pub struct Session<I> {
    /// Initiator-side handshake progress.
    pub state: SessionState,
    /// When `state` became [`SessionState::Authenticated`]; the
    /// authenticated-session lifetime is measured from here.
    pub issued_at: I,
    /// The challenge this node (as responder) issued to the peer, and when,
    /// awaiting `AUTH_RESPONSE`.
    pub pending_challenge: Option<([u8; 32], I)>,
    /// The public key bound to this peer for the in-progress or completed
    /// handshake.
    pub bound_key: Option<PublicKey>,
}

/// Table of per-peer auth sessions, owned by the trust-plane manager task
/// (§5's single-writer resource policy).
pub struct SessionTable<E: Environment> {
    env: E,
    timeout: Duration,
    sessions: HashMap<Callsign, Session<E::Instant>>,
}

impl<E: Environment> SessionTable<E> {
    /// Builds a table with the default 300s session timeout.
    #[must_use]
    pub fn new(env: E) -> Self {
        Self::with_timeout(env, DEFAULT_SESSION_TIMEOUT)
    }

    /// Builds a table with an explicit session timeout.
    #[must_use]
    pub fn with_timeout(env: E, timeout: Duration) -> Self {
        Self { env, timeout, sessions: HashMap::new() }
    }

    /// Current session state for `peer`, if any.
    #[must_use]
    pub fn get(&self, peer: &Callsign) -> Option<&Session<E::Instant>> {
        self.sessions.get(peer)
    }

    /// Mutable access, for the handshake state machine.
    pub fn entry(&mut self, peer: Callsign) -> &mut Session<E::Instant> {
        self.sessions.entry(peer).or_insert_with(|| Session {
            state: SessionState::AuthRequested,
            issued_at: self.env.now(),
            pending_challenge: None,
            bound_key: None,
        })
    }

    /// Discards the session for `peer` outright (handshake failure or
    /// cancellation — §5 "Cancellation of an individual auth handshake
    /// simply discards the session").
    pub fn discard(&mut self, peer: &Callsign) {
        self.sessions.remove(peer);
    }

    /// Records a successful handshake for `peer`.
    pub fn mark_authenticated(&mut self, peer: &Callsign, key: PublicKey) {
        let now = self.env.now();
        let session = self.entry(peer.clone());
        session.state = SessionState::Authenticated;
        session.issued_at = now;
        session.bound_key = Some(key);
        session.pending_challenge = None;
    }

    /// `true` while `peer`'s session is `Authenticated` and within the
    /// configured session timeout.
    #[must_use]
    pub fn is_authenticated(&self, peer: &Callsign) -> bool {
        let Some(session) = self.sessions.get(peer) else { return false };
        session.state == SessionState::Authenticated && self.env.now() - session.issued_at <= self.timeout
    }

    /// Prunes pending challenges older than [`PENDING_CHALLENGE_TIMEOUT`].
    pub fn expire_pending_challenges(&mut self) {
        let now = self.env.now();
        for session in self.sessions.values_mut() {
            if let Some((_, issued_at)) = session.pending_challenge {
                if now - issued_at > PENDING_CHALLENGE_TIMEOUT {
                    session.pending_challenge = None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexdigi_core::test_support::ManualClock;
    use nexdigi_crypto::NodeIdentity;

    fn peer() -> Callsign {
        "N0CALL".parse().unwrap()
    }

    #[test]
    fn unknown_peer_is_not_authenticated() {
        let table = SessionTable::new(ManualClock::new());
        assert!(!table.is_authenticated(&peer()));
    }

    #[test]
    fn authenticated_within_timeout() {
        let mut table = SessionTable::with_timeout(ManualClock::new(), Duration::from_secs(300));
        table.mark_authenticated(&peer(), NodeIdentity::generate().public_key());
        assert!(table.is_authenticated(&peer()));
    }

    #[test]
    fn expires_after_timeout() {
        let clock = ManualClock::new();
        let mut table = SessionTable::with_timeout(clock.clone(), Duration::from_secs(300));
        table.mark_authenticated(&peer(), NodeIdentity::generate().public_key());
        clock.advance(Duration::from_secs(301));
        assert!(!table.is_authenticated(&peer()));
    }

    #[test]
    fn discard_clears_session() {
        let mut table = SessionTable::new(ManualClock::new());
        table.mark_authenticated(&peer(), NodeIdentity::generate().public_key());
        table.discard(&peer());
        assert!(!table.is_authenticated(&peer()));
    }

    #[test]
    fn pending_challenges_expire_after_sixty_seconds() {
        let clock = ManualClock::new();
        let mut table = SessionTable::new(clock.clone());
        table.entry(peer()).pending_challenge = Some(([0u8; 32], clock.now()));
        clock.advance(Duration::from_secs(61));
        table.expire_pending_challenges();
        assert!(table.get(&peer()).unwrap().pending_challenge.is_none());
    }
}
