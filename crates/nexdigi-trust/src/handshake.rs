//! Ed25519 challenge–response node authentication (C8, §4.8): the four-
//! message handshake, driven as a Sans-IO state machine — [`AuthManager::handle`]
//! consumes an inbound [`ControlMessage`] and returns the outbound message
//! (if any) for the caller (the Backbone Manager) to transmit. No I/O here.

use nexdigi_core::{Environment, Event, EventBus};
use nexdigi_crypto::{NodeIdentity, PublicKey};
use nexdigi_proto::{
    AuthChallengeBody, AuthFailureBody, AuthRequestBody, AuthResponseBody, Callsign, ControlMessage, MessageBody,
};

use crate::error::AuthError;
use crate::nonce_cache::{NonceCache, NonceOutcome};
use crate::rate_limit::RateLimiter;
use crate::session::{SessionState, SessionTable};
use crate::trust_store::{TrustPolicy, TrustedNodeTable};

/// Acceptable timestamp skew behind the local clock (§4.8: "-60s").
const MAX_CLOCK_SKEW_BEHIND_MS: i64 = 60_000;
/// Acceptable timestamp skew ahead of the local clock (§4.8: "+300s").
const MAX_CLOCK_SKEW_AHEAD_MS: i64 = 300_000;

/// Ed25519 challenge–response authentication manager. One instance per
/// node; owns the trusted-node table, nonce cache, rate limiter, and
/// session table for every peer.
pub struct AuthManager<E: Environment> {
    env: E,
    local: Callsign,
    identity: NodeIdentity,
    policy: TrustPolicy,
    trust_store: TrustedNodeTable,
    nonces: NonceCache<E>,
    rate_limiter: RateLimiter<E>,
    sessions: SessionTable<E>,
    events: Option<EventBus>,
}

impl<E: Environment> AuthManager<E> {
    /// Builds a manager for the local node identified by `local`.
    #[must_use]
    pub fn new(env: E, local: Callsign, identity: NodeIdentity, policy: TrustPolicy) -> Self {
        Self {
            nonces: NonceCache::new(env.clone()),
            rate_limiter: RateLimiter::new(env.clone()),
            sessions: SessionTable::new(env.clone()),
            env,
            local,
            identity,
            policy,
            trust_store: TrustedNodeTable::new(),
            events: None,
        }
    }

    /// Attaches an event bus for `AuthSucceeded`/`AuthFailed`/`AuthRateLimited`.
    #[must_use]
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Overrides the session timeout (production default
    /// [`crate::DEFAULT_SESSION_TIMEOUT`]).
    #[must_use]
    pub fn with_session_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.sessions = SessionTable::with_timeout(self.env.clone(), timeout);
        self
    }

    /// Overrides the per-peer rate limit (production default
    /// [`crate::DEFAULT_MAX_ATTEMPTS_PER_MINUTE`]).
    #[must_use]
    pub fn with_max_auth_attempts(mut self, max_per_minute: u32) -> Self {
        self.rate_limiter = RateLimiter::with_max_per_minute(self.env.clone(), max_per_minute);
        self
    }

    /// Pins a trusted public key for `peer`, e.g. from static configuration.
    pub fn pin_trusted_key(&mut self, peer: Callsign, key: PublicKey) {
        self.trust_store.pin(peer, key);
    }

    /// `true` while `peer`'s session is authenticated and within the
    /// session timeout.
    #[must_use]
    pub fn is_authenticated(&self, peer: &Callsign) -> bool {
        self.sessions.is_authenticated(peer)
    }

    /// Builds this node's identity public key, for the `AUTH_REQUEST` body.
    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        self.identity.public_key()
    }

    fn fresh_nonce(&self) -> [u8; 16] {
        let mut nonce = [0u8; 16];
        self.env.random_bytes(&mut nonce);
        nonce
    }

    fn envelope(&self, to: Callsign, nonce: [u8; 16], body: MessageBody) -> ControlMessage {
        ControlMessage { from: self.local.clone(), to, timestamp: self.env.wall_clock_millis(), nonce: Some(nonce), body }
    }

    fn check_timestamp(&self, peer: &Callsign, timestamp: i64) -> Result<(), AuthError> {
        let delta = timestamp - self.env.wall_clock_millis();
        if delta < -MAX_CLOCK_SKEW_BEHIND_MS || delta > MAX_CLOCK_SKEW_AHEAD_MS {
            return Err(AuthError::StaleTimestamp(peer.to_string()));
        }
        Ok(())
    }

    fn check_nonce(&mut self, peer: &Callsign, nonce: Option<[u8; 16]>) -> Result<(), AuthError> {
        let Some(nonce) = nonce else { return Ok(()) };
        match self.nonces.test_and_set(peer, nonce) {
            NonceOutcome::Fresh => Ok(()),
            NonceOutcome::Replayed => Err(AuthError::NonceReused(peer.to_string())),
        }
    }

    fn publish(&self, event: Event) {
        if let Some(events) = &self.events {
            events.publish(event);
        }
    }

    /// Builds an `AUTH_REQUEST`, recording this peer as having an
    /// outstanding initiator-side request, and returns the message to
    /// transmit.
    pub fn initiate(&mut self, peer: &Callsign) -> ControlMessage {
        let nonce = self.fresh_nonce();
        let session = self.sessions.entry(peer.clone());
        session.state = SessionState::AuthRequested;
        self.envelope(
            peer.clone(),
            nonce,
            MessageBody::AuthRequest(AuthRequestBody { public_key: self.identity.public_key().to_bytes(), algorithm: "ed25519".to_string() }),
        )
    }

    /// Dispatches one inbound control message to the auth handshake,
    /// returning the outbound reply (if any). Returns `Err` for validation
    /// failures; per §7, a rejection still yields `AUTH_FAILURE` unless the
    /// failure was a rate limit (silent).
    pub fn handle(&mut self, msg: ControlMessage) -> Result<Option<ControlMessage>, AuthError> {
        let peer = msg.from.clone();
        match &msg.body {
            MessageBody::AuthRequest(body) => self.handle_request(peer, msg.timestamp, msg.nonce, body.clone()).map(Some),
            MessageBody::AuthChallenge(body) => self.handle_challenge(peer, msg.timestamp, msg.nonce, body.clone()).map(Some),
            MessageBody::AuthResponse(body) => self.handle_response(peer, msg.timestamp, msg.nonce, body.clone()),
            MessageBody::AuthSuccess => {
                self.handle_success(&peer);
                Ok(None)
            }
            MessageBody::AuthFailure(body) => {
                self.handle_failure(&peer, &body.reason);
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    /// Step 1 (as responder): peer sent `AUTH_REQUEST`.
    fn handle_request(
        &mut self,
        peer: Callsign,
        timestamp: i64,
        nonce: Option<[u8; 16]>,
        body: AuthRequestBody,
    ) -> Result<ControlMessage, AuthError> {
        if !self.rate_limiter.check(&peer) {
            self.publish(Event::AuthRateLimited { peer: peer.clone() });
            return Err(AuthError::RateLimited(peer.to_string()));
        }
        self.check_timestamp(&peer, timestamp)?;
        self.check_nonce(&peer, nonce)?;

        let supplied = PublicKey::from_bytes(body.public_key).map_err(|_| AuthError::SignatureInvalid(peer.to_string()))?;
        let Some(bound_key) = self.trust_store.resolve(&peer, supplied, self.policy) else {
            return Err(AuthError::UntrustedPeer(peer.to_string()));
        };

        let mut challenge = [0u8; 32];
        self.env.random_bytes(&mut challenge);
        let now = self.env.now();
        let session = self.sessions.entry(peer.clone());
        session.pending_challenge = Some((challenge, now));
        session.bound_key = Some(bound_key);

        let out_nonce = self.fresh_nonce();
        Ok(self.envelope(peer, out_nonce, MessageBody::AuthChallenge(AuthChallengeBody { challenge })))
    }

    /// Step 2 (as initiator): peer sent `AUTH_CHALLENGE` in response to our
    /// earlier `AUTH_REQUEST`.
    fn handle_challenge(
        &mut self,
        peer: Callsign,
        timestamp: i64,
        nonce: Option<[u8; 16]>,
        body: AuthChallengeBody,
    ) -> Result<ControlMessage, AuthError> {
        self.check_timestamp(&peer, timestamp)?;
        self.check_nonce(&peer, nonce)?;

        let has_outstanding_request =
            matches!(self.sessions.get(&peer).map(|s| s.state), Some(SessionState::AuthRequested));
        if !has_outstanding_request {
            return Err(AuthError::NoOutstandingRequest(peer.to_string()));
        }

        let signature = self.identity.sign(&body.challenge);
        self.sessions.entry(peer.clone()).state = SessionState::ChallengeResponded;

        let out_nonce = self.fresh_nonce();
        Ok(self.envelope(peer, out_nonce, MessageBody::AuthResponse(AuthResponseBody { challenge: body.challenge, signature })))
    }

    /// Step 3 (as responder): peer sent `AUTH_RESPONSE` to our issued
    /// challenge. Returns `AUTH_SUCCESS`/`AUTH_FAILURE` to send back, or an
    /// `Err` for a replayed nonce, which is rejected silently and leaves any
    /// already-established session untouched.
    fn handle_response(
        &mut self,
        peer: Callsign,
        timestamp: i64,
        nonce: Option<[u8; 16]>,
        body: AuthResponseBody,
    ) -> Result<Option<ControlMessage>, AuthError> {
        if let Err(e) = self.check_timestamp(&peer, timestamp) {
            return Ok(Some(self.reject(peer, e)));
        }
        if let Err(e) = self.check_nonce(&peer, nonce) {
            // A replayed AUTH_RESPONSE must not tear down an already
            // established session (§8 scenario 5): report the reuse without
            // calling `reject`, which would discard session state.
            return Err(e);
        }

        let Some(session) = self.sessions.get(&peer) else {
            return Ok(Some(self.reject(peer.clone(), AuthError::NoOutstandingChallenge(peer.to_string()))));
        };
        let Some((expected_challenge, _)) = session.pending_challenge else {
            return Ok(Some(self.reject(peer.clone(), AuthError::NoOutstandingChallenge(peer.to_string()))));
        };
        let Some(bound_key) = session.bound_key else {
            return Ok(Some(self.reject(peer.clone(), AuthError::SignatureInvalid(peer.to_string()))));
        };

        if expected_challenge != body.challenge || bound_key.verify(&body.challenge, &body.signature).is_err() {
            return Ok(Some(self.reject(peer.clone(), AuthError::SignatureInvalid(peer.to_string()))));
        }

        self.sessions.mark_authenticated(&peer, bound_key);
        self.publish(Event::AuthSucceeded { peer: peer.clone() });
        let out_nonce = self.fresh_nonce();
        Ok(Some(self.envelope(peer, out_nonce, MessageBody::AuthSuccess)))
    }

    fn reject(&mut self, peer: Callsign, err: AuthError) -> ControlMessage {
        self.sessions.discard(&peer);
        self.publish(Event::AuthFailed { peer: peer.clone(), reason: err.to_string() });
        let nonce = self.fresh_nonce();
        self.envelope(peer, nonce, MessageBody::AuthFailure(AuthFailureBody { reason: err.to_string() }))
    }

    /// Step 4 success (as initiator).
    fn handle_success(&mut self, peer: &Callsign) {
        if let Some(key) = self.sessions.get(peer).and_then(|s| s.bound_key) {
            self.sessions.mark_authenticated(peer, key);
        } else if let Some(key) = self.trust_store.lookup(peer) {
            self.sessions.mark_authenticated(peer, key);
        }
        self.publish(Event::AuthSucceeded { peer: peer.clone() });
    }

    /// Step 4 failure (as initiator): discard the session.
    fn handle_failure(&mut self, peer: &Callsign, reason: &str) {
        self.sessions.discard(peer);
        self.publish(Event::AuthFailed { peer: peer.clone(), reason: reason.to_string() });
    }

    /// Periodic maintenance: prunes expired pending challenges. Callers
    /// drive this on the node's cleanup timer (§5 "session cleanup").
    pub fn expire_pending_challenges(&mut self) {
        self.sessions.expire_pending_challenges();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexdigi_core::test_support::ManualClock;

    fn node(env: ManualClock, name: &str) -> AuthManager<ManualClock> {
        AuthManager::new(env, name.parse().unwrap(), NodeIdentity::generate(), TrustPolicy::TrustOnFirstUse)
    }

    #[test]
    fn full_handshake_authenticates_both_views() {
        let env = ManualClock::new();
        let mut a = node(env.clone(), "N0CALL");
        let mut b = node(env, "N1CALL");

        let request = a.initiate(&"N1CALL".parse().unwrap());
        let challenge = b.handle(request).unwrap().expect("challenge expected");
        let response = a.handle(challenge).unwrap().expect("response expected");
        let success = b.handle(response).unwrap().expect("success expected");
        assert!(matches!(success.body, MessageBody::AuthSuccess));
        a.handle(success).unwrap();

        assert!(a.is_authenticated(&"N1CALL".parse().unwrap()));
        assert!(b.is_authenticated(&"N0CALL".parse().unwrap()));
    }

    #[test]
    fn replayed_response_nonce_is_rejected_without_affecting_session() {
        let env = ManualClock::new();
        let mut a = node(env.clone(), "N0CALL");
        let mut b = node(env, "N1CALL");

        let request = a.initiate(&"N1CALL".parse().unwrap());
        let challenge = b.handle(request).unwrap().unwrap();
        let response = a.handle(challenge).unwrap().unwrap();
        let success = b.handle(response.clone()).unwrap().unwrap();
        a.handle(success).unwrap();
        assert!(b.is_authenticated(&"N0CALL".parse().unwrap()));

        // Replaying the exact same AUTH_RESPONSE is rejected for nonce reuse,
        // but the already-established session is untouched.
        let replay = b.handle(response);
        assert!(matches!(replay, Err(AuthError::NonceReused(_))));
        assert!(b.is_authenticated(&"N0CALL".parse().unwrap()));
    }

    #[test]
    fn challenge_without_outstanding_request_is_rejected() {
        let env = ManualClock::new();
        let mut b = node(env, "N1CALL");
        let bogus = ControlMessage {
            from: "N0CALL".parse().unwrap(),
            to: "N1CALL".parse().unwrap(),
            timestamp: 0,
            nonce: Some([9u8; 16]),
            body: MessageBody::AuthChallenge(AuthChallengeBody { challenge: [0u8; 32] }),
        };
        assert!(matches!(b.handle(bogus), Err(AuthError::NoOutstandingRequest(_))));
    }

    #[test]
    fn tampered_signature_yields_auth_failure() {
        let env = ManualClock::new();
        let mut a = node(env.clone(), "N0CALL");
        let mut b = node(env, "N1CALL");

        let request = a.initiate(&"N1CALL".parse().unwrap());
        let challenge = b.handle(request).unwrap().unwrap();
        let mut response = a.handle(challenge).unwrap().unwrap();
        if let MessageBody::AuthResponse(body) = &mut response.body {
            body.signature[0] ^= 0xFF;
        }
        let outcome = b.handle(response).unwrap().unwrap();
        assert!(matches!(outcome.body, MessageBody::AuthFailure(_)));
        assert!(!b.is_authenticated(&"N0CALL".parse().unwrap()));
    }

    #[test]
    fn rate_limit_blocks_excess_requests_silently() {
        let env = ManualClock::new();
        let mut a = node(env.clone(), "N0CALL");
        let mut b = node(env, "N1CALL");
        for _ in 0..5 {
            let request = a.initiate(&"N1CALL".parse().unwrap());
            assert!(b.handle(request).is_ok());
        }
        let request = a.initiate(&"N1CALL".parse().unwrap());
        assert!(matches!(b.handle(request), Err(AuthError::RateLimited(_))));
    }

    #[test]
    fn require_trusted_rejects_unknown_peer() {
        let env = ManualClock::new();
        let mut a = node(env.clone(), "N0CALL");
        let mut b = AuthManager::new(env, "N1CALL".parse().unwrap(), NodeIdentity::generate(), TrustPolicy::RequireTrusted);

        let request = a.initiate(&"N1CALL".parse().unwrap());
        assert!(matches!(b.handle(request), Err(AuthError::UntrustedPeer(_))));
    }
}
