//! Replay-protection nonce cache: `(peer, nonce)` pairs with a 10-minute
//! age window (§3 "Nonce Cache").

use std::collections::HashMap;
use std::time::Duration;

use nexdigi_core::Environment;
use nexdigi_proto::Callsign;

/// Window within which a `(peer, nonce)` pair is considered a replay if seen
/// again.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(600);

/// Outcome of [`NonceCache::test_and_set`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonceOutcome {
    /// The nonce had not been seen from this peer within the window.
    Fresh,
    /// The nonce was already recorded for this peer within the window.
    Replayed,
}

/// Bounded-by-time cache of per-peer nonces, pruned lazily on insertion.
///
/// Single-writer: owned by the `nexdigi-trust` manager task, matching §5's
/// "single-writer/multi-reader resource" policy for shared auth state.
pub struct NonceCache<E: Environment> {
    env: E,
    window: Duration,
    seen: HashMap<(Callsign, [u8; 16]), E::Instant>,
}

impl<E: Environment> NonceCache<E> {
    /// Builds a cache with the default 10-minute window.
    #[must_use]
    pub fn new(env: E) -> Self {
        Self::with_window(env, DEFAULT_WINDOW)
    }

    /// Builds a cache with an explicit window, for tests.
    #[must_use]
    pub fn with_window(env: E, window: Duration) -> Self {
        Self { env, window, seen: HashMap::new() }
    }

    /// Tests whether `(peer, nonce)` was already recorded within the
    /// window and, if not, records it as seen now. Also prunes any entries
    /// for `peer` that have aged out.
    pub fn test_and_set(&mut self, peer: &Callsign, nonce: [u8; 16]) -> NonceOutcome {
        let now = self.env.now();
        let window = self.window;
        self.seen.retain(|(_, _), seen_at| now - *seen_at <= window);

        let key = (peer.clone(), nonce);
        if self.seen.contains_key(&key) {
            return NonceOutcome::Replayed;
        }
        self.seen.insert(key, now);
        NonceOutcome::Fresh
    }

    /// Current number of tracked nonces, for the observability surface.
    #[must_use]
    pub fn size(&self) -> usize {
        self.seen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexdigi_core::test_support::ManualClock;
    use std::str::FromStr;

    fn peer() -> Callsign {
        Callsign::from_str("N0CALL").unwrap()
    }

    #[test]
    fn fresh_nonce_then_replay_detected() {
        let mut cache = NonceCache::new(ManualClock::new());
        let nonce = [1u8; 16];
        assert_eq!(cache.test_and_set(&peer(), nonce), NonceOutcome::Fresh);
        assert_eq!(cache.test_and_set(&peer(), nonce), NonceOutcome::Replayed);
    }

    #[test]
    fn nonce_expires_after_window() {
        let clock = ManualClock::new();
        let mut cache = NonceCache::with_window(clock.clone(), Duration::from_secs(600));
        let nonce = [2u8; 16];
        cache.test_and_set(&peer(), nonce);
        clock.advance(Duration::from_secs(601));
        assert_eq!(cache.test_and_set(&peer(), nonce), NonceOutcome::Fresh);
    }

    #[test]
    fn different_peers_do_not_collide() {
        let mut cache = NonceCache::new(ManualClock::new());
        let nonce = [3u8; 16];
        assert_eq!(cache.test_and_set(&peer(), nonce), NonceOutcome::Fresh);
        let other: Callsign = "N1CALL".parse().unwrap();
        assert_eq!(cache.test_and_set(&other, nonce), NonceOutcome::Fresh);
    }
}
