//! Per-peer rate limiting on auth attempts (§4.8 "Rate limiting").

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use nexdigi_core::Environment;
use nexdigi_proto::Callsign;

/// Default maximum `AUTH_REQUEST` attempts accepted per peer per minute.
pub const DEFAULT_MAX_ATTEMPTS_PER_MINUTE: u32 = 5;

/// Default cap on distinct peer callsigns tracked at once. `check()` runs
/// against `msg.from` before any trust/signature verification, so an
/// attacker sending requests under an unbounded stream of spoofed callsigns
/// must not grow this table without bound; the earliest-tracked peer is
/// evicted first once the cap is reached, the same insertion-order bound
/// `nexdigi_core::SeenCache` applies to its fingerprint table.
pub const DEFAULT_MAX_TRACKED_PEERS: usize = 10_000;

const WINDOW: Duration = Duration::from_secs(60);

/// Sliding-window rate limiter keyed by peer callsign.
pub struct RateLimiter<E: Environment> {
    env: E,
    max_per_minute: u32,
    max_tracked_peers: usize,
    attempts: HashMap<Callsign, VecDeque<E::Instant>>,
    /// Order in which peers were last touched, oldest first, for eviction.
    touch_order: VecDeque<Callsign>,
}

impl<E: Environment> RateLimiter<E> {
    /// Builds a limiter with the default budget.
    #[must_use]
    pub fn new(env: E) -> Self {
        Self::with_max_per_minute(env, DEFAULT_MAX_ATTEMPTS_PER_MINUTE)
    }

    /// Builds a limiter with an explicit per-minute budget.
    #[must_use]
    pub fn with_max_per_minute(env: E, max_per_minute: u32) -> Self {
        Self::with_limits(env, max_per_minute, DEFAULT_MAX_TRACKED_PEERS)
    }

    /// Builds a limiter with an explicit per-minute budget and tracked-peer
    /// cap.
    #[must_use]
    pub fn with_limits(env: E, max_per_minute: u32, max_tracked_peers: usize) -> Self {
        Self { env, max_per_minute, max_tracked_peers, attempts: HashMap::new(), touch_order: VecDeque::new() }
    }

    /// Records an attempt from `peer` and reports whether it is within
    /// budget. Always records the attempt internally (even when over
    /// budget) so the peer stays throttled for the remainder of the
    /// window.
    pub fn check(&mut self, peer: &Callsign) -> bool {
        let now = self.env.now();
        let is_new_peer = !self.attempts.contains_key(peer);
        let window = self.attempts.entry(peer.clone()).or_default();
        while let Some(&oldest) = window.front() {
            if now - oldest > WINDOW {
                window.pop_front();
            } else {
                break;
            }
        }

        let within_budget = (window.len() as u32) < self.max_per_minute;
        if within_budget {
            window.push_back(now);
        }

        if is_new_peer {
            self.touch_order.push_back(peer.clone());
            self.evict_oldest_tracked_peers();
        }

        within_budget
    }

    /// Evicts the earliest-tracked peers, oldest first, once the
    /// tracked-peer count exceeds `max_tracked_peers`.
    fn evict_oldest_tracked_peers(&mut self) {
        while self.attempts.len() > self.max_tracked_peers {
            let Some(oldest) = self.touch_order.pop_front() else { break };
            self.attempts.remove(&oldest);
        }
    }
}
