//! Bounded TTL cache of recently digipeated frame fingerprints (C2).
//!
//! `test_and_set` is the only mutating operation: it reports whether the
//! fingerprint is new or a duplicate, atomically with respect to other
//! transports racing to digipeat the same frame. Eviction runs inline on
//! every insertion — expired entries first, then oldest-by-insertion-order
//! until the cache is back under capacity.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use sha1::{Digest, Sha1};
use tokio::sync::Mutex;

use crate::env::Environment;

/// Default time-to-live for a seen-cache entry.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5);

/// Default maximum number of tracked entries.
pub const DEFAULT_MAX_ENTRIES: usize = 1000;

/// A 20-byte SHA-1 fingerprint identifying a frame for dedup purposes.
///
/// Computed over `(source base, source SSID, payload bytes, destination
/// base)`. The digipeat path is intentionally excluded so the same packet
/// seen via different alias hops is treated as one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 20]);

impl Fingerprint {
    /// Computes the fingerprint of a received frame's identifying fields.
    #[must_use]
    pub fn compute(source_base: &str, source_ssid: u8, payload: &[u8], dest_base: &str) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(source_base.as_bytes());
        hasher.update([source_ssid]);
        hasher.update(payload);
        hasher.update(dest_base.as_bytes());
        Self(hasher.finalize().into())
    }
}

/// Outcome of a [`SeenCache::test_and_set`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestAndSet {
    /// The fingerprint was not present; it has now been recorded.
    New,
    /// The fingerprint was already present within its TTL window.
    Duplicate,
}

struct Inner<I> {
    entries: HashMap<Fingerprint, I>,
    /// Insertion order, for "oldest first" eviction once size-capped.
    order: VecDeque<Fingerprint>,
}

/// Bounded, TTL-expiring, single-writer/multi-reader cache of fingerprints.
pub struct SeenCache<E: Environment> {
    env: E,
    ttl: Duration,
    max_entries: usize,
    inner: Mutex<Inner<E::Instant>>,
}

impl<E: Environment> SeenCache<E> {
    /// Builds a cache with the given TTL and capacity.
    #[must_use]
    pub fn new(env: E, ttl: Duration, max_entries: usize) -> Self {
        Self {
            env,
            ttl,
            max_entries,
            inner: Mutex::new(Inner { entries: HashMap::new(), order: VecDeque::new() }),
        }
    }

    /// Builds a cache with the default TTL (5s) and capacity (1000 entries).
    #[must_use]
    pub fn with_defaults(env: E) -> Self {
        Self::new(env, DEFAULT_TTL, DEFAULT_MAX_ENTRIES)
    }

    /// Atomically tests whether `fingerprint` has been seen within the TTL
    /// window and, if not, records it as seen now.
    pub async fn test_and_set(&self, fingerprint: Fingerprint) -> TestAndSet {
        let now = self.env.now();
        let mut guard = self.inner.lock().await;

        Self::evict_expired(&mut guard, now, self.ttl);

        if let Some(seen_at) = guard.entries.get(&fingerprint) {
            if now - *seen_at <= self.ttl {
                return TestAndSet::Duplicate;
            }
        }

        guard.entries.insert(fingerprint, now);
        guard.order.push_back(fingerprint);

        while guard.order.len() > self.max_entries {
            if let Some(oldest) = guard.order.pop_front() {
                guard.entries.remove(&oldest);
            }
        }

        TestAndSet::New
    }

    /// Current number of tracked entries.
    pub async fn size(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    /// Configured TTL, exposed for the observability surface.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Configured maximum entry count, exposed for the observability surface.
    #[must_use]
    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    fn evict_expired(inner: &mut Inner<E::Instant>, now: E::Instant, ttl: Duration) {
        while let Some(&oldest) = inner.order.front() {
            let Some(seen_at) = inner.entries.get(&oldest) else {
                inner.order.pop_front();
                continue;
            };
            if now - *seen_at > ttl {
                inner.entries.remove(&oldest);
                inner.order.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::test_support::ManualClock;

    #[tokio::test]
    async fn first_sighting_is_new_second_is_duplicate() {
        let clock = ManualClock::new();
        let cache = SeenCache::new(clock, Duration::from_secs(5), 1000);
        let fp = Fingerprint::compute("N0CALL", 0, b"hello", "APRS");

        assert_eq!(cache.test_and_set(fp).await, TestAndSet::New);
        assert_eq!(cache.test_and_set(fp).await, TestAndSet::Duplicate);
        assert_eq!(cache.size().await, 1);
    }

    #[tokio::test]
    async fn expires_after_ttl() {
        let clock = ManualClock::new();
        let cache = SeenCache::new(clock.clone(), Duration::from_secs(5), 1000);
        let fp = Fingerprint::compute("N0CALL", 0, b"hello", "APRS");

        assert_eq!(cache.test_and_set(fp).await, TestAndSet::New);
        clock.advance(Duration::from_secs(6));
        assert_eq!(cache.test_and_set(fp).await, TestAndSet::New);
    }

    #[tokio::test]
    async fn path_excluded_from_fingerprint() {
        let fp_a = Fingerprint::compute("N0CALL", 0, b"same-payload", "APRS");
        let fp_b = Fingerprint::compute("N0CALL", 0, b"same-payload", "APRS");
        assert_eq!(fp_a, fp_b);
    }

    #[tokio::test]
    async fn evicts_oldest_when_over_capacity() {
        let clock = ManualClock::new();
        let cache = SeenCache::new(clock, Duration::from_secs(3600), 2);

        let fp1 = Fingerprint::compute("A", 0, b"1", "APRS");
        let fp2 = Fingerprint::compute("B", 0, b"2", "APRS");
        let fp3 = Fingerprint::compute("C", 0, b"3", "APRS");

        cache.test_and_set(fp1).await;
        cache.test_and_set(fp2).await;
        cache.test_and_set(fp3).await;

        assert_eq!(cache.size().await, 2);
        // fp1 was oldest, evicted; re-seeing it looks "new" again.
        assert_eq!(cache.test_and_set(fp1).await, TestAndSet::New);
    }
}
