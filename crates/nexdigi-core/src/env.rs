//! Environment abstraction for deterministic testing.
//!
//! Decouples protocol logic from system resources (time, randomness). The
//! seen-cache, digipeater engine, auth state machine, QoS token bucket, and
//! mesh-healing timers all take an `Environment` rather than calling
//! `Instant::now()`/`rand::random()` directly, so a simulation harness can
//! swap in a virtual clock and a seeded RNG without touching protocol logic.

use std::time::Duration;

/// Abstract environment providing time and randomness.
///
/// # Invariants
///
/// Implementations MUST guarantee:
/// - `now()` never goes backwards within a single execution context.
/// - `random_bytes()` uses cryptographically secure entropy in production.
pub trait Environment: Clone + Send + Sync + 'static {
    /// The specific instant type used by this environment.
    type Instant: Copy + Ord + Send + Sync + std::ops::Sub<Output = Duration>;

    /// Current time (monotonic).
    fn now(&self) -> Self::Instant;

    /// Current wall-clock time, Unix milliseconds. Used only where an
    /// absolute timestamp must be compared across nodes (the auth
    /// handshake's timestamp-freshness check, §4.8) — everything else uses
    /// [`Environment::now`]'s monotonic instant.
    fn wall_clock_millis(&self) -> i64;

    /// Sleeps for the specified duration. The only async method in the
    /// trait; only driver code (not protocol state machines) calls it.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;

    /// Fills the provided buffer with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`, e.g. for nonces or nonce-adjacent jitter.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }

    /// Generates a random value in `[0.0, 1.0)`, e.g. for weighted route
    /// selection and backoff jitter.
    fn random_unit(&self) -> f64 {
        let v = self.random_u64();
        // 53 bits of mantissa precision is enough for selection purposes.
        (v >> 11) as f64 / (1u64 << 53) as f64
    }
}

/// Production environment backed by real system time and OS-provided
/// randomness (via the `rand` crate's thread-local CSPRNG).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnvironment;

impl Environment for SystemEnvironment {
    type Instant = std::time::Instant;

    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }

    #[allow(clippy::expect_used)]
    fn wall_clock_millis(&self) -> i64 {
        // invariant: system clock is after the Unix epoch (1970-01-01).
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("system clock before Unix epoch")
            .as_millis() as i64
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        use rand::RngCore;
        rand::thread_rng().fill_bytes(buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_unit_is_bounded() {
        let env = SystemEnvironment;
        for _ in 0..100 {
            let v = env.random_unit();
            assert!((0.0..1.0).contains(&v));
        }
    }
}

/// Deterministic [`Environment`] for unit/integration tests across the
/// workspace: a manually-advanced clock and a seeded, reproducible RNG.
#[cfg(any(test, feature = "test-util"))]
pub mod test_support {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::Environment;

    /// A virtual instant: ticks elapsed since a [`ManualClock`]'s epoch.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
    pub struct Tick(Duration);

    impl std::ops::Sub for Tick {
        type Output = Duration;

        fn sub(self, rhs: Self) -> Duration {
            self.0.saturating_sub(rhs.0)
        }
    }

    /// A clock that only advances when told to, and an RNG seeded
    /// deterministically from a counter — for tests that need reproducible
    /// "randomness" (route selection ratios, jitter) without flakiness.
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        now: Arc<Mutex<Duration>>,
        rng_state: Arc<Mutex<u64>>,
    }

    impl Default for ManualClock {
        fn default() -> Self {
            Self::new()
        }
    }

    impl ManualClock {
        /// Builds a clock starting at time zero with a fixed RNG seed.
        #[must_use]
        pub fn new() -> Self {
            Self::with_seed(0x5EED_u64)
        }

        /// Builds a clock starting at time zero with the given RNG seed.
        #[must_use]
        pub fn with_seed(seed: u64) -> Self {
            Self { now: Arc::new(Mutex::new(Duration::ZERO)), rng_state: Arc::new(Mutex::new(seed)) }
        }

        /// Advances the clock by `duration`.
        pub fn advance(&self, duration: Duration) {
            let mut guard = self.now.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            *guard += duration;
        }
    }

    impl Environment for ManualClock {
        type Instant = Tick;

        fn now(&self) -> Self::Instant {
            Tick(*self.now.lock().unwrap_or_else(std::sync::PoisonError::into_inner))
        }

        fn wall_clock_millis(&self) -> i64 {
            self.now.lock().unwrap_or_else(std::sync::PoisonError::into_inner).as_millis() as i64
        }

        async fn sleep(&self, _duration: Duration) {
            // Tests advance time explicitly via `advance`; sleeping is a no-op.
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            // xorshift64*, good enough for deterministic test jitter.
            let mut guard = self.rng_state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            for chunk in buffer.chunks_mut(8) {
                let mut x = *guard;
                x ^= x << 13;
                x ^= x >> 7;
                x ^= x << 17;
                *guard = x;
                let bytes = x.wrapping_mul(0x2545_F491_4F6C_DD1D).to_be_bytes();
                chunk.copy_from_slice(&bytes[..chunk.len()]);
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn advance_moves_time_forward() {
            let clock = ManualClock::new();
            let t0 = clock.now();
            clock.advance(Duration::from_secs(5));
            let t1 = clock.now();
            assert_eq!(t1 - t0, Duration::from_secs(5));
        }

        #[test]
        fn random_bytes_is_reproducible_for_same_seed() {
            let a = ManualClock::with_seed(42);
            let b = ManualClock::with_seed(42);
            let mut buf_a = [0u8; 16];
            let mut buf_b = [0u8; 16];
            a.random_bytes(&mut buf_a);
            b.random_bytes(&mut buf_b);
            assert_eq!(buf_a, buf_b);
        }
    }
}
