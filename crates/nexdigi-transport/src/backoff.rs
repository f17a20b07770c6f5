//! Bounded exponential backoff with jitter, for KISS-over-TCP reconnects
//! (§4.3: initial 1s, factor 2, cap 30s, jitter ≤25%).
//!
//! Pure and `Environment`-driven (only consumes `random_unit` for jitter) so
//! a simulation harness gets a deterministic, seed-reproducible sequence
//! (the "Backoff jitter source" ambient addition in the governing
//! specification).

use std::time::Duration;

use nexdigi_core::Environment;

/// Initial backoff delay.
pub const INITIAL_DELAY: Duration = Duration::from_secs(1);
/// Multiplicative growth factor applied after each attempt.
pub const FACTOR: f64 = 2.0;
/// Maximum backoff delay.
pub const MAX_DELAY: Duration = Duration::from_secs(30);
/// Maximum jitter fraction applied to each delay (±25%).
pub const JITTER_FRACTION: f64 = 0.25;

/// Stateful backoff sequence generator.
pub struct Backoff<E: Environment> {
    env: E,
    current: Duration,
}

impl<E: Environment> Backoff<E> {
    /// Builds a backoff generator starting at [`INITIAL_DELAY`].
    #[must_use]
    pub fn new(env: E) -> Self {
        Self { env, current: INITIAL_DELAY }
    }

    /// Returns the next delay to wait before reconnecting, applying jitter,
    /// then grows the underlying (unjittered) delay toward [`MAX_DELAY`].
    pub fn next_delay(&mut self) -> Duration {
        let base = self.current;
        self.current = Duration::from_secs_f64((self.current.as_secs_f64() * FACTOR).min(MAX_DELAY.as_secs_f64()));

        let jitter_unit = self.env.random_unit(); // [0, 1)
        let jitter_frac = (jitter_unit * 2.0 - 1.0) * JITTER_FRACTION; // [-0.25, 0.25)
        let scale = (1.0 + jitter_frac).max(0.0);
        Duration::from_secs_f64(base.as_secs_f64() * scale)
    }

    /// Resets the sequence to [`INITIAL_DELAY`], called on a successful
    /// connection.
    pub fn reset(&mut self) {
        self.current = INITIAL_DELAY;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexdigi_core::test_support::ManualClock;

    #[test]
    fn grows_exponentially_and_caps() {
        let mut backoff = Backoff::new(ManualClock::new());
        let mut delays = Vec::new();
        for _ in 0..10 {
            delays.push(backoff.next_delay());
        }
        // Unjittered sequence would be 1,2,4,8,16,30,30,30,30,30; with ≤25%
        // jitter every delay must stay within that envelope.
        let unjittered = [1.0, 2.0, 4.0, 8.0, 16.0, 30.0, 30.0, 30.0, 30.0, 30.0];
        for (delay, expected) in delays.iter().zip(unjittered.iter()) {
            let secs = delay.as_secs_f64();
            assert!(secs >= expected * 0.75 - 1e-9, "{secs} too small for base {expected}");
            assert!(secs <= expected * 1.25 + 1e-9, "{secs} too large for base {expected}");
        }
    }

    #[test]
    fn reset_returns_to_initial_delay() {
        let mut backoff = Backoff::new(ManualClock::new());
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        let delay = backoff.next_delay();
        assert!(delay.as_secs_f64() <= INITIAL_DELAY.as_secs_f64() * 1.25 + 1e-9);
    }

    #[test]
    fn never_exceeds_cap_even_with_jitter() {
        let mut backoff = Backoff::new(ManualClock::new());
        for _ in 0..20 {
            let delay = backoff.next_delay();
            assert!(delay.as_secs_f64() <= MAX_DELAY.as_secs_f64() * 1.25 + 1e-9);
        }
    }
}
