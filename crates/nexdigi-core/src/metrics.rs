//! Per-channel digipeater counters (C4's share of the observability
//! surface, §6): `digipeats`, `duplicatesSuppressed`, `servicedWideBlocked`,
//! `maxWideBlocked`, `uniqueStations`.
//!
//! Backed by `AtomicU64` rather than a mutex: counters are incremented from
//! the synchronous, non-blocking decision path (§5 says AX.25 codec and
//! priority classification never suspend) and read concurrently by the
//! observability surface. All counters are monotonically non-decreasing,
//! per §7's propagation policy.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// A point-in-time snapshot of [`DigipeaterMetrics`], suitable for
/// serializing to an observability client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct DigipeaterSnapshot {
    /// Frames successfully serviced and retransmitted.
    pub digipeats: u64,
    /// Frames dropped as duplicates of a recently-seen fingerprint.
    pub duplicates_suppressed: u64,
    /// `WIDE1` hops skipped because the channel role is `Wide`, not `FillIn`.
    pub serviced_wide_blocked: u64,
    /// `WIDEn` hops skipped because `n` exceeded the channel's `max_wide_n`.
    pub max_wide_blocked: u64,
    /// Count of distinct source stations heard on this channel.
    pub unique_stations: u64,
}

/// Atomic counters for one digipeater channel.
#[derive(Debug, Default)]
pub struct DigipeaterMetrics {
    digipeats: AtomicU64,
    duplicates_suppressed: AtomicU64,
    serviced_wide_blocked: AtomicU64,
    max_wide_blocked: AtomicU64,
    stations: Mutex<HashSet<String>>,
}

impl DigipeaterMetrics {
    /// Builds a zeroed counter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_digipeat(&self) {
        self.digipeats.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_duplicate(&self) {
        self.duplicates_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_serviced_wide_blocked(&self) {
        self.serviced_wide_blocked.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_max_wide_blocked(&self) {
        self.max_wide_blocked.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_station(&self, source_base: &str) {
        let mut stations = self.stations.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        stations.insert(source_base.to_string());
    }

    /// Takes a consistent snapshot of all counters.
    #[must_use]
    pub fn snapshot(&self) -> DigipeaterSnapshot {
        let unique_stations =
            self.stations.lock().unwrap_or_else(std::sync::PoisonError::into_inner).len() as u64;
        DigipeaterSnapshot {
            digipeats: self.digipeats.load(Ordering::Relaxed),
            duplicates_suppressed: self.duplicates_suppressed.load(Ordering::Relaxed),
            serviced_wide_blocked: self.serviced_wide_blocked.load(Ordering::Relaxed),
            max_wide_blocked: self.max_wide_blocked.load(Ordering::Relaxed),
            unique_stations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        let m = DigipeaterMetrics::new();
        let s = m.snapshot();
        assert_eq!(s.digipeats, 0);
        assert_eq!(s.unique_stations, 0);
    }

    #[test]
    fn stations_dedupe_by_base() {
        let m = DigipeaterMetrics::new();
        m.record_station("N0CALL");
        m.record_station("N0CALL");
        m.record_station("N1CALL");
        assert_eq!(m.snapshot().unique_stations, 2);
    }
}
