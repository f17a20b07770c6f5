//! Digipeater Engine (C4): the per-channel WIDE-N state machine that turns
//! a received AX.25 UI frame into a decision — drop, repeat, and/or hand off
//! to the Backbone Manager.
//!
//! This is a Sans-IO state machine: [`DigipeaterEngine::process`] consumes
//! a parsed frame and returns a list of [`DigipeatAction`]s for the caller
//! (the owning channel task) to execute. No transport I/O happens here.

use std::time::Duration;

use nexdigi_proto::{Ax25Address, Ax25Frame, Callsign};

use crate::env::Environment;
use crate::error::CoreError;
use crate::metrics::{DigipeaterMetrics, DigipeaterSnapshot};
use crate::priority::Priority;
use crate::seen_cache::{Fingerprint, SeenCache, TestAndSet};

/// Default interval between station-ID beacons when `id_on_repeat` is set
/// (every 10 minutes, the common FCC Part 97 station identification period).
pub const DEFAULT_ID_INTERVAL: Duration = Duration::from_secs(600);

/// Channel operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMode {
    /// Digipeats matching frames per the WIDE-N rules.
    Digipeat,
    /// Receives and (if `igate_forward`) hands frames to the backbone, but
    /// never retransmits on RF.
    ReceiveOnly,
    /// Channel is inactive.
    Disabled,
}

/// Channel digipeat role, controlling which alias classes it services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelRole {
    /// Services `WIDE1` hops only.
    FillIn,
    /// Services `WIDE2`..`WIDEn` hops only.
    Wide,
}

/// Per-channel digipeater configuration (§4.4).
#[derive(Debug, Clone)]
pub struct DigipeaterConfig {
    /// Operating mode.
    pub mode: ChannelMode,
    /// Digipeat role.
    pub role: ChannelRole,
    /// This channel's own callsign, used for exact-address servicing and
    /// for the optionally-inserted own-callsign hop.
    pub callsign: Callsign,
    /// Additional personal aliases serviced exactly (no SSID decrement),
    /// same as `callsign` but under a different identity (e.g. a tactical
    /// alias).
    pub personal_aliases: Vec<Callsign>,
    /// Maximum `WIDEn` hop count this channel will service, `1..=7`.
    pub max_wide_n: u8,
    /// Insert the channel's own callsign as a marked hop immediately before
    /// the serviced alias.
    pub append_callsign: bool,
    /// Periodically beacon this channel's own callsign as a station ID.
    pub id_on_repeat: bool,
    /// Forward frames to the Backbone Manager for APRS-IS/backbone
    /// distribution.
    pub igate_forward: bool,
}

impl DigipeaterConfig {
    /// Default `max_wide_n` per §4.4.
    pub const DEFAULT_MAX_WIDE_N: u8 = 2;

    /// Validates this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidMaxWideN`] if `max_wide_n` is outside
    /// `1..=7`.
    pub fn validate(&self) -> Result<(), CoreError> {
        if !(1..=7).contains(&self.max_wide_n) {
            return Err(CoreError::InvalidMaxWideN(self.max_wide_n));
        }
        Ok(())
    }
}

/// An action for the owning channel task to execute after
/// [`DigipeaterEngine::process`] returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DigipeatAction {
    /// Retransmit this (mutated) frame on the owning channel's transport.
    Repeat(Ax25Frame),
    /// Hand the (unmutated) original frame to the Backbone Manager with the
    /// given priority.
    HandoffToBackbone {
        /// The original, un-serviced frame.
        frame: Ax25Frame,
        /// Priority to enqueue with on the backbone side.
        priority: Priority,
    },
}

/// Parses the hop-count suffix of a generic `WIDEn` alias base, e.g.
/// `"WIDE2"` -> `Some(2)`. Returns `None` for non-`WIDE*` bases or a
/// non-numeric suffix.
fn wide_hop_count(base: &str) -> Option<u8> {
    base.strip_prefix("WIDE").and_then(|rest| rest.parse().ok())
}

/// Per-channel WIDE-N digipeat state machine (C4).
pub struct DigipeaterEngine<E: Environment> {
    config: DigipeaterConfig,
    seen: SeenCache<E>,
    metrics: DigipeaterMetrics,
}

impl<E: Environment> DigipeaterEngine<E> {
    /// Builds an engine for one channel.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidMaxWideN`] if `config.max_wide_n` is
    /// outside `1..=7`.
    pub fn new(
        config: DigipeaterConfig,
        env: E,
        seen_ttl: Duration,
        seen_max_entries: usize,
    ) -> Result<Self, CoreError> {
        config.validate()?;
        Ok(Self { seen: SeenCache::new(env, seen_ttl, seen_max_entries), config, metrics: DigipeaterMetrics::new() })
    }

    /// This channel's configuration.
    #[must_use]
    pub fn config(&self) -> &DigipeaterConfig {
        &self.config
    }

    /// A snapshot of this channel's counters.
    #[must_use]
    pub fn metrics(&self) -> DigipeaterSnapshot {
        self.metrics.snapshot()
    }

    /// The channel's seen-cache size, for the observability surface.
    pub async fn seen_cache_size(&self) -> usize {
        self.seen.size().await
    }

    /// Runs the decision algorithm (§4.4) on one received, already-parsed
    /// frame, returning the actions the caller must execute.
    pub async fn process(&self, frame: &Ax25Frame) -> Vec<DigipeatAction> {
        let fingerprint = Fingerprint::compute(
            frame.source.callsign.base(),
            frame.source.callsign.ssid(),
            &frame.payload,
            frame.destination.callsign.base(),
        );

        if self.seen.test_and_set(fingerprint).await == TestAndSet::Duplicate {
            self.metrics.record_duplicate();
            return Vec::new();
        }
        self.metrics.record_station(frame.source.callsign.base());

        if self.config.mode != ChannelMode::Digipeat {
            return self.maybe_handoff(frame);
        }

        let Some(candidate_idx) = frame.digipeaters.iter().position(|a| !a.h_bit) else {
            return Vec::new();
        };
        let candidate = frame.digipeaters[candidate_idx].clone();
        let base = candidate.callsign.base();

        let own_hop = self.config.append_callsign.then(|| Ax25Address::new(self.config.callsign.clone()));
        let mut mutated = frame.clone();

        let serviced = if candidate.callsign == self.config.callsign
            || self.config.personal_aliases.contains(&candidate.callsign)
        {
            mutated.service_exact_address(&candidate.callsign, own_hop)
        } else if base == "WIDE1" {
            if self.config.role != ChannelRole::FillIn {
                self.metrics.record_serviced_wide_blocked();
                return Vec::new();
            }
            mutated.service_wide_alias("WIDE1", own_hop)
        } else if let Some(n) = wide_hop_count(base) {
            if self.config.role != ChannelRole::Wide {
                return Vec::new();
            }
            if n > self.config.max_wide_n {
                self.metrics.record_max_wide_blocked();
                return Vec::new();
            }
            mutated.service_wide_alias(base, own_hop)
        } else {
            false
        };

        if !serviced {
            return Vec::new();
        }

        self.metrics.record_digipeat();
        let mut actions = vec![DigipeatAction::Repeat(mutated)];
        actions.extend(self.maybe_handoff(frame));
        actions
    }

    fn maybe_handoff(&self, frame: &Ax25Frame) -> Vec<DigipeatAction> {
        if self.config.igate_forward {
            vec![DigipeatAction::HandoffToBackbone { frame: frame.clone(), priority: Priority::Normal }]
        } else {
            Vec::new()
        }
    }

    /// Builds a one-address-list station-ID beacon frame (destination
    /// `ID`, no digipeater path) for `id_on_repeat` channels. Callers drive
    /// the interval timer; this is pure frame construction.
    #[must_use]
    pub fn id_beacon_frame(&self) -> Ax25Frame {
        Ax25Frame {
            destination: Ax25Address::new(Callsign::new("ID", 0).unwrap_or_else(|_| self.config.callsign.clone())),
            source: Ax25Address::new(self.config.callsign.clone()),
            digipeaters: Vec::new(),
            payload: bytes::Bytes::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::test_support::ManualClock;
    use bytes::Bytes;

    fn addr(base: &str, ssid: u8) -> Ax25Address {
        Ax25Address::new(Callsign::new(base, ssid).unwrap())
    }

    fn base_config(role: ChannelRole, mode: ChannelMode) -> DigipeaterConfig {
        DigipeaterConfig {
            mode,
            role,
            callsign: Callsign::new("DIGI", 0).unwrap(),
            personal_aliases: Vec::new(),
            max_wide_n: 2,
            append_callsign: true,
            id_on_repeat: false,
            igate_forward: false,
        }
    }

    fn sample_frame(digipeaters: Vec<Ax25Address>) -> Ax25Frame {
        Ax25Frame {
            destination: addr("APRS", 0),
            source: addr("N0CALL", 0),
            digipeaters,
            payload: Bytes::from_static(b"!4903.50N/07201.75W-test"),
        }
    }

    async fn engine(config: DigipeaterConfig) -> DigipeaterEngine<ManualClock> {
        DigipeaterEngine::new(config, ManualClock::new(), Duration::from_secs(5), 1000).unwrap()
    }

    #[tokio::test]
    async fn fill_in_services_wide1_and_inserts_own_callsign() {
        let eng = engine(base_config(ChannelRole::FillIn, ChannelMode::Digipeat)).await;
        let frame = sample_frame(vec![addr("WIDE1", 1), addr("WIDE2", 2)]);
        let actions = eng.process(&frame).await;
        assert_eq!(actions.len(), 1);
        let DigipeatAction::Repeat(out) = &actions[0] else { panic!("expected Repeat") };
        assert_eq!(out.digipeaters[0].callsign.base(), "DIGI");
        assert!(out.digipeaters[0].h_bit);
        assert_eq!(out.digipeaters[1].callsign.base(), "WIDE1");
        assert_eq!(out.digipeaters[1].callsign.ssid(), 0);
        assert!(out.digipeaters[1].h_bit);
        assert_eq!(out.digipeaters[2].callsign.ssid(), 2);
        assert_eq!(eng.metrics().digipeats, 1);
    }

    #[tokio::test]
    async fn wide_role_blocked_on_wide1() {
        let eng = engine(base_config(ChannelRole::Wide, ChannelMode::Digipeat)).await;
        let frame = sample_frame(vec![addr("WIDE1", 1), addr("WIDE2", 2)]);
        let actions = eng.process(&frame).await;
        assert!(actions.is_empty());
        assert_eq!(eng.metrics().serviced_wide_blocked, 1);
    }

    #[tokio::test]
    async fn wide_role_services_wide2_within_budget() {
        let eng = engine(base_config(ChannelRole::Wide, ChannelMode::Digipeat)).await;
        let frame = sample_frame(vec![addr("WIDE2", 2)]);
        let actions = eng.process(&frame).await;
        assert_eq!(actions.len(), 1);
        assert_eq!(eng.metrics().digipeats, 1);
    }

    #[tokio::test]
    async fn wide_role_blocks_n_above_max_wide_n() {
        let mut config = base_config(ChannelRole::Wide, ChannelMode::Digipeat);
        config.max_wide_n = 2;
        let eng = engine(config).await;
        let frame = sample_frame(vec![addr("WIDE3", 3)]);
        let actions = eng.process(&frame).await;
        assert!(actions.is_empty());
        assert_eq!(eng.metrics().max_wide_blocked, 1);
    }

    #[tokio::test]
    async fn duplicate_frames_are_suppressed_within_ttl() {
        let eng = engine(base_config(ChannelRole::FillIn, ChannelMode::Digipeat)).await;
        let frame = sample_frame(vec![addr("WIDE1", 1)]);
        let first = eng.process(&frame).await;
        let second = eng.process(&frame).await;
        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
        assert_eq!(eng.metrics().digipeats, 1);
        assert_eq!(eng.metrics().duplicates_suppressed, 1);
    }

    #[tokio::test]
    async fn duplicate_elapses_after_ttl() {
        let clock = ManualClock::new();
        let eng =
            DigipeaterEngine::new(base_config(ChannelRole::FillIn, ChannelMode::Digipeat), clock.clone(), Duration::from_secs(5), 1000)
                .unwrap();
        let frame = sample_frame(vec![addr("WIDE1", 1)]);
        eng.process(&frame).await;
        clock.advance(Duration::from_secs(6));
        let third = eng.process(&frame).await;
        assert_eq!(third.len(), 1);
        assert_eq!(eng.metrics().digipeats, 2);
    }

    #[tokio::test]
    async fn receive_only_never_repeats_but_can_igate() {
        let mut config = base_config(ChannelRole::Wide, ChannelMode::ReceiveOnly);
        config.igate_forward = true;
        let eng = engine(config).await;
        let frame = sample_frame(vec![addr("WIDE2", 2)]);
        let actions = eng.process(&frame).await;
        assert_eq!(actions.len(), 1);
        assert!(matches!(actions[0], DigipeatAction::HandoffToBackbone { priority: Priority::Normal, .. }));
    }

    #[tokio::test]
    async fn personal_alias_precedence_over_generic_wide1() {
        let mut config = base_config(ChannelRole::Wide, ChannelMode::Digipeat);
        config.personal_aliases.push(Callsign::new("WIDE1", 1).unwrap());
        let eng = engine(config).await;
        // Wide-role channel would normally refuse WIDE1, but since it's
        // configured as an exact personal alias it is serviced directly.
        let frame = sample_frame(vec![addr("WIDE1", 1)]);
        let actions = eng.process(&frame).await;
        assert_eq!(actions.len(), 1);
        assert_eq!(eng.metrics().serviced_wide_blocked, 0);
    }

    #[tokio::test]
    async fn no_candidate_when_fully_serviced() {
        let eng = engine(base_config(ChannelRole::Wide, ChannelMode::Digipeat)).await;
        let mut serviced = addr("WIDE2", 0);
        serviced.h_bit = true;
        let frame = sample_frame(vec![serviced]);
        let actions = eng.process(&frame).await;
        assert!(actions.is_empty());
    }

    #[tokio::test]
    async fn invalid_max_wide_n_is_rejected() {
        let mut config = base_config(ChannelRole::Wide, ChannelMode::Digipeat);
        config.max_wide_n = 8;
        let result = DigipeaterEngine::new(config, ManualClock::new(), Duration::from_secs(5), 1000);
        assert!(matches!(result, Err(CoreError::InvalidMaxWideN(8))));
    }
}
