//! Multi-path route selection with health tracking and failover (§4.6).

use std::collections::HashMap;

use nexdigi_core::{Environment, Event, EventBus};
use nexdigi_proto::Callsign;
use serde::Serialize;

use crate::error::QosError;

/// Route selection algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SelectionAlgorithm {
    /// Weighted random, favoring routes with better success rate, lower
    /// latency, and fewer recent failures.
    Weighted,
    /// Cycles through the candidate list in order, per destination.
    RoundRobin,
    /// Minimizes `attempts × exp(-Δt/60s)`, preferring routes that are both
    /// lightly used and have sat idle the longest.
    LeastLoaded,
}

/// Consecutive-failure threshold at which a route is reported as failed.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

/// EMA smoothing factor applied to latency on each success.
const LATENCY_EMA_ALPHA: f64 = 0.2;

const WEIGHT_FLOOR: f64 = 0.01;

/// Health/usage statistics for one `(destination, next_hop)` route.
#[derive(Debug, Clone)]
struct RouteHealth<I> {
    successes: u64,
    failures: u64,
    consecutive_failures: u32,
    ema_latency_ms: f64,
    attempts: u64,
    last_used: Option<I>,
}

impl<I> Default for RouteHealth<I> {
    fn default() -> Self {
        Self { successes: 0, failures: 0, consecutive_failures: 0, ema_latency_ms: 0.0, attempts: 0, last_used: None }
    }
}

impl<I> RouteHealth<I> {
    fn success_rate(&self) -> f64 {
        let total = self.successes + self.failures;
        if total == 0 {
            1.0
        } else {
            self.successes as f64 / total as f64
        }
    }
}

/// Observability snapshot of a single route's health entry (§10).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RouteHealthSnapshot {
    /// Successful transmissions recorded.
    pub successes: u64,
    /// Failed transmissions recorded.
    pub failures: u64,
    /// Current consecutive-failure streak.
    pub consecutive_failures: u32,
    /// EMA-smoothed latency, in milliseconds.
    pub ema_latency_ms: f64,
    /// Total selection attempts.
    pub attempts: u64,
}

/// A candidate next hop for a destination.
pub type Route = Callsign;

/// Tracks route health and performs selection for the backbone's outbound
/// path (§4.6). Keyed internally by `(destination, next_hop)`.
pub struct LoadBalancer<E: Environment> {
    env: E,
    algorithm: SelectionAlgorithm,
    failure_threshold: u32,
    health: HashMap<(Callsign, Callsign), RouteHealth<E::Instant>>,
    round_robin_index: HashMap<Callsign, usize>,
    events: Option<EventBus>,
}

impl<E: Environment> LoadBalancer<E> {
    /// Builds a load balancer using the given selection algorithm.
    #[must_use]
    pub fn new(env: E, algorithm: SelectionAlgorithm) -> Self {
        Self {
            env,
            algorithm,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            health: HashMap::new(),
            round_robin_index: HashMap::new(),
            events: None,
        }
    }

    /// Attaches an event bus so [`Event::RouteFailed`] is published when a
    /// route crosses the consecutive-failure threshold.
    #[must_use]
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Selects one route to `destination` from `routes`, per the
    /// configured algorithm. `routes` must be non-empty.
    pub fn select_route(&mut self, destination: &Callsign, routes: &[Route]) -> Result<Route, QosError> {
        if routes.is_empty() {
            return Err(QosError::NoRoutes);
        }

        let selected = match self.algorithm {
            SelectionAlgorithm::Weighted => self.select_weighted(destination, routes),
            SelectionAlgorithm::RoundRobin => self.select_round_robin(destination, routes),
            SelectionAlgorithm::LeastLoaded => self.select_least_loaded(destination, routes),
        };

        let entry = self.health.entry((destination.clone(), selected.clone())).or_default();
        entry.attempts += 1;
        entry.last_used = Some(self.env.now());

        Ok(selected)
    }

    /// Selects a route excluding `exclude`, per §4.6 `failover`.
    pub fn failover(&mut self, destination: &Callsign, exclude: &Route, routes: &[Route]) -> Result<Route, QosError> {
        let remaining: Vec<Route> = routes.iter().filter(|r| *r != exclude).cloned().collect();
        self.select_route(destination, &remaining)
    }

    fn select_weighted(&mut self, destination: &Callsign, routes: &[Route]) -> Route {
        let weights: Vec<f64> = routes.iter().map(|r| self.weight(destination, r)).collect();
        let total: f64 = weights.iter().sum();
        let pick = self.env.random_unit() * total;

        let mut running = 0.0;
        for (route, weight) in routes.iter().zip(weights.iter()) {
            running += weight;
            if pick < running {
                return route.clone();
            }
        }
        routes.last().cloned().unwrap_or_else(|| routes[0].clone())
    }

    fn weight(&self, destination: &Callsign, route: &Route) -> f64 {
        let health = self.health.get(&(destination.clone(), route.clone()));
        let Some(health) = health else { return 1.0 };
        let latency_ms = if health.ema_latency_ms > 0.0 { health.ema_latency_ms } else { 1.0 };
        let recent_failure_penalty = (1.0 - 0.2 * health.consecutive_failures as f64).max(0.0);
        (health.success_rate() * (1000.0 / latency_ms) * recent_failure_penalty).max(WEIGHT_FLOOR)
    }

    fn select_round_robin(&mut self, destination: &Callsign, routes: &[Route]) -> Route {
        let index = self.round_robin_index.entry(destination.clone()).or_insert(0);
        let chosen = routes[*index % routes.len()].clone();
        *index = (*index + 1) % routes.len();
        chosen
    }

    fn select_least_loaded(&mut self, destination: &Callsign, routes: &[Route]) -> Route {
        let now = self.env.now();
        routes
            .iter()
            .min_by(|a, b| {
                let load_a = self.load_score(destination, a, now);
                let load_b = self.load_score(destination, b, now);
                load_a.total_cmp(&load_b)
            })
            .cloned()
            .unwrap_or_else(|| routes[0].clone())
    }

    fn load_score(&self, destination: &Callsign, route: &Route, now: E::Instant) -> f64 {
        let Some(health) = self.health.get(&(destination.clone(), route.clone())) else { return 0.0 };
        let elapsed_secs = match health.last_used {
            Some(last) => (now - last).as_secs_f64(),
            None => return 0.0,
        };
        health.attempts as f64 * (-elapsed_secs / 60.0).exp()
    }

    /// Records a successful transmission over `route`, updating EMA
    /// latency and clearing the consecutive-failure streak.
    pub fn record_success(&mut self, destination: &Callsign, route: &Route, latency_ms: f64) {
        let entry = self.health.entry((destination.clone(), route.clone())).or_default();
        entry.successes += 1;
        entry.consecutive_failures = 0;
        entry.ema_latency_ms = if entry.successes == 1 {
            latency_ms
        } else {
            LATENCY_EMA_ALPHA * latency_ms + (1.0 - LATENCY_EMA_ALPHA) * entry.ema_latency_ms
        };
    }

    /// Records a failed transmission over `route`. Once the consecutive
    /// failure streak reaches the configured threshold, publishes
    /// [`Event::RouteFailed`].
    pub fn record_failure(&mut self, destination: &Callsign, route: &Route, _reason: &str) {
        let entry = self.health.entry((destination.clone(), route.clone())).or_default();
        entry.failures += 1;
        entry.consecutive_failures += 1;

        if entry.consecutive_failures >= self.failure_threshold {
            if let Some(events) = &self.events {
                events.publish(Event::RouteFailed { destination: destination.clone(), next_hop: route.clone() });
            }
        }
    }

    /// Snapshot of one route's health entry, for the observability surface.
    #[must_use]
    pub fn health_snapshot(&self, destination: &Callsign, route: &Route) -> Option<RouteHealthSnapshot> {
        self.health.get(&(destination.clone(), route.clone())).map(|h| RouteHealthSnapshot {
            successes: h.successes,
            failures: h.failures,
            consecutive_failures: h.consecutive_failures,
            ema_latency_ms: h.ema_latency_ms,
            attempts: h.attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexdigi_core::test_support::ManualClock;
    use std::str::FromStr;

    fn callsign(s: &str) -> Callsign {
        Callsign::from_str(s).expect("valid test callsign")
    }

    #[test]
    fn round_robin_cycles_over_routes() {
        let mut lb = LoadBalancer::new(ManualClock::new(), SelectionAlgorithm::RoundRobin);
        let dest = callsign("APRS");
        let routes = vec![callsign("R1"), callsign("R2"), callsign("R3")];

        let picks: Vec<Route> = (0..6).map(|_| lb.select_route(&dest, &routes).unwrap()).collect();
        assert_eq!(picks, vec![routes[0].clone(), routes[1].clone(), routes[2].clone(), routes[0].clone(), routes[1].clone(), routes[2].clone()]);
    }

    #[test]
    fn failure_threshold_emits_route_failed() {
        let events = EventBus::default();
        let mut subscriber = events.subscribe();
        let mut lb = LoadBalancer::new(ManualClock::new(), SelectionAlgorithm::Weighted).with_events(events);
        let dest = callsign("APRS");
        let route = callsign("R1");

        for _ in 0..DEFAULT_FAILURE_THRESHOLD {
            lb.record_failure(&dest, &route, "timeout");
        }

        let event = subscriber.try_recv().expect("route-failed event should be published");
        assert_eq!(event, Event::RouteFailed { destination: dest, next_hop: route });
    }

    #[test]
    fn weighted_selection_favors_healthier_route_empirically() {
        let mut lb = LoadBalancer::new(ManualClock::with_seed(7), SelectionAlgorithm::Weighted);
        let dest = callsign("APRS");
        let good = callsign("R2");
        let bad = callsign("R1");
        let routes = vec![bad.clone(), good.clone()];

        for _ in 0..10 {
            lb.record_success(&dest, &good, 50.0);
        }
        lb.record_success(&dest, &bad, 50.0);
        for _ in 0..3 {
            lb.record_failure(&dest, &bad, "timeout");
        }

        let mut good_count = 0;
        for _ in 0..2000 {
            if lb.select_route(&dest, &routes).unwrap() == good {
                good_count += 1;
            }
        }
        assert!(good_count > 1600, "expected healthy route to dominate selection, got {good_count}/2000");
    }

    #[test]
    fn failover_excludes_given_route() {
        let mut lb = LoadBalancer::new(ManualClock::new(), SelectionAlgorithm::RoundRobin);
        let dest = callsign("APRS");
        let routes = vec![callsign("R1"), callsign("R2")];
        let selected = lb.failover(&dest, &callsign("R1"), &routes).unwrap();
        assert_eq!(selected, callsign("R2"));
    }

    #[test]
    fn empty_routes_is_an_error() {
        let mut lb = LoadBalancer::new(ManualClock::new(), SelectionAlgorithm::RoundRobin);
        let dest = callsign("APRS");
        assert_eq!(lb.select_route(&dest, &[]), Err(QosError::NoRoutes));
    }
}
