//! Mesh healing (C7, §4.7): link-state flooding, Dijkstra shortest-path
//! recomputation, and reactive route discovery, driven as a Sans-IO state
//! machine — [`MeshManager::handle`] consumes an inbound [`ControlMessage`]
//! and returns the [`MeshAction`]s for the caller (the Backbone Manager) to
//! carry out. No I/O here.

use std::collections::HashMap;
use std::time::Duration;

use nexdigi_core::{Environment, Event, EventBus};
use nexdigi_proto::{Callsign, ControlMessage, LinkCost, LsaBody, MessageBody, RouteDiscoveryBody, RouteReplyBody};

use crate::action::MeshAction;
use crate::error::MeshError;
use crate::topology::Topology;

/// Default interval between periodic LSA refreshes (§4.7: "every 60s").
pub const DEFAULT_LSA_INTERVAL: Duration = Duration::from_secs(60);
/// Default time a route discovery is kept pending before it's abandoned
/// (§4.7: "30s").
pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Owns the local node's topology map and drives LSA flooding and reactive
/// route discovery. One instance per node.
pub struct MeshManager<E: Environment> {
    env: E,
    local: Callsign,
    lsa_interval: Duration,
    discovery_timeout: Duration,
    topology: Topology<E>,
    local_sequence: u64,
    local_neighbors: HashMap<Callsign, u32>,
    dirty: bool,
    last_lsa_at: Option<E::Instant>,
    discovery_sequence: u64,
    pending_discoveries: HashMap<(Callsign, Callsign), E::Instant>,
    discovered_routes: HashMap<(Callsign, Callsign), Vec<Callsign>>,
    events: Option<EventBus>,
}

impl<E: Environment> MeshManager<E> {
    /// Builds a manager for the local node identified by `local`, using the
    /// default LSA interval and discovery timeout.
    #[must_use]
    pub fn new(env: E, local: Callsign) -> Self {
        Self {
            env,
            local,
            lsa_interval: DEFAULT_LSA_INTERVAL,
            discovery_timeout: DEFAULT_DISCOVERY_TIMEOUT,
            topology: Topology::new(),
            local_sequence: 0,
            local_neighbors: HashMap::new(),
            dirty: true,
            last_lsa_at: None,
            discovery_sequence: 0,
            pending_discoveries: HashMap::new(),
            discovered_routes: HashMap::new(),
            events: None,
        }
    }

    /// Attaches an event bus so [`Event::TopologyChanged`] and
    /// [`Event::RouteDiscovered`] are published as the topology evolves.
    #[must_use]
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Overrides the LSA refresh interval (production default
    /// [`DEFAULT_LSA_INTERVAL`]).
    #[must_use]
    pub fn with_lsa_interval(mut self, interval: Duration) -> Self {
        self.lsa_interval = interval;
        self
    }

    /// Overrides the route-discovery timeout (production default
    /// [`DEFAULT_DISCOVERY_TIMEOUT`]).
    #[must_use]
    pub fn with_discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = timeout;
        self
    }

    fn publish(&self, event: Event) {
        if let Some(events) = &self.events {
            events.publish(event);
        }
    }

    fn envelope(&self, to: Callsign, body: MessageBody) -> ControlMessage {
        ControlMessage { from: self.local.clone(), to, timestamp: self.env.wall_clock_millis(), nonce: None, body }
    }

    /// Declares (or updates the cost of) a directly-connected neighbor.
    /// Marks the local LSA stale so the next [`MeshManager::tick`] floods it.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::InvalidLinkCost`] if `cost` is zero.
    pub fn set_local_neighbor(&mut self, neighbor: Callsign, cost: u32) -> Result<(), MeshError> {
        if cost == 0 {
            return Err(MeshError::InvalidLinkCost(cost));
        }
        self.local_neighbors.insert(neighbor, cost);
        self.dirty = true;
        Ok(())
    }

    /// The local node's directly-connected neighbors.
    #[must_use]
    pub fn local_neighbors(&self) -> Vec<Callsign> {
        self.local_neighbors.keys().cloned().collect()
    }

    /// The shortest known path from the local node to `destination`, or
    /// `None` if unreachable with current topology knowledge.
    #[must_use]
    pub fn shortest_path(&self, destination: &Callsign) -> Option<Vec<Callsign>> {
        self.topology.shortest_path(&self.local, destination)
    }

    fn flood_lsa(&mut self) -> Vec<MeshAction> {
        self.local_sequence += 1;
        let now = self.env.now();
        let links: Vec<LinkCost> =
            self.local_neighbors.iter().map(|(n, &cost)| LinkCost { neighbor: n.clone(), cost }).collect();
        let body = LsaBody { origin: self.local.clone(), sequence: self.local_sequence, links: links.clone() };

        self.topology.set_links(
            self.local.clone(),
            links.into_iter().map(|l| (l.neighbor, l.cost)).collect(),
            now,
        );
        self.topology.record_sequence(self.local.clone(), self.local_sequence);
        self.publish(Event::TopologyChanged { origin: self.local.clone(), sequence: self.local_sequence });

        self.dirty = false;
        self.last_lsa_at = Some(now);

        self.local_neighbors
            .keys()
            .map(|n| MeshAction::Send { to: n.clone(), message: self.envelope(n.clone(), MessageBody::Lsa(body.clone())) })
            .collect()
    }

    /// Periodic maintenance: floods a fresh LSA if the local link set has
    /// changed since the last one, or if the refresh interval has elapsed.
    /// Drive this from the node's periodic timer.
    pub fn tick(&mut self) -> Vec<MeshAction> {
        let now = self.env.now();
        let due = self.last_lsa_at.is_none_or(|last| now - last >= self.lsa_interval);
        if self.dirty || due {
            return self.flood_lsa();
        }
        Vec::new()
    }

    /// Dispatches one inbound control message relevant to mesh healing
    /// (`Lsa`, `RouteDiscovery`, `RouteReply`); any other variant is ignored
    /// and yields no actions.
    pub fn handle(&mut self, msg: ControlMessage) -> Vec<MeshAction> {
        match msg.body {
            MessageBody::Lsa(body) => self.handle_lsa(body, msg.from),
            MessageBody::RouteDiscovery(body) => self.handle_route_discovery(body),
            MessageBody::RouteReply(body) => self.handle_route_reply(body),
            _ => Vec::new(),
        }
    }

    /// LSA monotonicity + controlled flooding (§4.7, §8 "LSA monotonicity").
    fn handle_lsa(&mut self, body: LsaBody, received_from: Callsign) -> Vec<MeshAction> {
        if let Some(last) = self.topology.last_sequence(&body.origin) {
            if body.sequence <= last {
                return Vec::new();
            }
        }

        let now = self.env.now();
        self.topology.record_sequence(body.origin.clone(), body.sequence);
        self.topology.set_links(body.origin.clone(), body.links.iter().map(|l| (l.neighbor.clone(), l.cost)).collect(), now);
        self.publish(Event::TopologyChanged { origin: body.origin.clone(), sequence: body.sequence });

        self.local_neighbors
            .keys()
            .filter(|n| **n != received_from)
            .map(|n| MeshAction::Send { to: n.clone(), message: self.envelope(n.clone(), MessageBody::Lsa(body.clone())) })
            .collect()
    }

    /// Reactive route discovery, receiving side (§4.7 "Route discovery").
    fn handle_route_discovery(&mut self, body: RouteDiscoveryBody) -> Vec<MeshAction> {
        if body.destination == self.local {
            let mut full_path = body.path.clone();
            full_path.push(self.local.clone());
            let reply = RouteReplyBody { source: body.source.clone(), destination: body.destination.clone(), path: full_path.clone(), sequence: body.sequence };

            let mut reversed = full_path;
            reversed.reverse();
            let Some(next) = reversed.get(1) else { return Vec::new() };
            return vec![MeshAction::Send { to: next.clone(), message: self.envelope(next.clone(), MessageBody::RouteReply(reply)) }];
        }

        if body.path.contains(&self.local) {
            return Vec::new(); // already on the path: loop avoidance
        }

        let mut forwarded = body;
        forwarded.path.push(self.local.clone());

        self.local_neighbors
            .keys()
            .filter(|n| !forwarded.path.contains(n))
            .map(|n| MeshAction::Send { to: n.clone(), message: self.envelope(n.clone(), MessageBody::RouteDiscovery(forwarded.clone())) })
            .collect()
    }

    /// Reactive route discovery, reply side: install the discovered links
    /// and either forward the reply towards `source` or, at the originator,
    /// record the completed route.
    fn handle_route_reply(&mut self, body: RouteReplyBody) -> Vec<MeshAction> {
        let now = self.env.now();
        for pair in body.path.windows(2) {
            self.topology.upsert_link(pair[0].clone(), pair[1].clone(), 1, now);
        }

        if body.source == self.local {
            let key = (body.source.clone(), body.destination.clone());
            self.pending_discoveries.remove(&key);
            self.discovered_routes.insert(key, body.path.clone());
            self.publish(Event::RouteDiscovered { source: body.source, destination: body.destination });
            return Vec::new();
        }

        let Some(idx) = body.path.iter().position(|c| *c == self.local) else { return Vec::new() };
        let Some(prev_hop) = idx.checked_sub(1).and_then(|i| body.path.get(i)) else { return Vec::new() };
        vec![MeshAction::Send { to: prev_hop.clone(), message: self.envelope(prev_hop.clone(), MessageBody::RouteReply(body)) }]
    }

    /// Broadcasts a `RouteDiscovery` for `destination`, starting the
    /// reactive discovery flow (§4.7).
    pub fn initiate_discovery(&mut self, destination: Callsign) -> Vec<MeshAction> {
        self.discovery_sequence += 1;
        let now = self.env.now();
        self.pending_discoveries.insert((self.local.clone(), destination.clone()), now);
        let body = RouteDiscoveryBody { source: self.local.clone(), destination, path: vec![self.local.clone()], sequence: self.discovery_sequence };

        self.local_neighbors
            .keys()
            .map(|n| MeshAction::Send { to: n.clone(), message: self.envelope(n.clone(), MessageBody::RouteDiscovery(body.clone())) })
            .collect()
    }

    /// Reclaims a discovered path once `handle_route_reply` has recorded
    /// one for `(source, destination)`; removes it from the pending set.
    pub fn take_discovered_route(&mut self, source: &Callsign, destination: &Callsign) -> Option<Vec<Callsign>> {
        self.discovered_routes.remove(&(source.clone(), destination.clone()))
    }

    /// Drops pending discoveries older than the configured discovery
    /// timeout. Drive this from the node's periodic timer.
    pub fn expire_discoveries(&mut self) {
        let now = self.env.now();
        let timeout = self.discovery_timeout;
        self.pending_discoveries.retain(|_, initiated_at| now - *initiated_at <= timeout);
    }

    /// Local link failure handling (§4.7 "Link failure"): removes `dead`
    /// from the topology, floods a fresh LSA, and initiates route discovery
    /// for every destination in `known_destinations` whose current shortest
    /// path's first hop was `dead`.
    pub fn on_neighbor_failure(&mut self, dead: Callsign, known_destinations: &[Callsign]) -> Vec<MeshAction> {
        let needs_discovery: Vec<Callsign> = known_destinations
            .iter()
            .filter(|dest| {
                self.topology
                    .shortest_path(&self.local, dest)
                    .is_some_and(|path| path.get(1) == Some(&dead))
            })
            .cloned()
            .collect();

        self.local_neighbors.remove(&dead);
        self.topology.remove_node(&dead);
        self.dirty = true;

        let mut actions = self.flood_lsa();
        for dest in needs_discovery {
            actions.extend(self.initiate_discovery(dest));
        }
        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexdigi_core::test_support::ManualClock;

    fn cs(s: &str) -> Callsign {
        s.parse().unwrap()
    }

    fn node(env: ManualClock, name: &str) -> MeshManager<ManualClock> {
        MeshManager::new(env, cs(name))
    }

    #[test]
    fn first_tick_always_floods_lsa() {
        let env = ManualClock::new();
        let mut a = node(env, "A");
        a.set_local_neighbor(cs("B"), 1).unwrap();
        let actions = a.tick();
        assert_eq!(actions.len(), 1);
        assert!(matches!(&actions[0], MeshAction::Send { to, .. } if *to == cs("B")));
    }

    #[test]
    fn tick_is_quiet_until_interval_elapses_or_topology_changes() {
        let env = ManualClock::new();
        let mut a = node(env.clone(), "A");
        a.set_local_neighbor(cs("B"), 1).unwrap();
        assert_eq!(a.tick().len(), 1);
        assert!(a.tick().is_empty());

        env.advance(DEFAULT_LSA_INTERVAL);
        assert_eq!(a.tick().len(), 1);
    }

    #[test]
    fn lsa_flood_excludes_the_neighbor_it_arrived_from() {
        let env = ManualClock::new();
        let mut b = node(env, "B");
        b.set_local_neighbor(cs("A"), 1).unwrap();
        b.set_local_neighbor(cs("C"), 1).unwrap();

        let lsa = ControlMessage {
            from: cs("A"),
            to: cs("B"),
            timestamp: 0,
            nonce: None,
            body: MessageBody::Lsa(LsaBody { origin: cs("A"), sequence: 1, links: vec![LinkCost { neighbor: cs("B"), cost: 1 }] }),
        };
        let actions = b.handle(lsa);
        assert_eq!(actions.len(), 1);
        assert!(matches!(&actions[0], MeshAction::Send { to, .. } if *to == cs("C")));
    }

    #[test]
    fn stale_lsa_sequence_is_dropped() {
        let env = ManualClock::new();
        let mut b = node(env, "B");
        b.set_local_neighbor(cs("A"), 1).unwrap();

        let make = |seq: u64| ControlMessage {
            from: cs("A"),
            to: cs("B"),
            timestamp: 0,
            nonce: None,
            body: MessageBody::Lsa(LsaBody { origin: cs("A"), sequence: seq, links: vec![] }),
        };
        b.handle(make(5));
        let actions = b.handle(make(5));
        assert!(actions.is_empty(), "duplicate/stale sequence must be dropped");
        let actions = b.handle(make(3));
        assert!(actions.is_empty(), "older sequence must be dropped");
    }

    #[test]
    fn route_discovery_reaching_destination_replies_along_reversed_path() {
        let env = ManualClock::new();
        let mut c = node(env, "C");
        c.set_local_neighbor(cs("B"), 1).unwrap();

        let discovery = ControlMessage {
            from: cs("B"),
            to: cs("C"),
            timestamp: 0,
            nonce: None,
            body: MessageBody::RouteDiscovery(RouteDiscoveryBody { source: cs("A"), destination: cs("C"), path: vec![cs("A"), cs("B")], sequence: 1 }),
        };
        let actions = c.handle(discovery);
        assert_eq!(actions.len(), 1);
        match &actions[0] {
            MeshAction::Send { to, message } => {
                assert_eq!(*to, cs("B"));
                match &message.body {
                    MessageBody::RouteReply(body) => assert_eq!(body.path, vec![cs("A"), cs("B"), cs("C")]),
                    other => panic!("expected RouteReply, got {other:?}"),
                }
            }
        }
    }

    #[test]
    fn route_discovery_with_self_already_in_path_is_dropped() {
        let env = ManualClock::new();
        let mut b = node(env, "B");
        b.set_local_neighbor(cs("C"), 1).unwrap();

        let discovery = ControlMessage {
            from: cs("A"),
            to: cs("B"),
            timestamp: 0,
            nonce: None,
            body: MessageBody::RouteDiscovery(RouteDiscoveryBody { source: cs("A"), destination: cs("Z"), path: vec![cs("A"), cs("B")], sequence: 1 }),
        };
        assert!(b.handle(discovery).is_empty());
    }

    #[test]
    fn route_reply_installs_links_and_completes_at_originator() {
        let env = ManualClock::new();
        let mut a = node(env, "A");

        let reply = ControlMessage {
            from: cs("B"),
            to: cs("A"),
            timestamp: 0,
            nonce: None,
            body: MessageBody::RouteReply(RouteReplyBody { source: cs("A"), destination: cs("C"), path: vec![cs("A"), cs("B"), cs("C")], sequence: 1 }),
        };
        assert!(a.handle(reply).is_empty());
        assert_eq!(a.shortest_path(&cs("C")), Some(vec![cs("A"), cs("B"), cs("C")]));
        assert_eq!(a.take_discovered_route(&cs("A"), &cs("C")), Some(vec![cs("A"), cs("B"), cs("C")]));
    }

    #[test]
    fn route_reply_forwards_towards_source_at_intermediate_node() {
        let env = ManualClock::new();
        let mut b = node(env, "B");

        let reply = ControlMessage {
            from: cs("C"),
            to: cs("B"),
            timestamp: 0,
            nonce: None,
            body: MessageBody::RouteReply(RouteReplyBody { source: cs("A"), destination: cs("C"), path: vec![cs("A"), cs("B"), cs("C")], sequence: 1 }),
        };
        let actions = b.handle(reply);
        assert_eq!(actions.len(), 1);
        assert!(matches!(&actions[0], MeshAction::Send { to, .. } if *to == cs("A")));
    }

    #[test]
    fn neighbor_failure_reroutes_via_discovered_path() {
        // Scenario: A-B link fails; A's path to C used to go through B.
        // D advertises reachability to both A and C, so discovery through D
        // heals the route.
        let env = ManualClock::new();
        let mut a = node(env, "A");
        a.set_local_neighbor(cs("B"), 1).unwrap();
        a.set_local_neighbor(cs("D"), 1).unwrap();
        a.tick();

        let lsa_b = ControlMessage {
            from: cs("D"),
            to: cs("A"),
            timestamp: 0,
            nonce: None,
            body: MessageBody::Lsa(LsaBody { origin: cs("B"), sequence: 1, links: vec![LinkCost { neighbor: cs("C"), cost: 1 }] }),
        };
        a.handle(lsa_b);
        assert_eq!(a.shortest_path(&cs("C")), Some(vec![cs("A"), cs("B"), cs("C")]));

        let actions = a.on_neighbor_failure(cs("B"), &[cs("C")]);
        assert!(actions.iter().any(|action| matches!(action, MeshAction::Send { message, .. } if matches!(message.body, MessageBody::RouteDiscovery(_)))));
        assert!(a.shortest_path(&cs("C")).is_none());
    }
}
