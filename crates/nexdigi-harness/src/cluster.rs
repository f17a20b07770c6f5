//! In-process multi-node mesh simulation for deterministic tests.
//!
//! Mirrors the production wiring of a [`BackboneManager`] per node, but
//! swaps real transports for linked [`MockTransport`] pairs and a single
//! shared [`ManualClock`], so an entire mesh-healing scenario runs in zero
//! wall-clock time with no real I/O.

use std::collections::HashMap;

use nexdigi_backbone::{BackboneError, BackboneManager, DeliveredData};
use nexdigi_core::test_support::ManualClock;
use nexdigi_core::Priority;
use nexdigi_crypto::NodeIdentity;
use nexdigi_proto::{Callsign, Payload, ProtoError};
use nexdigi_transport::{MockTransport, TransportDriver};
use nexdigi_trust::TrustPolicy;
use std::time::Duration;

/// One physical link between two simulated nodes: a pair of connected mock
/// transports, one per direction.
struct Leg {
    a: Callsign,
    b: Callsign,
    a_side: MockTransport,
    b_side: MockTransport,
}

/// An in-process mesh of [`BackboneManager`] instances sharing one
/// [`ManualClock`], wired together by [`MockTransport`] links instead of
/// real radios or sockets.
pub struct MeshCluster {
    clock: ManualClock,
    nodes: HashMap<Callsign, BackboneManager<ManualClock>>,
    legs: Vec<Leg>,
}

impl Default for MeshCluster {
    fn default() -> Self {
        Self::new()
    }
}

impl MeshCluster {
    /// Builds an empty cluster sharing a fresh [`ManualClock`].
    #[must_use]
    pub fn new() -> Self {
        Self { clock: ManualClock::new(), nodes: HashMap::new(), legs: Vec::new() }
    }

    /// Registers a new node identified by `callsign`, with a freshly
    /// generated identity and a trust-on-first-use policy.
    ///
    /// # Errors
    ///
    /// Returns [`ProtoError`] if `callsign` does not parse.
    pub fn add_node(&mut self, callsign: &str) -> Result<Callsign, ProtoError> {
        let callsign: Callsign = callsign.parse()?;
        let identity = NodeIdentity::generate();
        let manager =
            BackboneManager::new(self.clock.clone(), callsign.clone(), identity, TrustPolicy::TrustOnFirstUse);
        self.nodes.insert(callsign.clone(), manager);
        Ok(callsign)
    }

    /// The node registered under `callsign`, if any.
    pub fn node(&mut self, callsign: &Callsign) -> Option<&mut BackboneManager<ManualClock>> {
        self.nodes.get_mut(callsign)
    }

    /// Links two already-registered nodes with a direct, bidirectional,
    /// unshaped connection of the given mesh link cost.
    ///
    /// # Errors
    ///
    /// Returns [`BackboneError::UnknownNeighbor`] if either callsign is not
    /// registered, or the mesh error wrapped by `add_neighbor` if `cost` is
    /// zero.
    pub fn link(&mut self, a: &Callsign, b: &Callsign, cost: u32) -> Result<(), BackboneError> {
        let a_side = MockTransport::new();
        let b_side = MockTransport::new();
        connect(&a_side);
        connect(&b_side);

        {
            let node_a = self.nodes.get_mut(a).ok_or_else(|| BackboneError::UnknownNeighbor(a.to_string()))?;
            node_a.add_neighbor(b.clone(), Box::new(a_side.clone()), cost, 0, 0)?;
        }
        {
            let node_b = self.nodes.get_mut(b).ok_or_else(|| BackboneError::UnknownNeighbor(b.to_string()))?;
            node_b.add_neighbor(a.clone(), Box::new(b_side.clone()), cost, 0, 0)?;
        }

        self.legs.push(Leg { a: a.clone(), b: b.clone(), a_side, b_side });
        Ok(())
    }

    /// Severs the link between two nodes, as if the radio path had failed,
    /// triggering mesh-healing route discovery on both sides toward
    /// `known_destinations`.
    ///
    /// # Errors
    ///
    /// Returns [`BackboneError::UnknownNeighbor`] if either side has no
    /// record of the other as a neighbor.
    pub fn sever(&mut self, a: &Callsign, b: &Callsign, known_destinations: &[Callsign]) -> Result<(), BackboneError> {
        self.legs.retain(|leg| !(&leg.a == a && &leg.b == b));

        if let Some(node_a) = self.nodes.get_mut(a) {
            node_a.remove_neighbor(b, "link severed", known_destinations)?;
        }
        if let Some(node_b) = self.nodes.get_mut(b) {
            node_b.remove_neighbor(a, "link severed", known_destinations)?;
        }
        Ok(())
    }

    /// Advances the shared clock by `duration`, without running any node's
    /// `poll`/`tick` logic.
    pub fn advance(&self, duration: Duration) {
        self.clock.advance(duration);
    }

    /// Relays every frame a node has sent since the last relay onto the
    /// opposite end of its leg, without re-delivering a frame twice.
    fn relay(&mut self) {
        let mut deliveries: Vec<(MockTransport, Vec<bytes::Bytes>)> = Vec::new();
        for leg in &self.legs {
            let from_a = leg.a_side.take_sent();
            if !from_a.is_empty() {
                deliveries.push((leg.b_side.clone(), from_a));
            }
            let from_b = leg.b_side.take_sent();
            if !from_b.is_empty() {
                deliveries.push((leg.a_side.clone(), from_b));
            }
        }
        for (target, frames) in deliveries {
            for frame in frames {
                target.push_inbound(frame);
            }
        }
    }

    /// One simulation step: relay pending frames, let every node `poll` and
    /// `tick`, then relay again so control traffic generated by this step
    /// (LSA refreshes, auth replies) reaches its destination before the next
    /// round. Returns application data delivered to any node during the
    /// step.
    pub fn round(&mut self) -> Vec<(Callsign, DeliveredData)> {
        self.relay();

        let mut delivered = Vec::new();
        for (callsign, node) in &mut self.nodes {
            for data in node.poll() {
                delivered.push((callsign.clone(), data));
            }
        }
        for node in self.nodes.values_mut() {
            node.tick();
        }

        self.relay();
        delivered
    }

    /// Runs `rounds` simulation steps, advancing the clock between each so
    /// periodic timers (LSA refresh, auth challenge expiry) make progress.
    /// Used to let topology changes converge before asserting on them.
    pub fn settle(&mut self, rounds: usize) -> Vec<(Callsign, DeliveredData)> {
        let mut delivered = Vec::new();
        for _ in 0..rounds {
            delivered.extend(self.round());
            self.advance(Duration::from_secs(1));
        }
        delivered
    }

    /// Sends application data from `source` toward `destination`, if
    /// `source` is a registered node.
    pub fn send_data(
        &mut self,
        source: &Callsign,
        destination: &Callsign,
        payload: Payload,
        priority: Priority,
    ) -> Option<nexdigi_backbone::SendOutcome> {
        self.nodes.get_mut(source).map(|node| node.send_data(destination, payload, priority))
    }
}

/// `MockTransport::connect` never fails for a freshly-constructed transport;
/// a failure here would indicate the mock itself is broken, which this
/// harness cannot recover from usefully.
fn connect(transport: &MockTransport) {
    let mut handle = transport.clone();
    if handle.connect().is_err() {
        tracing::error!("mock transport refused to connect during cluster setup");
    }
}
