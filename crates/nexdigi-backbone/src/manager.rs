//! Backbone Manager (C9): owns the neighbor table and glues the mesh-healing
//! (C7), trust (C8), and QoS (C5/C6) planes together behind a single
//! `send_data`/`poll`/`tick` surface.
//!
//! Control-plane messages (auth handshake, LSA, route discovery/reply) are
//! dispatched by their `type` tag straight to the owning plane and sent
//! immediately, bypassing QoS shaping — only end-to-end application data
//! (§4.9 `sendData`) is subject to priority queues and bandwidth shaping.

use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use nexdigi_core::{Environment, Event, EventBus, Priority};
use nexdigi_crypto::NodeIdentity;
use nexdigi_mesh::{MeshAction, MeshManager};
use nexdigi_proto::{Callsign, ControlMessage, DataBody, MessageBody, Payload};
use nexdigi_qos::EnqueueOutcome;
use nexdigi_transport::{TransportDriver, TransportEvent};
use nexdigi_trust::{AuthManager, TrustPolicy};

use crate::error::BackboneError;
use crate::neighbor::{Neighbor, NeighborSnapshot};
use crate::outcome::SendOutcome;

/// Application data delivered to the local node, handed back from
/// [`BackboneManager::poll`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredData {
    /// Originating node, as carried in the envelope.
    pub from: Callsign,
    /// The delivered payload.
    pub payload: Payload,
}

/// Owns the local node's neighbor table and drives the mesh, trust, and QoS
/// planes from it. One instance per node.
pub struct BackboneManager<E: Environment> {
    env: E,
    local: Callsign,
    neighbors: HashMap<Callsign, Neighbor<E>>,
    mesh: MeshManager<E>,
    auth: AuthManager<E>,
    events: Option<EventBus>,
}

impl<E: Environment> BackboneManager<E> {
    /// Builds a manager for the local node identified by `local`.
    #[must_use]
    pub fn new(env: E, local: Callsign, identity: NodeIdentity, policy: TrustPolicy) -> Self {
        Self {
            mesh: MeshManager::new(env.clone(), local.clone()),
            auth: AuthManager::new(env.clone(), local.clone(), identity, policy),
            env,
            local,
            neighbors: HashMap::new(),
            events: None,
        }
    }

    /// Attaches an event bus, propagated to the mesh and trust planes so
    /// topology/route/auth events are published consistently.
    #[must_use]
    pub fn with_events(self, events: EventBus) -> Self {
        let Self { env, local, neighbors, mesh, auth, .. } = self;
        Self {
            mesh: mesh.with_events(events.clone()),
            auth: auth.with_events(events.clone()),
            env,
            local,
            neighbors,
            events: Some(events),
        }
    }

    /// Overrides the LSA refresh interval (production default
    /// [`nexdigi_mesh::DEFAULT_LSA_INTERVAL`]).
    #[must_use]
    pub fn with_lsa_interval(self, interval: Duration) -> Self {
        let Self { env, local, neighbors, mesh, auth, events } = self;
        Self { mesh: mesh.with_lsa_interval(interval), env, local, neighbors, auth, events }
    }

    /// Overrides the route-discovery timeout (production default
    /// [`nexdigi_mesh::DEFAULT_DISCOVERY_TIMEOUT`]).
    #[must_use]
    pub fn with_discovery_timeout(self, timeout: Duration) -> Self {
        let Self { env, local, neighbors, mesh, auth, events } = self;
        Self { mesh: mesh.with_discovery_timeout(timeout), env, local, neighbors, auth, events }
    }

    /// Overrides the auth session timeout (production default
    /// [`nexdigi_trust::DEFAULT_SESSION_TIMEOUT`]).
    #[must_use]
    pub fn with_auth_session_timeout(self, timeout: Duration) -> Self {
        let Self { env, local, neighbors, mesh, auth, events } = self;
        Self { auth: auth.with_session_timeout(timeout), env, local, neighbors, mesh, events }
    }

    /// Overrides the per-peer auth rate limit (production default
    /// [`nexdigi_trust::DEFAULT_MAX_ATTEMPTS_PER_MINUTE`]).
    #[must_use]
    pub fn with_auth_rate_limit(self, max_per_minute: u32) -> Self {
        let Self { env, local, neighbors, mesh, auth, events } = self;
        Self { auth: auth.with_max_auth_attempts(max_per_minute), env, local, neighbors, mesh, events }
    }

    fn publish(&self, event: Event) {
        if let Some(events) = &self.events {
            events.publish(event);
        }
    }

    /// Pins a trusted Ed25519 public key for `peer`, e.g. from the static
    /// `backbone.security.trusted_nodes` configuration table. A pinned key
    /// always takes precedence over one supplied in an incoming
    /// `AUTH_REQUEST` (§4.8).
    pub fn pin_trusted_key(&mut self, peer: Callsign, key: nexdigi_crypto::PublicKey) {
        self.auth.pin_trusted_key(peer, key);
    }

    /// Registers (or replaces) a directly-connected neighbor, reached over
    /// `transport`, and declares its link cost to the mesh-healing plane.
    ///
    /// # Errors
    ///
    /// Returns [`BackboneError::Mesh`] if `link_cost` is zero.
    pub fn add_neighbor(
        &mut self,
        peer: Callsign,
        transport: Box<dyn TransportDriver>,
        link_cost: u32,
        capacity_bytes: u64,
        rate_bytes_per_sec: u64,
    ) -> Result<(), BackboneError> {
        self.mesh.set_local_neighbor(peer.clone(), link_cost)?;
        self.neighbors.insert(peer, Neighbor::new(self.env.clone(), transport, capacity_bytes, rate_bytes_per_sec));
        Ok(())
    }

    /// Removes a neighbor after a detected link failure, tearing down its
    /// transport and triggering mesh-healing route discovery for any
    /// destination that routed through it.
    ///
    /// # Errors
    ///
    /// Returns [`BackboneError::UnknownNeighbor`] if `peer` is not
    /// registered.
    pub fn remove_neighbor(
        &mut self,
        peer: &Callsign,
        reason: &str,
        known_destinations: &[Callsign],
    ) -> Result<(), BackboneError> {
        let Some(mut neighbor) = self.neighbors.remove(peer) else {
            return Err(BackboneError::UnknownNeighbor(peer.to_string()));
        };
        neighbor.transport.disconnect(reason);
        self.publish(Event::TransportDisconnected { transport_id: peer.to_string(), reason: reason.to_owned() });

        for action in self.mesh.on_neighbor_failure(peer.clone(), known_destinations) {
            self.dispatch_control(action);
        }
        Ok(())
    }

    /// The local node's registered neighbors.
    #[must_use]
    pub fn neighbor_callsigns(&self) -> Vec<Callsign> {
        self.neighbors.keys().cloned().collect()
    }

    /// Observability snapshot of one neighbor, or `None` if unregistered.
    #[must_use]
    pub fn neighbor_snapshot(&self, peer: &Callsign) -> Option<NeighborSnapshot> {
        self.neighbors.get(peer).map(|n| NeighborSnapshot { status: n.status(), auth_buffer_len: n.auth_buffer.len() })
    }

    /// Initiates the auth handshake with `peer` (must already be a
    /// registered neighbor).
    pub fn authenticate(&mut self, peer: &Callsign) {
        let request = self.auth.initiate(peer);
        self.send_envelope(request);
    }

    fn send_envelope(&mut self, message: ControlMessage) {
        let Some(neighbor) = self.neighbors.get_mut(&message.to) else { return };
        if let Ok(bytes) = message.to_json() {
            let _ = neighbor.transport.send(Bytes::from(bytes));
        }
    }

    fn dispatch_control(&mut self, action: MeshAction) {
        match action {
            MeshAction::Send { message, .. } => self.send_envelope(message),
        }
    }

    /// Sends application data toward `destination`, routed via the current
    /// mesh topology and shaped by the destination's QoS class.
    ///
    /// Per §4.9: resolves the next hop via shortest path, buffers (rather
    /// than drops) the message if that neighbor's auth handshake hasn't
    /// completed yet, then subjects it to the neighbor's priority queue and
    /// bandwidth shaping.
    pub fn send_data(&mut self, destination: &Callsign, payload: Payload, priority: Priority) -> SendOutcome {
        if payload.size() == 0 {
            return SendOutcome::InvalidFrame;
        }

        let Some(path) = self.mesh.shortest_path(destination) else { return SendOutcome::NoRoute };
        let Some(next_hop) = path.get(1) else { return SendOutcome::NoRoute };
        let Some(neighbor) = self.neighbors.get_mut(next_hop) else { return SendOutcome::NoRoute };

        let message = ControlMessage {
            from: self.local.clone(),
            to: next_hop.clone(),
            timestamp: self.env.wall_clock_millis(),
            nonce: None,
            body: MessageBody::Data(DataBody { payload }),
        };

        if !self.auth.is_authenticated(next_hop) {
            return if neighbor.buffer_pending_auth(priority, message) {
                SendOutcome::NotAuthenticated
            } else {
                SendOutcome::QueueFull
            };
        }

        self.enqueue_on(next_hop, priority, message)
    }

    fn enqueue_on(&mut self, next_hop: &Callsign, priority: Priority, message: ControlMessage) -> SendOutcome {
        let Ok(bytes) = message.to_json() else { return SendOutcome::InvalidFrame };
        let size = bytes.len();
        let Some(neighbor) = self.neighbors.get_mut(next_hop) else { return SendOutcome::NoRoute };
        match neighbor.scheduler.enqueue(priority, Bytes::from(bytes), size) {
            EnqueueOutcome::Queued => SendOutcome::Ok,
            EnqueueOutcome::Dropped => SendOutcome::QueueFull,
        }
    }

    fn flush_auth_buffer(&mut self, peer: &Callsign) {
        let Some(neighbor) = self.neighbors.get_mut(peer) else { return };
        let pending = neighbor.drain_auth_buffer();
        for (priority, message) in pending {
            self.enqueue_on(peer, priority, message);
        }
    }

    /// Dispatches one inbound control message by its `type` tag: auth
    /// traffic to the trust plane, LSA/discovery/reply traffic to the mesh
    /// plane, application data returned to the caller.
    fn handle_control(&mut self, msg: ControlMessage) -> Option<DeliveredData> {
        let ControlMessage { from, to, timestamp, nonce, body } = msg;
        match body {
            body @ (MessageBody::AuthRequest(_)
            | MessageBody::AuthChallenge(_)
            | MessageBody::AuthResponse(_)
            | MessageBody::AuthSuccess
            | MessageBody::AuthFailure(_)) => {
                let envelope = ControlMessage { from: from.clone(), to, timestamp, nonce, body };
                let was_authenticated = self.auth.is_authenticated(&from);
                if let Ok(Some(reply)) = self.auth.handle(envelope) {
                    self.send_envelope(reply);
                }
                if !was_authenticated && self.auth.is_authenticated(&from) {
                    self.flush_auth_buffer(&from);
                }
                None
            }
            body @ (MessageBody::Lsa(_) | MessageBody::RouteDiscovery(_) | MessageBody::RouteReply(_)) => {
                let envelope = ControlMessage { from, to, timestamp, nonce, body };
                for action in self.mesh.handle(envelope) {
                    self.dispatch_control(action);
                }
                None
            }
            MessageBody::Data(data_body) => Some(DeliveredData { from, payload: data_body.payload }),
        }
    }

    /// Drains every neighbor's transport, dispatching inbound control
    /// traffic and returning any application data addressed to this node.
    /// Never blocks.
    pub fn poll(&mut self) -> Vec<DeliveredData> {
        let peers: Vec<Callsign> = self.neighbors.keys().cloned().collect();
        let mut delivered = Vec::new();

        for peer in peers {
            let Some(neighbor) = self.neighbors.get_mut(&peer) else { continue };
            let events = neighbor.transport.poll();
            for event in events {
                match event {
                    TransportEvent::Connected => self.publish(Event::TransportConnected { transport_id: peer.to_string() }),
                    TransportEvent::Disconnected { reason } => {
                        self.publish(Event::TransportDisconnected { transport_id: peer.to_string(), reason });
                    }
                    TransportEvent::Frame(bytes) => {
                        if let Ok(msg) = ControlMessage::from_json(&bytes) {
                            if let Some(data) = self.handle_control(msg) {
                                delivered.push(data);
                            }
                        }
                    }
                }
            }
        }

        delivered
    }

    /// Periodic maintenance: drains each neighbor's QoS queues onto its
    /// transport, refreshes LSAs due for renewal, and expires stale
    /// pending-auth-challenge and route-discovery state.
    pub fn tick(&mut self) {
        for action in self.mesh.tick() {
            self.dispatch_control(action);
        }
        self.auth.expire_pending_challenges();
        self.mesh.expire_discoveries();

        for neighbor in self.neighbors.values_mut() {
            for frame in neighbor.scheduler.tick() {
                let _ = neighbor.transport.send(frame);
            }
        }
    }
}
