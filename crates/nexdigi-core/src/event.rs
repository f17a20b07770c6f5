//! Broadcast observability events, replacing the source's event-emitter
//! pattern (see the "Design Notes" section of the governing specification).
//!
//! A [`EventBus`] is a thin wrapper over [`tokio::sync::broadcast`]: every
//! plane (frame, backbone, trust) holds a sender and publishes typed
//! [`Event`]s as state transitions happen. Tests subscribe directly; a
//! production binary wires a subscriber into its logging/metrics sink. No
//! per-packet policy drop publishes an event (those are counter-only, per
//! §7) — events are reserved for state transitions worth a log line.

use nexdigi_proto::Callsign;
use tokio::sync::broadcast;

/// Default channel capacity for a new [`EventBus`]; slow subscribers that
/// fall behind this many events receive [`broadcast::error::RecvError::Lagged`]
/// rather than stalling publishers.
pub const DEFAULT_CAPACITY: usize = 256;

/// A typed observability event published by one of the three planes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A transport driver moved to the connected state.
    TransportConnected {
        /// Identifier of the transport (channel id or peer transport id).
        transport_id: String,
    },
    /// A transport driver moved to the disconnected state.
    TransportDisconnected {
        /// Identifier of the transport (channel id or peer transport id).
        transport_id: String,
        /// Human-readable disconnect reason.
        reason: String,
    },
    /// A frame was digipeated (serviced and retransmitted) on a channel.
    FrameDigipeated {
        /// Channel id that serviced the frame.
        channel: String,
    },
    /// A route was selected by the load balancer.
    RouteSelected {
        /// Destination callsign.
        destination: Callsign,
        /// Chosen next hop.
        next_hop: Callsign,
    },
    /// A route was marked failed after reaching the consecutive-failure
    /// threshold.
    RouteFailed {
        /// Destination callsign.
        destination: Callsign,
        /// Next hop that failed.
        next_hop: Callsign,
    },
    /// An auth handshake completed successfully for a peer.
    AuthSucceeded {
        /// Peer callsign.
        peer: Callsign,
    },
    /// An auth handshake failed for a peer.
    AuthFailed {
        /// Peer callsign.
        peer: Callsign,
        /// Rejection reason (e.g. `"signature-invalid"`, `"nonce-reused"`).
        reason: String,
    },
    /// An auth attempt was silently dropped for exceeding the per-peer rate
    /// limit.
    AuthRateLimited {
        /// Peer callsign.
        peer: Callsign,
    },
    /// The local node's view of the mesh topology changed (LSA applied).
    TopologyChanged {
        /// Originating node of the LSA that caused the change.
        origin: Callsign,
        /// The LSA's sequence number.
        sequence: u64,
    },
    /// A reactive route discovery completed with a reply.
    RouteDiscovered {
        /// Node that initiated the discovery.
        source: Callsign,
        /// Node that was found.
        destination: Callsign,
    },
}

/// Broadcast bus for [`Event`]s. Cheap to clone; all clones share the same
/// underlying channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    /// Builds a new bus with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribes to future events. Past events are not replayed.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Publishes an event. Silently drops it if there are no subscribers,
    /// matching `broadcast`'s semantics for an event-emitter replacement
    /// (production logging always subscribes, so this only happens when no
    /// consumer cares).
    pub fn publish(&self, event: Event) {
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        bus.publish(Event::TransportConnected { transport_id: "ch0".to_string() });
        let event = rx.recv().await.unwrap();
        assert_eq!(event, Event::TransportConnected { transport_id: "ch0".to_string() });
    }

    #[test]
    fn publish_without_subscribers_does_not_panic() {
        let bus = EventBus::default();
        bus.publish(Event::TransportConnected { transport_id: "ch0".to_string() });
    }
}
