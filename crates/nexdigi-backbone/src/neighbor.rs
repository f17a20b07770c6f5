//! Per-neighbor state: the physical transport, its outbound QoS queues, and
//! a bounded buffer for data queued while the auth handshake is in flight.

use std::collections::VecDeque;

use nexdigi_core::{Environment, Priority};
use nexdigi_proto::ControlMessage;
use nexdigi_qos::QosScheduler;
use nexdigi_transport::{ConnectionStatus, TransportDriver};

/// Default number of data messages buffered per peer while its auth
/// handshake is outstanding, before new arrivals are dropped.
pub const DEFAULT_AUTH_BUFFER_CAPACITY: usize = 100;

/// One directly-connected neighbor.
pub struct Neighbor<E: Environment> {
    pub(crate) transport: Box<dyn TransportDriver>,
    pub(crate) scheduler: QosScheduler<E>,
    pub(crate) auth_buffer: VecDeque<(Priority, ControlMessage)>,
    auth_buffer_capacity: usize,
}

impl<E: Environment> Neighbor<E> {
    /// Builds a neighbor entry over `transport`, with QoS shaping configured
    /// by `capacity_bytes`/`rate_bytes_per_sec` (`rate_bytes_per_sec == 0`
    /// disables shaping).
    #[must_use]
    pub fn new(env: E, transport: Box<dyn TransportDriver>, capacity_bytes: u64, rate_bytes_per_sec: u64) -> Self {
        Self {
            transport,
            scheduler: QosScheduler::new(env, capacity_bytes, rate_bytes_per_sec),
            auth_buffer: VecDeque::new(),
            auth_buffer_capacity: DEFAULT_AUTH_BUFFER_CAPACITY,
        }
    }

    /// Current connection status of this neighbor's transport.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.transport.status()
    }

    /// Buffers `message` for later send, dropping the newly-arriving
    /// message (not an older one) once the bound is reached. Returns `true`
    /// if the message was queued, `false` if the buffer was already full.
    pub(crate) fn buffer_pending_auth(&mut self, priority: Priority, message: ControlMessage) -> bool {
        if self.auth_buffer.len() >= self.auth_buffer_capacity {
            return false;
        }
        self.auth_buffer.push_back((priority, message));
        true
    }

    pub(crate) fn drain_auth_buffer(&mut self) -> Vec<(Priority, ControlMessage)> {
        self.auth_buffer.drain(..).collect()
    }
}

/// Observability snapshot of one neighbor's state (§10).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighborSnapshot {
    /// Current transport connection status.
    pub status: ConnectionStatus,
    /// Data messages currently held pending authentication.
    pub auth_buffer_len: usize,
}
