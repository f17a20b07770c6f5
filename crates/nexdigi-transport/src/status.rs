//! Connection lifecycle and event types common to every transport driver.

use bytes::Bytes;

/// Transport connection lifecycle state (§3 "Lifecycles").
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    /// No connection attempt is in flight.
    #[default]
    Disconnected {
        /// Reason for the most recent disconnect, if any.
        reason: Option<String>,
    },
    /// A connection attempt is in progress.
    Connecting,
    /// The transport is connected and able to send/receive.
    Connected,
}

/// Events a transport driver reports upward to its owning channel task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The transport became connected.
    Connected,
    /// The transport disconnected.
    Disconnected {
        /// Human-readable disconnect reason.
        reason: String,
    },
    /// A raw AX.25 frame was received (post-KISS-decode, pre-AX.25-parse).
    Frame(Bytes),
}
