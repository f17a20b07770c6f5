//! Common interface every transport driver (mock, TCP, serial) implements.

use bytes::Bytes;

use crate::error::TransportError;
use crate::status::{ConnectionStatus, TransportEvent};

/// A single physical or virtual link carrying KISS-framed bytes.
///
/// Drivers do not own a reconnect loop themselves; the owning channel task
/// drives [`TransportDriver::connect`] under a [`crate::backoff::Backoff`]
/// schedule and calls [`TransportDriver::poll`] on whatever cadence (task
/// wakeup, readiness notification) fits the concrete transport.
pub trait TransportDriver: Send {
    /// Attempts to establish the underlying connection. Synchronous
    /// implementations (e.g. [`crate::mock::MockTransport`]) return
    /// immediately; I/O-backed drivers perform the connect inline and
    /// classify failures via [`TransportError`].
    fn connect(&mut self) -> Result<(), TransportError>;

    /// Tears down the connection, recording `reason` for diagnostics.
    fn disconnect(&mut self, reason: &str);

    /// Current lifecycle state.
    fn status(&self) -> ConnectionStatus;

    /// Writes one KISS-encoded frame. Returns an error (without panicking)
    /// if the transport is not connected.
    fn send(&mut self, frame: Bytes) -> Result<(), TransportError>;

    /// Drains whatever inbound events (frames, disconnect notifications)
    /// have accumulated since the last call. Never blocks.
    fn poll(&mut self) -> Vec<TransportEvent>;
}
