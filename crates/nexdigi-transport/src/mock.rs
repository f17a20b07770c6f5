//! Scripted in-memory transport for unit tests and the simulation harness.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use bytes::Bytes;

use crate::driver::TransportDriver;
use crate::error::TransportError;
use crate::status::{ConnectionStatus, TransportEvent};

/// A transport backed by scripted inbound frames and a capturable outbound
/// log, rather than a real serial port or socket.
///
/// Connecting always succeeds immediately; `fail_next_connect` lets a test
/// exercise the reconnect-with-backoff path once before succeeding.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    status: ConnectionStatus,
    inbound: VecDeque<Bytes>,
    outbound: Vec<Bytes>,
    fail_next_connect: bool,
}

impl MockTransport {
    /// Builds a disconnected mock transport with no scripted frames.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a frame to be delivered on the next [`TransportDriver::poll`].
    pub fn push_inbound(&self, frame: Bytes) {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner).inbound.push_back(frame);
    }

    /// Returns every frame written via [`TransportDriver::send`] so far.
    #[must_use]
    pub fn sent_frames(&self) -> Vec<Bytes> {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner).outbound.clone()
    }

    /// Drains and returns every frame written via [`TransportDriver::send`]
    /// since the last drain, for a simulation harness relaying frames
    /// between two linked mock transports without re-delivering the same
    /// frame twice.
    pub fn take_sent(&self) -> Vec<Bytes> {
        std::mem::take(&mut self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner).outbound)
    }

    /// Arranges for the next [`TransportDriver::connect`] call to fail.
    pub fn fail_next_connect(&self) {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner).fail_next_connect = true;
    }
}

impl TransportDriver for MockTransport {
    fn connect(&mut self) -> Result<(), TransportError> {
        let mut guard = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if guard.fail_next_connect {
            guard.fail_next_connect = false;
            guard.status = ConnectionStatus::Disconnected { reason: Some("scripted failure".to_owned()) };
            return Err(TransportError::Transient("scripted connect failure".to_owned()));
        }
        guard.status = ConnectionStatus::Connected;
        Ok(())
    }

    fn disconnect(&mut self, reason: &str) {
        let mut guard = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.status = ConnectionStatus::Disconnected { reason: Some(reason.to_owned()) };
    }

    fn status(&self) -> ConnectionStatus {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner).status.clone()
    }

    fn send(&mut self, frame: Bytes) -> Result<(), TransportError> {
        let mut guard = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if guard.status != ConnectionStatus::Connected {
            return Err(TransportError::Transient("not connected".to_owned()));
        }
        guard.outbound.push(frame);
        Ok(())
    }

    fn poll(&mut self) -> Vec<TransportEvent> {
        let mut guard = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if guard.status != ConnectionStatus::Connected {
            return Vec::new();
        }
        guard.inbound.drain(..).map(TransportEvent::Frame).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_then_send_then_poll_roundtrips() {
        let mut transport = MockTransport::new();
        transport.connect().expect("connect should succeed");
        transport.push_inbound(Bytes::from_static(b"hello"));

        transport.send(Bytes::from_static(b"world")).expect("send should succeed");

        assert_eq!(transport.sent_frames(), vec![Bytes::from_static(b"world")]);
        assert_eq!(transport.poll(), vec![TransportEvent::Frame(Bytes::from_static(b"hello"))]);
    }

    #[test]
    fn send_while_disconnected_is_transient_error() {
        let mut transport = MockTransport::new();
        let err = transport.send(Bytes::from_static(b"x")).unwrap_err();
        assert!(matches!(err, TransportError::Transient(_)));
    }

    #[test]
    fn scripted_connect_failure_fires_once() {
        let mut transport = MockTransport::new();
        transport.fail_next_connect();
        assert!(transport.connect().is_err());
        assert!(transport.connect().is_ok());
    }
}
