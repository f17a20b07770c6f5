//! Turmoil-backed KISS-over-TCP transport for deterministic reconnect tests.
//!
//! [`nexdigi_transport::TcpKissTransport`] hardcodes a real
//! `tokio::net::TcpStream`, so it cannot run under `turmoil`'s simulated
//! network. [`SimTcpKissTransport`] reimplements the same
//! reconnect-under-backoff loop against `turmoil::net::TcpStream`, letting a
//! test inject partitions, latency, and packet loss with
//! [`turmoil::Sim::hold`]/[`turmoil::Sim::release`] while exercising the
//! production [`nexdigi_transport::Backoff`] schedule.

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use nexdigi_core::Environment;
use nexdigi_proto::{KissDecoder, KissEncoder, KissFrame, ProtoError};
use nexdigi_transport::{Backoff, ConnectionStatus, TransportDriver, TransportError, TransportEvent};
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tracing::{info, warn};
use turmoil::net::TcpStream;

const KISS_PORT: u8 = 0;

enum Command {
    Send(Bytes),
    Disconnect,
}

/// A KISS TNC reached over a turmoil-simulated TCP socket.
pub struct SimTcpKissTransport {
    addr: String,
    status: ConnectionStatus,
    commands: Option<mpsc::UnboundedSender<Command>>,
    events: Option<mpsc::UnboundedReceiver<TransportEvent>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl SimTcpKissTransport {
    /// Builds a driver targeting `addr` (e.g. `"node-b:8001"`, a turmoil host
    /// name). The connection is not attempted until
    /// [`SimTcpKissTransport::spawn`] runs.
    #[must_use]
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into(), status: ConnectionStatus::Disconnected { reason: None }, commands: None, events: None, task: None }
    }

    /// Spawns the background connection task with reconnect-under-backoff,
    /// using `env` as the source of backoff jitter and sleep. Must be called
    /// from within a running `turmoil` host so `tokio::spawn` lands on the
    /// simulated executor.
    pub fn spawn<E: Environment>(&mut self, env: E) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (evt_tx, evt_rx) = mpsc::unbounded_channel();
        let addr = self.addr.clone();

        let handle = tokio::spawn(run(addr, env, cmd_rx, evt_tx));

        self.commands = Some(cmd_tx);
        self.events = Some(evt_rx);
        self.task = Some(handle);
        self.status = ConnectionStatus::Connecting;
    }
}

impl Drop for SimTcpKissTransport {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl TransportDriver for SimTcpKissTransport {
    fn connect(&mut self) -> Result<(), TransportError> {
        if self.commands.is_none() {
            return Err(TransportError::Fatal("transport was not spawned with an environment".to_owned()));
        }
        self.status = ConnectionStatus::Connecting;
        Ok(())
    }

    fn disconnect(&mut self, reason: &str) {
        if let Some(commands) = &self.commands {
            let _ = commands.send(Command::Disconnect);
        }
        self.status = ConnectionStatus::Disconnected { reason: Some(reason.to_owned()) };
    }

    fn status(&self) -> ConnectionStatus {
        self.status.clone()
    }

    fn send(&mut self, frame: Bytes) -> Result<(), TransportError> {
        match &self.commands {
            Some(commands) => commands.send(Command::Send(frame)).map_err(|_| TransportError::Closed),
            None => Err(TransportError::Transient("not connected".to_owned())),
        }
    }

    fn poll(&mut self) -> Vec<TransportEvent> {
        let Some(events) = &mut self.events else {
            return Vec::new();
        };
        let mut out = Vec::new();
        while let Ok(event) = events.try_recv() {
            match &event {
                TransportEvent::Connected => self.status = ConnectionStatus::Connected,
                TransportEvent::Disconnected { reason } => {
                    self.status = ConnectionStatus::Disconnected { reason: Some(reason.clone()) };
                }
                TransportEvent::Frame(_) => {}
            }
            out.push(event);
        }
        out
    }
}

async fn run<E: Environment>(
    addr: String,
    env: E,
    mut commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    let mut backoff = Backoff::new(env.clone());

    'reconnect: loop {
        let stream = match TcpStream::connect(&addr).await {
            Ok(stream) => stream,
            Err(err) => {
                warn!(%addr, error = %err, "sim kiss-tcp connect failed, backing off");
                let delay = backoff.next_delay();
                env.sleep(delay).await;
                continue 'reconnect;
            }
        };

        info!(%addr, "sim kiss-tcp connected");
        backoff.reset();
        let _ = events.send(TransportEvent::Connected);

        let mut framed = Framed::new(stream, KissCodec);

        loop {
            tokio::select! {
                cmd = commands.recv() => {
                    match cmd {
                        Some(Command::Send(payload)) => {
                            let frame = KissFrame::data(KISS_PORT, payload);
                            if let Err(err) = framed.send(frame).await {
                                warn!(%addr, error = %err, "sim kiss-tcp write failed");
                                let _ = events.send(TransportEvent::Disconnected { reason: err.to_string() });
                                continue 'reconnect;
                            }
                        }
                        Some(Command::Disconnect) | None => {
                            let _ = events.send(TransportEvent::Disconnected { reason: "disconnect requested".to_owned() });
                            return;
                        }
                    }
                }
                decoded = framed.next() => {
                    match decoded {
                        Some(Ok(frame)) => {
                            let _ = events.send(TransportEvent::Frame(frame.payload));
                        }
                        Some(Err(err)) => {
                            warn!(%addr, error = %err, "sim kiss-tcp decode error");
                        }
                        None => {
                            warn!(%addr, "sim kiss-tcp connection closed by peer");
                            let _ = events.send(TransportEvent::Disconnected { reason: "connection closed".to_owned() });
                            continue 'reconnect;
                        }
                    }
                }
            }
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct KissCodec;

impl tokio_util::codec::Decoder for KissCodec {
    type Item = KissFrame;
    type Error = ProtoError;

    fn decode(&mut self, src: &mut bytes::BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        KissDecoder.decode(src)
    }
}

impl tokio_util::codec::Encoder<KissFrame> for KissCodec {
    type Error = ProtoError;

    fn encode(&mut self, item: KissFrame, dst: &mut bytes::BytesMut) -> Result<(), Self::Error> {
        KissEncoder.encode(item, dst)
    }
}
