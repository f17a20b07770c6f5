//! KISS-over-TCP transport (e.g. Direwolf's `kissattach`-compatible TCP KISS
//! port), with automatic reconnect under [`Backoff`].
//!
//! The socket itself lives on a background task; [`TcpKissTransport`] is a
//! thin channel-bridging handle so it can implement the synchronous
//! [`TransportDriver`] interface the owning channel task expects.

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use nexdigi_core::Environment;
use nexdigi_proto::{KissDecoder, KissEncoder, KissFrame, ProtoError};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tracing::{info, warn};

use crate::backoff::Backoff;
use crate::driver::TransportDriver;
use crate::error::TransportError;
use crate::status::{ConnectionStatus, TransportEvent};

const KISS_PORT: u8 = 0;

/// Commands sent from the handle to the background connection task.
enum Command {
    Send(Bytes),
    Disconnect,
}

/// A KISS TNC reached over a TCP socket.
pub struct TcpKissTransport {
    addr: String,
    status: ConnectionStatus,
    commands: Option<mpsc::UnboundedSender<Command>>,
    events: Option<mpsc::UnboundedReceiver<TransportEvent>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl TcpKissTransport {
    /// Builds a driver targeting `addr` (e.g. `"127.0.0.1:8001"`). The
    /// connection is not attempted until [`TransportDriver::connect`] runs.
    #[must_use]
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            status: ConnectionStatus::Disconnected { reason: None },
            commands: None,
            events: None,
            task: None,
        }
    }

    /// Spawns the background connection task with reconnect-under-backoff,
    /// using `env` as the source of backoff jitter and sleep.
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

impl Drop for TcpKissTransport {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl TransportDriver for TcpKissTransport {
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
                warn!(%addr, error = %err, "kiss-tcp connect failed, backing off");
                let delay = backoff.next_delay();
                env.sleep(delay).await;
                continue 'reconnect;
            }
        };

        info!(%addr, "kiss-tcp connected");
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
                                warn!(%addr, error = %err, "kiss-tcp write failed");
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
                            warn!(%addr, error = %err, "kiss-tcp decode error");
                        }
                        None => {
                            warn!(%addr, "kiss-tcp connection closed by peer");
                            let _ = events.send(TransportEvent::Disconnected { reason: "connection closed".to_owned() });
                            continue 'reconnect;
                        }
                    }
                }
            }
        }
    }
}

/// Combined `Encoder`/`Decoder` alias so a single `Framed` can both read and
/// write KISS frames over the same socket.
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
