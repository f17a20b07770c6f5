//! KISS-over-serial transport for directly-attached TNCs.
//!
//! Structurally identical to [`crate::tcp::TcpKissTransport`] (background
//! task, channel-bridged handle) but opens a `tokio-serial` port instead of
//! a socket. A bad device path or baud rate is a [`TransportError::Fatal`]
//! configuration error, not something backoff can fix, so the background
//! task does not loop on open failure the way the TCP driver loops on
//! connection refusal.

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use nexdigi_proto::{KissDecoder, KissEncoder, KissFrame, ProtoError};
use tokio::sync::mpsc;
use tokio_serial::SerialPortBuilderExt;
use tokio_util::codec::Framed;
use tracing::{info, warn};

use crate::driver::TransportDriver;
use crate::error::TransportError;
use crate::status::{ConnectionStatus, TransportEvent};

const KISS_PORT: u8 = 0;

enum Command {
    Send(Bytes),
    Disconnect,
}

/// Configuration for a serial KISS TNC port.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Device path, e.g. `/dev/ttyUSB0`.
    pub path: String,
    /// Baud rate, typically `9600` or `1200` for legacy TNCs.
    pub baud_rate: u32,
}

/// A KISS TNC reached over a serial port.
pub struct SerialKissTransport {
    config: SerialConfig,
    status: ConnectionStatus,
    commands: Option<mpsc::UnboundedSender<Command>>,
    events: Option<mpsc::UnboundedReceiver<TransportEvent>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl SerialKissTransport {
    /// Builds a driver targeting the given serial port. The port is not
    /// opened until [`TransportDriver::connect`] runs.
    #[must_use]
    pub fn new(config: SerialConfig) -> Self {
        Self {
            config,
            status: ConnectionStatus::Disconnected { reason: None },
            commands: None,
            events: None,
            task: None,
        }
    }
}

impl Drop for SerialKissTransport {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl TransportDriver for SerialKissTransport {
    fn connect(&mut self) -> Result<(), TransportError> {
        let port = tokio_serial::new(&self.config.path, self.config.baud_rate)
            .open_native_async()
            .map_err(|err| TransportError::Fatal(format!("opening {}: {err}", self.config.path)))?;

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (evt_tx, evt_rx) = mpsc::unbounded_channel();
        let path = self.config.path.clone();

        let handle = tokio::spawn(run(path, port, cmd_rx, evt_tx));

        self.commands = Some(cmd_tx);
        self.events = Some(evt_rx);
        self.task = Some(handle);
        self.status = ConnectionStatus::Connected;
        Ok(())
    }

    fn disconnect(&mut self, reason: &str) {
        if let Some(commands) = &self.commands {
            let _ = commands.send(Command::Disconnect);
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.commands = None;
        self.events = None;
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
            if let TransportEvent::Disconnected { reason } = &event {
                self.status = ConnectionStatus::Disconnected { reason: Some(reason.clone()) };
            }
            out.push(event);
        }
        out
    }
}

async fn run(
    path: String,
    port: tokio_serial::SerialStream,
    mut commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    info!(%path, "kiss-serial opened");
    let _ = events.send(TransportEvent::Connected);
    let mut framed = Framed::new(port, KissCodec);

    loop {
        tokio::select! {
            cmd = commands.recv() => {
                match cmd {
                    Some(Command::Send(payload)) => {
                        let frame = KissFrame::data(KISS_PORT, payload);
                        if let Err(err) = framed.send(frame).await {
                            warn!(%path, error = %err, "kiss-serial write failed");
                            let _ = events.send(TransportEvent::Disconnected { reason: err.to_string() });
                            return;
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
                        warn!(%path, error = %err, "kiss-serial decode error");
                    }
                    None => {
                        warn!(%path, "kiss-serial port closed");
                        let _ = events.send(TransportEvent::Disconnected { reason: "port closed".to_owned() });
                        return;
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
