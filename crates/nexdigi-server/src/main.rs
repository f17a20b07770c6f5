//! `nexdigi-server`: binary entry point wiring the frame, backbone, and
//! trust planes into a running node from a single JSON configuration
//! document (§6).
//!
//! This binary is deliberately thin glue, per §1's "Out of scope" list: it
//! owns no HTTP/WebSocket control surface, no persisted last-heard/BBS/chat
//! store, and no NWS/Winlink bridging. It only (a) loads configuration, (b)
//! spins up one task per radio channel running a [`DigipeaterEngine`] over a
//! [`TransportDriver`], and (c) spins up the backbone task running a
//! [`BackboneManager`] when `backbone.enabled`.

mod config;
mod error;

use std::path::PathBuf;
use std::time::Duration;

use bytes::Bytes;
use clap::Parser;
use nexdigi_backbone::BackboneManager;
use nexdigi_core::{DigipeatAction, DigipeaterEngine, EventBus, SystemEnvironment};
use nexdigi_crypto::NodeIdentity;
use nexdigi_proto::{Ax25Frame, Callsign};
use nexdigi_transport::{
    MockTransport, SerialConfig, SerialKissTransport, TcpKissTransport, TransportDriver, TransportEvent,
};
use tracing::{debug, info, warn};

use crate::config::{NodeConfig, TransportConfig};
use crate::error::{ConfigError, ServerError};

/// How often each channel task polls its transport for new events.
/// Transports themselves suspend on I/O (§5); this only bounds how quickly
/// a channel task notices them.
const CHANNEL_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How often the backbone task drains QoS queues and runs mesh/auth
/// housekeeping (`BackboneManager::tick`).
const BACKBONE_TICK_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Parser, Debug)]
#[command(name = "nexdigi-server", about = "NexDigi digipeater and backbone node")]
struct Cli {
    /// Path to the node's JSON configuration document (§6).
    #[arg(short, long, default_value = "nexdigi.json")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = NodeConfig::load(&cli.config)?;
    run(config).await
}

/// Builds a transport driver from its configured variant, spawning the
/// background connection task for transports that need one (KISS-over-TCP).
fn build_transport(transport: &TransportConfig, env: SystemEnvironment) -> Box<dyn TransportDriver> {
    match transport {
        TransportConfig::Serial { port, baud } => {
            Box::new(SerialKissTransport::new(SerialConfig { path: port.clone(), baud_rate: *baud }))
        }
        TransportConfig::KissTcp { host, port } => {
            let mut transport = TcpKissTransport::new(format!("{host}:{port}"));
            transport.spawn(env);
            Box::new(transport)
        }
        TransportConfig::Mock => Box::new(MockTransport::new()),
    }
}

/// Wires up and runs every configured channel task and (if enabled) the
/// backbone task, until the process receives a shutdown signal.
async fn run(config: NodeConfig) -> Result<(), ServerError> {
    let env = SystemEnvironment;
    let events = EventBus::default();

    let mut tasks = Vec::new();
    let (igate_tx, igate_rx) = tokio::sync::mpsc::unbounded_channel::<(Callsign, Ax25Frame)>();
    let seen_ttl = config.digipeater.seen_cache.ttl();
    let seen_max_entries = config.digipeater.seen_cache.max_entries;

    for channel in &config.channels {
        let channel_id = channel.id.clone();
        let transport = build_transport(&channel.transport, env);
        let igate_tx = igate_tx.clone();

        let engine = match config.digipeater.channels.get(&channel_id) {
            Some(cfg) => {
                let core_config = cfg.to_core_config()?;
                let engine = DigipeaterEngine::new(core_config, env, seen_ttl, seen_max_entries).map_err(
                    |source| ConfigError::InvalidChannel { channel_id: channel_id.clone(), source },
                )?;
                Some(engine)
            }
            None => {
                warn!(channel = %channel_id, "no digipeater policy configured; channel is receive-only passthrough");
                None
            }
        };

        tasks.push(tokio::spawn(run_channel(channel_id, transport, engine, igate_tx)));
    }
    drop(igate_tx);

    if config.backbone.enabled {
        let local_text = config.backbone.local_callsign.clone().ok_or(ConfigError::MissingLocalCallsign)?;
        let local_callsign = local_text
            .parse::<Callsign>()
            .map_err(|source| ConfigError::InvalidCallsign { value: local_text.clone(), source })?;

        tasks.push(tokio::spawn(run_backbone(config, env, local_callsign, events, igate_rx)));
    } else {
        tasks.push(tokio::spawn(drain_igate_without_backbone(igate_rx)));
    }

    tokio::signal::ctrl_c().await.map_err(ServerError::Signal)?;
    info!("shutdown signal received, stopping all channel and backbone tasks");
    for task in tasks {
        task.abort();
    }
    Ok(())
}

/// With no backbone configured, igate-destined frames have nowhere to go;
/// drain them so the sending channel task never blocks, logging each one
/// for operator visibility.
async fn drain_igate_without_backbone(mut igate_rx: tokio::sync::mpsc::UnboundedReceiver<(Callsign, Ax25Frame)>) {
    while let Some((from, frame)) = igate_rx.recv().await {
        debug!(%from, bytes = frame.payload.len(), "igate-forwarded frame dropped (backbone disabled)");
    }
}

/// Runs one radio channel: connects its transport, then loops draining
/// inbound frames through the digipeater engine and retransmitting
/// serviced frames, until aborted.
async fn run_channel(
    channel_id: String,
    mut transport: Box<dyn TransportDriver>,
    engine: Option<DigipeaterEngine<SystemEnvironment>>,
    igate_tx: tokio::sync::mpsc::UnboundedSender<(Callsign, Ax25Frame)>,
) {
    if let Err(err) = transport.connect() {
        warn!(channel = %channel_id, error = %err, "initial connect failed; transport will retry internally");
    }

    let mut ticker = tokio::time::interval(CHANNEL_POLL_INTERVAL);
    loop {
        ticker.tick().await;
        for event in transport.poll() {
            match event {
                TransportEvent::Connected => info!(channel = %channel_id, "transport connected"),
                TransportEvent::Disconnected { reason } => {
                    warn!(channel = %channel_id, ?reason, "transport disconnected");
                }
                TransportEvent::Frame(bytes) => {
                    handle_inbound_frame(&channel_id, &mut transport, engine.as_ref(), &bytes, &igate_tx).await;
                }
            }
        }
    }
}

async fn handle_inbound_frame(
    channel_id: &str,
    transport: &mut Box<dyn TransportDriver>,
    engine: Option<&DigipeaterEngine<SystemEnvironment>>,
    bytes: &Bytes,
    igate_tx: &tokio::sync::mpsc::UnboundedSender<(Callsign, Ax25Frame)>,
) {
    let frame = match Ax25Frame::parse(bytes) {
        Ok(frame) => frame,
        Err(err) => {
            debug!(channel = %channel_id, error = %err, "dropping unparseable AX.25 frame");
            return;
        }
    };

    let Some(engine) = engine else { return };

    for action in engine.process(&frame).await {
        match action {
            DigipeatAction::Repeat(mutated) => {
                if let Err(err) = transport.send(Bytes::from(mutated.emit())) {
                    debug!(channel = %channel_id, error = %err, "digipeat transmit failed (best-effort, not re-queued)");
                }
            }
            DigipeatAction::HandoffToBackbone { frame, .. } => {
                let _ = igate_tx.send((frame.source.callsign.clone(), frame));
            }
        }
    }
}

/// Runs the backbone overlay: builds the node identity, registers every
/// configured neighbor, and drives `BackboneManager::poll`/`tick` until
/// aborted. Igate-forwarded frames received from the radio-side channels
/// are logged; actual APRS-IS/Internet-tier gatewaying is an out-of-scope
/// external collaborator (§1).
async fn run_backbone(
    config: NodeConfig,
    env: SystemEnvironment,
    local: Callsign,
    events: EventBus,
    mut igate_rx: tokio::sync::mpsc::UnboundedReceiver<(Callsign, Ax25Frame)>,
) {
    let identity = NodeIdentity::generate();
    let security = &config.backbone.security;

    let mut manager = BackboneManager::new(env, local.clone(), identity, security.policy())
        .with_events(events)
        .with_lsa_interval(config.backbone.mesh_healing.lsa_interval())
        .with_discovery_timeout(config.backbone.mesh_healing.discovery_timeout())
        .with_auth_session_timeout(security.session_timeout())
        .with_auth_rate_limit(security.max_auth_attempts);

    for trusted in &security.trusted_nodes {
        let (Ok(peer), Ok(key)) =
            (trusted.callsign.parse::<Callsign>(), nexdigi_crypto::PublicKey::from_base64(&trusted.public_key))
        else {
            warn!(callsign = %trusted.callsign, "skipping malformed trusted-node entry");
            continue;
        };
        manager.pin_trusted_key(peer, key);
    }

    let mut neighbor_count = 0usize;
    for neighbor in &config.backbone.neighbors {
        let Ok(peer) = neighbor.callsign.parse::<Callsign>() else {
            warn!(callsign = %neighbor.callsign, "skipping malformed neighbor callsign");
            continue;
        };
        let transport = build_transport(&neighbor.transport, env);
        if let Err(err) = manager.add_neighbor(
            peer.clone(),
            transport,
            neighbor.link_cost,
            config.backbone.qos.capacity_bytes,
            config.backbone.qos.rate_bytes_per_sec,
        ) {
            warn!(callsign = %neighbor.callsign, error = %err, "failed to register neighbor");
            continue;
        }
        neighbor_count += 1;
        if security.enabled {
            manager.authenticate(&peer);
        }
    }

    info!(local = %local, neighbors = neighbor_count, "backbone overlay started");

    let mut ticker = tokio::time::interval(BACKBONE_TICK_INTERVAL);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                manager.tick();
                for delivered in manager.poll() {
                    info!(from = %delivered.from, bytes = delivered.payload.size(), "delivered application data");
                }
            }
            Some((from, frame)) = igate_rx.recv() => {
                // Internet/APRS-IS gatewaying of these frames is an
                // out-of-scope external collaborator; this node only
                // observes and logs them.
                debug!(%from, bytes = frame.payload.len(), "igate-forwarded frame observed at backbone boundary");
            }
        }
    }
}
