//! Configuration document (§6): a single JSON tree describing the local
//! node's channels, digipeater policy per channel, and backbone overlay
//! settings. Every optional knob documents its own default value and
//! carries a matching `#[serde(default = "...")]`.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use nexdigi_core::{ChannelMode, ChannelRole, DigipeaterConfig};
use nexdigi_proto::Callsign;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// The full configuration document loaded at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Password gating the (out-of-scope) HTTP/WebSocket control surface.
    /// Read and passed through; this crate does not itself serve it.
    #[serde(default)]
    pub ui_password: Option<String>,
    /// Radio-facing and backbone-facing byte-stream channels.
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
    /// Digipeater policy, keyed by channel id.
    #[serde(default)]
    pub digipeater: DigipeaterSection,
    /// Backbone overlay settings.
    #[serde(default)]
    pub backbone: BackboneSection,
}

impl NodeConfig {
    /// Loads and parses a configuration document from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file cannot be read, or
    /// [`ConfigError::Parse`] if its contents are not valid JSON matching
    /// this shape.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.display().to_string(), source })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse { path: path.display().to_string(), source })
    }
}

/// One configured channel: a transport plus (if `id` appears in
/// `digipeater.channels`) a digipeat policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Unique channel identifier, referenced by `digipeater.channels` and
    /// `digipeater.routes`.
    pub id: String,
    /// The transport this channel is reached over.
    #[serde(flatten)]
    pub transport: TransportConfig,
}

/// Transport-specific connection options, tagged by `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TransportConfig {
    /// A KISS TNC reached over a serial port.
    Serial {
        /// Device path, e.g. `/dev/ttyUSB0`.
        port: String,
        /// Baud rate.
        baud: u32,
    },
    /// A KISS TNC reached over TCP (e.g. Direwolf's `kissattach`-compatible
    /// port, or `agwpe`-style bridges exposing raw KISS).
    KissTcp {
        /// Hostname or address.
        host: String,
        /// TCP port.
        port: u16,
    },
    /// An in-memory mock transport, for local testing without hardware.
    Mock,
}

/// Digipeater policy for every channel, plus shared seen-cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigipeaterSection {
    /// Per-channel digipeat policy, keyed by the matching `ChannelConfig::id`.
    #[serde(default)]
    pub channels: HashMap<String, DigipeaterChannelConfig>,
    /// Cross-channel handoff pairs: a frame handed off from `from` is not
    /// itself digipeated again onto `to` by this node (loop prevention for
    /// multi-port cross-band digipeaters).
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
    /// Shared seen-cache sizing.
    #[serde(default)]
    pub seen_cache: SeenCacheConfig,
}

impl Default for DigipeaterSection {
    fn default() -> Self {
        Self { channels: HashMap::new(), routes: Vec::new(), seen_cache: SeenCacheConfig::default() }
    }
}

/// One `{from, to}` channel pair declared in `digipeater.routes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Source channel id.
    pub from: String,
    /// Destination channel id.
    pub to: String,
}

/// Seen-cache sizing, shared across every channel on this node.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SeenCacheConfig {
    /// Entry time-to-live, in seconds.
    pub ttl_secs: u64,
    /// Maximum tracked fingerprints before oldest-entry eviction.
    pub max_entries: usize,
}

impl Default for SeenCacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: nexdigi_core::DEFAULT_TTL.as_secs(),
            max_entries: nexdigi_core::DEFAULT_MAX_ENTRIES,
        }
    }
}

impl SeenCacheConfig {
    /// This config's TTL as a [`Duration`].
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// The §4.4 digipeat fields for one channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DigipeaterChannelConfig {
    /// Operating mode: `digipeat`, `receive-only`, or `disabled`.
    pub mode: ChannelModeConfig,
    /// Alias class serviced: `fill-in` (`WIDE1`) or `wide` (`WIDE2..WIDEn`).
    pub role: ChannelRoleConfig,
    /// This channel's own callsign.
    pub callsign: String,
    /// Additional personal aliases serviced exactly.
    #[serde(default)]
    pub personal_aliases: Vec<String>,
    /// Maximum `WIDEn` hop count serviced, `1..=7`.
    #[serde(default = "default_max_wide_n")]
    pub max_wide_n: u8,
    /// Insert the channel's own callsign as a marked hop before the
    /// serviced alias.
    #[serde(default)]
    pub append_callsign: bool,
    /// Periodically beacon this channel's own callsign.
    #[serde(default)]
    pub id_on_repeat: bool,
    /// Forward frames to the backbone for igate/mesh distribution.
    #[serde(default)]
    pub igate_forward: bool,
}

fn default_max_wide_n() -> u8 {
    DigipeaterConfig::DEFAULT_MAX_WIDE_N
}

impl DigipeaterChannelConfig {
    /// Converts this document fragment into the core's [`DigipeaterConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidCallsign`] if `callsign` or any entry
    /// in `personal_aliases` does not parse.
    pub fn to_core_config(&self) -> Result<DigipeaterConfig, ConfigError> {
        let callsign = parse_callsign(&self.callsign)?;
        let personal_aliases =
            self.personal_aliases.iter().map(|text| parse_callsign(text)).collect::<Result<Vec<_>, _>>()?;

        Ok(DigipeaterConfig {
            mode: self.mode.into(),
            role: self.role.into(),
            callsign,
            personal_aliases,
            max_wide_n: self.max_wide_n,
            append_callsign: self.append_callsign,
            id_on_repeat: self.id_on_repeat,
            igate_forward: self.igate_forward,
        })
    }
}

fn parse_callsign(text: &str) -> Result<Callsign, ConfigError> {
    text.parse().map_err(|source| ConfigError::InvalidCallsign { value: text.to_owned(), source })
}

/// Wire form of [`ChannelMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChannelModeConfig {
    /// See [`ChannelMode::Digipeat`].
    Digipeat,
    /// See [`ChannelMode::ReceiveOnly`].
    ReceiveOnly,
    /// See [`ChannelMode::Disabled`].
    Disabled,
}

impl From<ChannelModeConfig> for ChannelMode {
    fn from(value: ChannelModeConfig) -> Self {
        match value {
            ChannelModeConfig::Digipeat => ChannelMode::Digipeat,
            ChannelModeConfig::ReceiveOnly => ChannelMode::ReceiveOnly,
            ChannelModeConfig::Disabled => ChannelMode::Disabled,
        }
    }
}

/// Wire form of [`ChannelRole`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChannelRoleConfig {
    /// See [`ChannelRole::FillIn`].
    FillIn,
    /// See [`ChannelRole::Wide`].
    Wide,
}

impl From<ChannelRoleConfig> for ChannelRole {
    fn from(value: ChannelRoleConfig) -> Self {
        match value {
            ChannelRoleConfig::FillIn => ChannelRole::FillIn,
            ChannelRoleConfig::Wide => ChannelRole::Wide,
        }
    }
}

/// Backbone overlay configuration (§6 `backbone.*`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackboneSection {
    /// Whether the backbone overlay runs at all.
    #[serde(default)]
    pub enabled: bool,
    /// This node's callsign on the backbone overlay.
    pub local_callsign: Option<String>,
    /// Directly-connected backbone neighbors, reached over their own
    /// transports (distinct from radio-facing `channels[]`).
    #[serde(default)]
    pub neighbors: Vec<NeighborConfig>,
    /// Routing knobs.
    #[serde(default)]
    pub routing: RoutingConfig,
    /// QoS shaping applied uniformly to every neighbor link.
    #[serde(default)]
    pub qos: QosConfig,
    /// Multi-path route selection.
    #[serde(default)]
    pub load_balancing: LoadBalancingConfig,
    /// Link-state flooding and reactive discovery timers.
    #[serde(default)]
    pub mesh_healing: MeshHealingConfig,
    /// Ed25519 trust plane.
    #[serde(default)]
    pub security: SecurityConfig,
}

impl Default for BackboneSection {
    fn default() -> Self {
        Self {
            enabled: false,
            local_callsign: None,
            neighbors: Vec::new(),
            routing: RoutingConfig::default(),
            qos: QosConfig::default(),
            load_balancing: LoadBalancingConfig::default(),
            mesh_healing: MeshHealingConfig::default(),
            security: SecurityConfig::default(),
        }
    }
}

/// One directly-connected backbone neighbor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeighborConfig {
    /// The neighbor's callsign.
    pub callsign: String,
    /// Mesh link cost toward this neighbor (§4.7), `1` for a typical
    /// single RF hop.
    #[serde(default = "default_link_cost")]
    pub link_cost: u32,
    /// How this neighbor is reached.
    #[serde(flatten)]
    pub transport: TransportConfig,
}

fn default_link_cost() -> u32 {
    1
}

/// Route-selection knobs (§4.9 step 1-2).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Prefer a route via the Internet-facing transport over RF when both
    /// reach the destination at equal mesh cost.
    #[serde(default)]
    pub prefer_internet: bool,
    /// Maximum path length Dijkstra will consider before giving up.
    #[serde(default = "default_max_hops")]
    pub max_hops: u32,
}

fn default_max_hops() -> u32 {
    8
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self { prefer_internet: false, max_hops: default_max_hops() }
    }
}

/// QoS shaping applied to every backbone neighbor link (§4.5).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QosConfig {
    /// Per-class queue capacity, in bytes.
    #[serde(default = "default_capacity_bytes")]
    pub capacity_bytes: u64,
    /// Sustained bandwidth limit, in bytes per second. `0` disables
    /// shaping (no token bucket).
    #[serde(default)]
    pub rate_bytes_per_sec: u64,
}

fn default_capacity_bytes() -> u64 {
    1_000_000
}

impl Default for QosConfig {
    fn default() -> Self {
        Self { capacity_bytes: default_capacity_bytes(), rate_bytes_per_sec: 0 }
    }
}

/// Multi-path route selection (C6, §4.6).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LoadBalancingConfig {
    /// Selection algorithm.
    #[serde(default)]
    pub algorithm: SelectionAlgorithmConfig,
}

impl Default for LoadBalancingConfig {
    fn default() -> Self {
        Self { algorithm: SelectionAlgorithmConfig::default() }
    }
}

/// Wire form of [`nexdigi_qos::SelectionAlgorithm`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionAlgorithmConfig {
    /// See [`nexdigi_qos::SelectionAlgorithm::Weighted`].
    #[default]
    Weighted,
    /// See [`nexdigi_qos::SelectionAlgorithm::RoundRobin`].
    RoundRobin,
    /// See [`nexdigi_qos::SelectionAlgorithm::LeastLoaded`].
    LeastLoaded,
}

impl From<SelectionAlgorithmConfig> for nexdigi_qos::SelectionAlgorithm {
    fn from(value: SelectionAlgorithmConfig) -> Self {
        match value {
            SelectionAlgorithmConfig::Weighted => nexdigi_qos::SelectionAlgorithm::Weighted,
            SelectionAlgorithmConfig::RoundRobin => nexdigi_qos::SelectionAlgorithm::RoundRobin,
            SelectionAlgorithmConfig::LeastLoaded => nexdigi_qos::SelectionAlgorithm::LeastLoaded,
        }
    }
}

/// Mesh-healing timers (C7, §4.7).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MeshHealingConfig {
    /// Interval between periodic LSA refreshes, in seconds.
    #[serde(default = "default_lsa_interval_secs")]
    pub lsa_interval_secs: u64,
    /// How long a route discovery is kept pending, in seconds.
    #[serde(default = "default_discovery_timeout_secs")]
    pub discovery_timeout_secs: u64,
}

fn default_lsa_interval_secs() -> u64 {
    nexdigi_mesh::DEFAULT_LSA_INTERVAL.as_secs()
}

fn default_discovery_timeout_secs() -> u64 {
    nexdigi_mesh::DEFAULT_DISCOVERY_TIMEOUT.as_secs()
}

impl Default for MeshHealingConfig {
    fn default() -> Self {
        Self {
            lsa_interval_secs: default_lsa_interval_secs(),
            discovery_timeout_secs: default_discovery_timeout_secs(),
        }
    }
}

impl MeshHealingConfig {
    /// This config's LSA interval as a [`Duration`].
    #[must_use]
    pub fn lsa_interval(&self) -> Duration {
        Duration::from_secs(self.lsa_interval_secs)
    }

    /// This config's discovery timeout as a [`Duration`].
    #[must_use]
    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_secs(self.discovery_timeout_secs)
    }
}

/// Ed25519 trust plane configuration (C8, §4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Whether a neighbor must complete the auth handshake before backbone
    /// data is sent to it.
    #[serde(default)]
    pub enabled: bool,
    /// Statically pinned trusted-node public keys. If empty and `enabled`,
    /// the policy falls back to trust-on-first-use.
    #[serde(default)]
    pub trusted_nodes: Vec<TrustedNodeConfig>,
    /// Session lifetime, in seconds.
    #[serde(default = "default_session_timeout_secs")]
    pub session_timeout_secs: u64,
    /// Maximum auth attempts accepted per peer per minute.
    #[serde(default = "default_max_auth_attempts")]
    pub max_auth_attempts: u32,
}

fn default_session_timeout_secs() -> u64 {
    nexdigi_trust::DEFAULT_SESSION_TIMEOUT.as_secs()
}

fn default_max_auth_attempts() -> u32 {
    nexdigi_trust::DEFAULT_MAX_ATTEMPTS_PER_MINUTE
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            trusted_nodes: Vec::new(),
            session_timeout_secs: default_session_timeout_secs(),
            max_auth_attempts: default_max_auth_attempts(),
        }
    }
}

impl SecurityConfig {
    /// This config's session timeout as a [`Duration`].
    #[must_use]
    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }

    /// The effective trust policy: trust-on-first-use only if no trusted
    /// nodes are pinned.
    #[must_use]
    pub fn policy(&self) -> nexdigi_trust::TrustPolicy {
        if self.trusted_nodes.is_empty() {
            nexdigi_trust::TrustPolicy::TrustOnFirstUse
        } else {
            nexdigi_trust::TrustPolicy::RequireTrusted
        }
    }
}

/// One statically pinned trusted-node public key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustedNodeConfig {
    /// The peer's callsign.
    pub callsign: String,
    /// The peer's base64-encoded Ed25519 public key.
    pub public_key: String,
}
