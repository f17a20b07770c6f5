//! Top-level error types for the `nexdigi-server` binary.

use thiserror::Error;

/// Failures loading or validating the configuration document (§6).
///
/// Config errors are always fatal and reported before any channel or the
/// backbone starts, unlike a [`nexdigi_transport::TransportError`] which is
/// a per-channel runtime condition.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read from disk.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// Path that was attempted.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The config file was read but did not parse as the expected JSON shape.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// Path that was attempted.
        path: String,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
    /// A channel or backbone digipeater section failed its own validation
    /// (e.g. `max_wide_n` out of range).
    #[error("invalid channel config for {channel_id}: {source}")]
    InvalidChannel {
        /// The offending channel's `id`.
        channel_id: String,
        /// Underlying core validation error.
        #[source]
        source: nexdigi_core::CoreError,
    },
    /// A callsign field in the configuration document did not parse.
    #[error("invalid callsign {value:?}: {source}")]
    InvalidCallsign {
        /// The offending text.
        value: String,
        /// Underlying parse error.
        #[source]
        source: nexdigi_proto::ProtoError,
    },
    /// `backbone.enabled` was set but `backbone.local_callsign` was absent.
    #[error("backbone.local_callsign is required when backbone.enabled is true")]
    MissingLocalCallsign,
}

/// Top-level error returned by the `nexdigi-server` runtime.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration could not be loaded or validated.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A channel's transport could not be constructed.
    #[error("transport error: {0}")]
    Transport(#[from] nexdigi_transport::TransportError),
    /// Waiting on the shutdown signal itself failed.
    #[error("failed to listen for shutdown signal: {0}")]
    Signal(#[source] std::io::Error),
}
