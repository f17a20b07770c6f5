//! Wire-parsing errors shared by the AX.25 codec, KISS framing, and control
//! message envelope.

use thiserror::Error;

/// Errors produced while parsing or mutating wire formats.
///
/// These are always input-validation errors: the caller drops the single
/// offending frame and continues (see the propagation policy in the parent
/// specification's error handling section) — a `ProtoError` never tears down
/// a transport by itself.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProtoError {
    /// Fewer bytes remained than a fixed-size field requires.
    #[error("frame too short")]
    FrameTooShort,

    /// Control or PID byte did not match the expected UI-frame values.
    #[error("unexpected control/PID byte")]
    BadControl,

    /// More address fields were present than the protocol allows.
    #[error("too many addresses")]
    TooManyAddresses,

    /// No address field carried the end-of-address (E) bit.
    #[error("no address carries the end bit")]
    NoEndBit,

    /// A callsign base or SSID fell outside the valid range.
    #[error("invalid callsign: {0}")]
    InvalidCallsign(String),

    /// A KISS frame had an escape byte (`FESC`) with no following
    /// transpose byte, or other structural corruption.
    #[error("malformed KISS frame")]
    MalformedKiss,

    /// A control-message envelope failed to deserialize or carried an
    /// unrecognized `type` tag.
    #[error("invalid control message: {0}")]
    InvalidControlMessage(String),
}
