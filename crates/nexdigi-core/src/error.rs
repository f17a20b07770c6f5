//! Errors owned by the frame-plane core: channel configuration validation
//! and propagation of the underlying wire-format errors.
//!
//! Per-packet policy drops (duplicate, wrong role, `maxWideN` exceeded) are
//! deliberately **not** represented here — they are counters, not errors
//! (see the error handling design in the governing specification).

use thiserror::Error;

use nexdigi_proto::ProtoError;

/// Errors produced while configuring or operating the frame plane.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoreError {
    /// A channel's `max_wide_n` fell outside the valid `1..=7` range.
    #[error("max_wide_n must be in 1..=7, got {0}")]
    InvalidMaxWideN(u8),

    /// Underlying wire-format parse failure, propagated from `nexdigi-proto`.
    #[error(transparent)]
    Proto(#[from] ProtoError),
}
