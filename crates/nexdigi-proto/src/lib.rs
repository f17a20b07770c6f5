//! Wire formats shared across the NexDigi workspace: AX.25 addressing and UI
//! frames, KISS byte-stream framing, the backbone control message envelope,
//! and the unified [`Payload`] shape.
//!
//! This crate is pure data/codec logic — no I/O, no clocks, no randomness —
//! so every type here is trivially testable and reusable from the frame
//! plane, the backbone plane, and the trust plane alike.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod address;
mod callsign;
mod control;
mod error;
mod frame;
mod kiss;
mod payload;

pub use address::{ADDRESS_LEN, Ax25Address};
pub use callsign::{Callsign, MAX_BASE_LEN, MAX_SSID};
pub use control::{
    AuthChallengeBody, AuthFailureBody, AuthRequestBody, AuthResponseBody, ControlMessage,
    DataBody, LinkCost, LsaBody, MessageBody, RouteDiscoveryBody, RouteReplyBody,
};
pub use error::ProtoError;
pub use frame::{
    Ax25Frame, CONTROL_UI, MAX_ADDRESSES, MAX_DIGIPEATERS, MIN_ADDRESSES, PID_NO_LAYER3,
};
pub use kiss::{COMMAND_DATA, KissDecoder, KissEncoder, KissFrame, encode_frame};
pub use payload::Payload;

/// Convenience `Result` alias used throughout this crate.
pub type Result<T> = std::result::Result<T, ProtoError>;
