//! Transport drivers (C3): KISS-over-TCP, KISS-over-serial, and an
//! in-memory mock for tests, behind a single [`TransportDriver`] interface
//! so the digipeater and backbone planes never see transport-specific
//! types.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod backoff;
mod driver;
mod error;
mod mock;
mod serial;
mod status;
mod tcp;

pub use backoff::{Backoff, FACTOR, INITIAL_DELAY, JITTER_FRACTION, MAX_DELAY};
pub use driver::TransportDriver;
pub use error::TransportError;
pub use mock::MockTransport;
pub use serial::{SerialConfig, SerialKissTransport};
pub use status::{ConnectionStatus, TransportEvent};
pub use tcp::TcpKissTransport;

/// Convenience `Result` alias used throughout this crate.
pub type Result<T> = std::result::Result<T, TransportError>;
