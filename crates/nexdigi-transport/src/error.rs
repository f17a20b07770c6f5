//! Transport driver errors.

use thiserror::Error;

/// Errors produced by a transport driver (C3).
///
/// Per the error handling design (§7), every I/O error is classified as
/// either [`TransportError::Transient`] (worth a reconnect-with-backoff) or
/// [`TransportError::Fatal`] (a configuration error; the channel is left
/// `Disconnected` and not retried).
#[derive(Debug, Error)]
pub enum TransportError {
    /// A recoverable I/O failure (connection reset, accept failure, ...).
    /// The driver should reconnect with backoff.
    #[error("transient transport failure: {0}")]
    Transient(String),

    /// An unrecoverable configuration error (bad serial port, invalid
    /// address). The channel is left disconnected.
    #[error("fatal transport failure: {0}")]
    Fatal(String),

    /// The outbound channel to the driver task was closed.
    #[error("transport driver task is no longer running")]
    Closed,
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match err.kind() {
            ErrorKind::NotFound | ErrorKind::InvalidInput | ErrorKind::PermissionDenied => {
                Self::Fatal(err.to_string())
            }
            _ => Self::Transient(err.to_string()),
        }
    }
}
