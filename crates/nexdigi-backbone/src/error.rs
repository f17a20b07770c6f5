//! Error type for backbone neighbor administration.

use thiserror::Error;

/// Errors surfaced by [`crate::BackboneManager`] neighbor management.
#[derive(Debug, Error)]
pub enum BackboneError {
    /// No neighbor is registered under this callsign.
    #[error("no neighbor registered for {0}")]
    UnknownNeighbor(String),

    /// The declared link cost to a neighbor was invalid.
    #[error(transparent)]
    Mesh(#[from] nexdigi_mesh::MeshError),
}
