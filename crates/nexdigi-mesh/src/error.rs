//! Error type for [`crate::MeshManager`] configuration.

use thiserror::Error;

/// Errors surfaced by the mesh-healing plane.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MeshError {
    /// A link cost of zero was supplied; costs must be at least 1 so that
    /// Dijkstra strictly prefers fewer hops over more.
    #[error("link cost must be at least 1, got {0}")]
    InvalidLinkCost(u32),
}
