//! Outbound side effects produced by [`crate::MeshManager`].

use nexdigi_proto::{Callsign, ControlMessage};

/// A side effect for the owning Backbone Manager task to carry out after a
/// [`crate::MeshManager`] call returns. Mesh healing is Sans-IO: it never
/// sends anything itself, only describes what should be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeshAction {
    /// Transmit `message` to the directly-connected neighbor `to`.
    Send {
        /// Recipient neighbor.
        to: Callsign,
        /// The control message to transmit.
        message: ControlMessage,
    },
}
