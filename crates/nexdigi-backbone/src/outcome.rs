//! Result type for [`crate::BackboneManager::send_data`].

/// Outcome of attempting to send application data across the backbone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The data was admitted to the outbound queue for its next hop.
    Ok,
    /// The next hop's class queue was at capacity; the data was dropped.
    QueueFull,
    /// No known path to the destination exists in the current topology.
    NoRoute,
    /// The next hop is not yet authenticated; the data was buffered and
    /// will be sent once the handshake completes (or dropped if the
    /// per-peer buffer is full).
    NotAuthenticated,
    /// The payload was empty or otherwise not a well-formed frame.
    InvalidFrame,
}
