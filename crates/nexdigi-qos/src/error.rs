//! QoS and load-balancing errors.

use thiserror::Error;

/// Errors produced by the QoS scheduler and load balancer (C5/C6).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QosError {
    /// [`crate::load_balancer::LoadBalancer::select_route`] was called with
    /// an empty candidate list.
    #[error("no candidate routes supplied")]
    NoRoutes,
}
