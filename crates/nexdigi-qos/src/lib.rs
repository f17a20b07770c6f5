//! Backbone traffic shaping and route selection: the four-class
//! strict-priority scheduler with token-bucket shaping (C5) and the
//! health-tracked multi-path load balancer (C6).

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod classify;
mod error;
mod load_balancer;
mod scheduler;
mod token_bucket;

pub use classify::{classify, PacketTags, EMERGENCY_TAGS};
pub use error::QosError;
pub use load_balancer::{
    LoadBalancer, Route, RouteHealthSnapshot, SelectionAlgorithm, DEFAULT_FAILURE_THRESHOLD,
};
pub use scheduler::{ClassSnapshot, EnqueueOutcome, QosScheduler, QueuedPacket, DEFAULT_CLASS_LIMITS};
pub use token_bucket::TokenBucket;

/// Convenience `Result` alias used throughout this crate.
pub type Result<T> = std::result::Result<T, QosError>;
