//! Frame-plane core: the seen-cache (C2) and digipeater engine (C4), plus
//! the `Environment` abstraction, shared `Priority` class, and broadcast
//! `Event`/counter types used across every plane of the workspace.
//!
//! This crate has no knowledge of transports, the backbone overlay, or
//! authentication — it only turns a parsed [`nexdigi_proto::Ax25Frame`]
//! into a digipeat decision.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod digipeater;
mod env;
mod error;
mod event;
mod metrics;
mod priority;
mod seen_cache;

pub use digipeater::{
    ChannelMode, ChannelRole, DigipeatAction, DigipeaterConfig, DigipeaterEngine, DEFAULT_ID_INTERVAL,
};
pub use env::{Environment, SystemEnvironment};
pub use error::CoreError;
pub use event::{Event, EventBus, DEFAULT_CAPACITY};
pub use metrics::{DigipeaterMetrics, DigipeaterSnapshot};
pub use priority::Priority;
pub use seen_cache::{Fingerprint, SeenCache, TestAndSet, DEFAULT_MAX_ENTRIES, DEFAULT_TTL};

#[cfg(any(test, feature = "test-util"))]
pub use env::test_support;

/// Convenience `Result` alias used throughout this crate.
pub type Result<T> = std::result::Result<T, CoreError>;
