//! Deterministic-simulation harness for multi-node NexDigi scenarios: an
//! in-process mesh of [`cluster::MeshCluster`] nodes for mesh-healing tests,
//! and a [`turmoil`]-backed transport for exercising the KISS-over-TCP
//! reconnect-with-backoff path under a virtual, fault-injectable network.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod cluster;
pub mod sim_tcp;

pub use cluster::MeshCluster;
pub use sim_tcp::SimTcpKissTransport;
