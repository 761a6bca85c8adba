//! Cluster metadata for the driver.
//!
//! This crate provides the client-side view of the ring:
//! - Node identity, descriptors, health state and distance
//! - Immutable topology views partitioned by distance
//! - The copy-on-write node registry that publishes those views

pub mod error;
pub mod node;
pub mod registry;
pub mod topology;

pub use error::{Error, Result};
pub use node::{HostId, Node, NodeDistance, NodeInfo, NodeState};
pub use registry::{NodeRegistry, Upsert};
pub use topology::{NodeGroup, Topology};
