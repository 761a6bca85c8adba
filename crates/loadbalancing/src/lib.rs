//! Load balancing and query plans for the driver.
//!
//! This crate decides which nodes a request is sent to:
//! - Distance policy (LOCAL / REMOTE / IGNORED, local datacenter inference)
//! - Topology event processor (single-writer application of cluster events)
//! - Query plan generation (lazy, round-robin, local first)
//! - Policy composition (node filtering, listener and tracker multiplexing)

pub mod config;
pub mod consistency;
pub mod distance;
pub mod error;
pub mod listener;
pub mod metrics;
pub mod plan;
pub mod policy;
pub mod processor;
pub mod reporter;
pub mod request;
pub mod tracker;

mod isolate;

pub use config::LoadBalancingConfig;
pub use consistency::ConsistencyLevel;
pub use distance::{DistancePolicy, NodeDistanceEvaluator};
pub use error::{LoadBalancingError, Result};
pub use listener::{MultiplexingTopologyListener, TopologyListener};
pub use self::metrics::MetricsListener;
pub use plan::{QueryPlan, QueryPlanner, RoundRobinPlan};
pub use policy::{
    BasicLoadBalancingPolicy, FilteringPolicy, LoadBalancingPolicy, NodeFilter, PolicyBuilder,
};
pub use processor::{Lifecycle, TopologyEvent, TopologyEventProcessor};
pub use reporter::DistanceReporter;
pub use request::Request;
pub use tracker::{MultiplexingRequestTracker, RequestTracker};
