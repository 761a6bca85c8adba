//! Load balancing policies.
//!
//! A policy answers two questions for the rest of the driver:
//!
//! - **Which nodes, in which order?** `new_query_plan` for every request.
//! - **How far is this node?** `distance`, used by connection pooling to
//!   decide which nodes get pools at all.
//!
//! Implementations:
//!
//! - **BasicLoadBalancingPolicy**: datacenter-aware round-robin over the
//!   registry, fed by the topology event processor
//! - **FilteringPolicy**: decorator that hides nodes failing a predicate

pub mod basic;
pub mod filter;

pub use basic::{BasicLoadBalancingPolicy, PolicyBuilder};
pub use filter::{FilteringPolicy, NodeFilter};

use crate::error::Result;
use crate::plan::QueryPlan;
use crate::processor::TopologyEvent;
use crate::request::Request;
use metadata::{HostId, NodeDistance, NodeInfo};
use std::sync::Arc;

/// Trait for load balancing policies.
///
/// # Thread Safety
///
/// Implementations must be thread-safe (Send + Sync): `new_query_plan` is
/// called concurrently from every request, while topology events arrive from
/// the control connection.
pub trait LoadBalancingPolicy: Send + Sync {
    /// Populate the policy with the nodes known at startup.
    ///
    /// Called exactly once, before any plan is requested. An error is fatal:
    /// the driver must not serve requests.
    fn init(&self, nodes: Vec<NodeInfo>, contact_points: &[HostId]) -> Result<()>;

    /// Apply one topology event. Never fails; problems are logged.
    fn on_event(&self, event: TopologyEvent);

    fn on_add(&self, node: NodeInfo) {
        self.on_event(TopologyEvent::Added(node));
    }

    fn on_remove(&self, host_id: HostId) {
        self.on_event(TopologyEvent::Removed(host_id));
    }

    fn on_up(&self, host_id: HostId) {
        self.on_event(TopologyEvent::Up(host_id));
    }

    fn on_down(&self, host_id: HostId) {
        self.on_event(TopologyEvent::Down(host_id));
    }

    /// A fresh, independent plan for one request.
    fn new_query_plan(&self, request: &Request) -> QueryPlan;

    /// Current distance of a node; `None` for unknown (or removed) nodes.
    fn distance(&self, host_id: HostId) -> Option<NodeDistance>;

    fn close(&self);
}

impl<P: LoadBalancingPolicy + ?Sized> LoadBalancingPolicy for Arc<P> {
    fn init(&self, nodes: Vec<NodeInfo>, contact_points: &[HostId]) -> Result<()> {
        (**self).init(nodes, contact_points)
    }

    fn on_event(&self, event: TopologyEvent) {
        (**self).on_event(event)
    }

    fn on_add(&self, node: NodeInfo) {
        (**self).on_add(node)
    }

    fn on_remove(&self, host_id: HostId) {
        (**self).on_remove(host_id)
    }

    fn on_up(&self, host_id: HostId) {
        (**self).on_up(host_id)
    }

    fn on_down(&self, host_id: HostId) {
        (**self).on_down(host_id)
    }

    fn new_query_plan(&self, request: &Request) -> QueryPlan {
        (**self).new_query_plan(request)
    }

    fn distance(&self, host_id: HostId) -> Option<NodeDistance> {
        (**self).distance(host_id)
    }

    fn close(&self) {
        (**self).close()
    }
}
