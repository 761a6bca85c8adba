//! Node filtering decorator.

use crate::error::Result;
use crate::plan::QueryPlan;
use crate::policy::LoadBalancingPolicy;
use crate::processor::TopologyEvent;
use crate::request::Request;
use metadata::{HostId, Node, NodeDistance, NodeInfo};
use std::fmt;
use std::sync::Arc;

/// Predicate deciding whether a node may appear in query plans.
pub type NodeFilter = Arc<dyn Fn(&Node) -> bool + Send + Sync>;

/// Wraps a policy and hides the nodes rejected by a filter.
///
/// The predicate runs as each node is pulled from the plan, never against a
/// precomputed copy, so it sees the node's current attributes. Everything
/// else (events, distances, lifecycle) goes straight to the wrapped policy.
pub struct FilteringPolicy<P> {
    inner: P,
    filter: NodeFilter,
}

impl<P: LoadBalancingPolicy> FilteringPolicy<P> {
    pub fn new(inner: P, filter: NodeFilter) -> Self {
        Self { inner, filter }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

impl<P: LoadBalancingPolicy> LoadBalancingPolicy for FilteringPolicy<P> {
    fn init(&self, nodes: Vec<NodeInfo>, contact_points: &[HostId]) -> Result<()> {
        self.inner.init(nodes, contact_points)
    }

    fn on_event(&self, event: TopologyEvent) {
        self.inner.on_event(event);
    }

    fn new_query_plan(&self, request: &Request) -> QueryPlan {
        let filter = Arc::clone(&self.filter);
        self.inner
            .new_query_plan(request)
            .filter_nodes(move |node| filter(node))
    }

    fn distance(&self, host_id: HostId) -> Option<NodeDistance> {
        self.inner.distance(host_id)
    }

    fn close(&self) {
        self.inner.close();
    }
}

impl<P> fmt::Debug for FilteringPolicy<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilteringPolicy").finish_non_exhaustive()
    }
}
