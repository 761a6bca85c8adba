//! Load balancing observability metrics
//!
//! Records, through the `metrics` facade:
//! - Node distance changes (per distance)
//! - Node state changes (per state)
//! - Node count per distance group
//!
//! Nothing is exported unless the embedding application installs a recorder.

use crate::listener::TopologyListener;
use metadata::{Node, NodeDistance, NodeRegistry, NodeState};
use std::sync::Arc;

/// Topology listener feeding the metrics facade.
pub struct MetricsListener {
    registry: Arc<NodeRegistry>,
}

impl MetricsListener {
    pub fn new(registry: Arc<NodeRegistry>) -> Self {
        Self { registry }
    }

    fn record_group_sizes(&self) {
        let view = self.registry.view();
        for distance in NodeDistance::ALL {
            metrics::gauge!("ring_driver_nodes", "distance" => distance.as_str())
                .set(view.group(distance).len() as f64);
        }
    }
}

impl TopologyListener for MetricsListener {
    fn on_added(&self, _node: &Node) {
        self.record_group_sizes();
    }

    fn on_removed(&self, _node: &Node) {
        self.record_group_sizes();
    }

    fn on_state_changed(&self, _node: &Node, _previous: NodeState, current: NodeState) {
        metrics::counter!(
            "ring_driver_node_state_changes_total",
            "state" => current.as_str(),
        )
        .increment(1);
    }

    fn on_distance_changed(&self, _node: &Node, distance: NodeDistance) {
        metrics::counter!(
            "ring_driver_node_distance_changes_total",
            "distance" => distance.as_str(),
        )
        .increment(1);
        self.record_group_sizes();
    }
}
