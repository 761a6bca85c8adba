//! Topology listeners.
//!
//! Observers (metrics, connection pools, ...) learn about node additions,
//! removals, state and distance changes through [`TopologyListener`]. The
//! [`MultiplexingTopologyListener`] fans each notification out to every
//! registered listener.

use crate::isolate;
use arc_swap::ArcSwap;
use metadata::{Node, NodeDistance, NodeState};
use std::sync::Arc;
use tracing::warn;

/// Receives topology notifications from the event processor.
///
/// All methods default to no-ops. Notifications arrive from the processor's
/// single writer, in the order the events were applied.
pub trait TopologyListener: Send + Sync {
    fn on_added(&self, _node: &Node) {}

    fn on_removed(&self, _node: &Node) {}

    fn on_state_changed(&self, _node: &Node, _previous: NodeState, _current: NodeState) {}

    /// A node was assigned a distance, either on discovery or after a change.
    fn on_distance_changed(&self, _node: &Node, _distance: NodeDistance) {}

    fn close(&self) {}

    /// Set by multiplexers so they can be flattened on registration.
    fn as_multiplexing(&self) -> Option<&MultiplexingTopologyListener> {
        None
    }
}

/// Combines multiple topology listeners into a single one.
///
/// A panic raised by one listener is caught and logged; the remaining
/// listeners are still notified and nothing reaches the event source.
#[derive(Default)]
pub struct MultiplexingTopologyListener {
    listeners: ArcSwap<Vec<Arc<dyn TopologyListener>>>,
}

impl MultiplexingTopologyListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_listeners(listeners: impl IntoIterator<Item = Arc<dyn TopologyListener>>) -> Self {
        let multiplexer = Self::new();
        for listener in listeners {
            multiplexer.register(listener);
        }
        multiplexer
    }

    /// Add a listener. Nested multiplexers are flattened.
    pub fn register(&self, listener: Arc<dyn TopologyListener>) {
        if let Some(nested) = listener.as_multiplexing() {
            for inner in nested.listeners.load().iter() {
                self.register(Arc::clone(inner));
            }
            return;
        }
        self.listeners.rcu(|current| {
            let mut next = Vec::clone(current);
            next.push(Arc::clone(&listener));
            next
        });
    }

    pub fn len(&self) -> usize {
        self.listeners.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.load().is_empty()
    }

    fn invoke(&self, event: &str, action: impl Fn(&dyn TopologyListener)) {
        for listener in self.listeners.load().iter() {
            if let Err(panic) = isolate::catch(|| action(listener.as_ref())) {
                warn!(event, error = %panic, "Unexpected error while notifying topology listener");
            }
        }
    }
}

impl TopologyListener for MultiplexingTopologyListener {
    fn on_added(&self, node: &Node) {
        self.invoke("on_added", |l| l.on_added(node));
    }

    fn on_removed(&self, node: &Node) {
        self.invoke("on_removed", |l| l.on_removed(node));
    }

    fn on_state_changed(&self, node: &Node, previous: NodeState, current: NodeState) {
        self.invoke("on_state_changed", |l| l.on_state_changed(node, previous, current));
    }

    fn on_distance_changed(&self, node: &Node, distance: NodeDistance) {
        self.invoke("on_distance_changed", |l| l.on_distance_changed(node, distance));
    }

    fn close(&self) {
        self.invoke("close", |l| l.close());
    }

    fn as_multiplexing(&self) -> Option<&MultiplexingTopologyListener> {
        Some(self)
    }
}
