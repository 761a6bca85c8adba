//! Copy-on-write node registry.
//!
//! The registry owns the authoritative set of known nodes. Every mutation
//! builds a new [`Topology`] from the current one and publishes it with a
//! single atomic pointer swap, so readers never take a lock and never see a
//! half-applied change.
//!
//! # Concurrency
//!
//! - **Readers** (`view`, `snapshot`, `get`, `distance`): one atomic load.
//! - **Writers**: serialized by an internal mutex. In the driver there is a
//!   single writer (the topology event processor), so the mutex is
//!   uncontended; it only exists so the registry stays correct when used on
//!   its own.
//! - Health state is stored in the shared `Node` itself and changes without
//!   republishing a view.

use crate::error::{Error, Result};
use crate::node::{HostId, Node, NodeDistance, NodeInfo, NodeState};
use crate::topology::{NodeGroup, Topology};
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// Outcome of [`NodeRegistry::upsert`].
#[derive(Debug, Clone)]
pub enum Upsert {
    /// The host id was unknown; the node was inserted at the evaluated distance.
    Created(Arc<Node>),
    /// The datacenter changed; the node was re-evaluated and moved.
    Relocated {
        node: Arc<Node>,
        previous: NodeDistance,
        current: NodeDistance,
    },
    /// Address or rack changed; distance membership untouched.
    Updated(Arc<Node>),
    /// Nothing changed.
    Unchanged(Arc<Node>),
}

impl Upsert {
    pub fn node(&self) -> &Arc<Node> {
        match self {
            Upsert::Created(node)
            | Upsert::Relocated { node, .. }
            | Upsert::Updated(node)
            | Upsert::Unchanged(node) => node,
        }
    }
}

/// Thread-safe store of every node the client knows about.
pub struct NodeRegistry {
    current: ArcSwap<Topology>,
    writer: Mutex<()>,
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(Topology::new()),
            writer: Mutex::new(()),
        }
    }

    /// Capture the whole current topology.
    ///
    /// The returned view stays valid (and unchanged) for as long as the caller
    /// holds it, regardless of later mutations.
    #[inline]
    pub fn view(&self) -> Arc<Topology> {
        self.current.load_full()
    }

    /// Capture the current group for one distance.
    #[inline]
    pub fn snapshot(&self, distance: NodeDistance) -> NodeGroup {
        self.current.load().group(distance).clone()
    }

    pub fn get(&self, host_id: HostId) -> Option<Arc<Node>> {
        self.current.load().get(host_id).cloned()
    }

    /// Distance of a known node; `None` once the node has been removed.
    pub fn distance(&self, host_id: HostId) -> Option<NodeDistance> {
        self.current.load().distance(host_id)
    }

    pub fn len(&self) -> usize {
        self.current.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.load().is_empty()
    }

    pub fn nodes(&self) -> Vec<Arc<Node>> {
        self.current.load().nodes().cloned().collect()
    }

    /// Insert a new node or refresh the descriptor of a known one.
    ///
    /// `evaluate` is called only when a distance decision is needed: for a
    /// new host id, or when a known node reports a different datacenter (the
    /// node then leaves its old group and joins the evaluated one in the same
    /// published view). If `evaluate` panics nothing is published.
    ///
    /// Health state is not part of [`NodeInfo`]: new nodes start
    /// [`NodeState::Unknown`] and a refresh never touches the state of a known
    /// node. State only changes through [`NodeRegistry::set_state`].
    pub fn upsert<F>(&self, info: NodeInfo, evaluate: F) -> Upsert
    where
        F: FnOnce(&NodeInfo) -> NodeDistance,
    {
        let _guard = self.writer.lock();
        let current = self.current.load();

        let Some(existing) = current.get(info.host_id).cloned() else {
            let distance = evaluate(&info);
            let node = Arc::new(Node::new(info, distance));
            let mut next = Topology::clone(&current);
            next.insert(Arc::clone(&node), distance);
            self.current.store(Arc::new(next));
            debug!(host_id = %node.host_id(), %distance, "node added to registry");
            return Upsert::Created(node);
        };

        let previous_info = existing.info();
        if previous_info == info {
            return Upsert::Unchanged(existing);
        }

        if previous_info.datacenter == info.datacenter {
            existing.replace_info(info);
            debug!(host_id = %existing.host_id(), "node attributes updated");
            return Upsert::Updated(existing);
        }

        let distance = evaluate(&info);
        existing.replace_info(info);
        let mut next = Topology::clone(&current);
        let previous = next
            .relocate(existing.host_id(), distance)
            .unwrap_or(distance);
        existing.swap_distance(distance);
        self.current.store(Arc::new(next));
        debug!(
            host_id = %existing.host_id(),
            %previous,
            current = %distance,
            "node changed datacenter"
        );
        Upsert::Relocated {
            node: existing,
            previous,
            current: distance,
        }
    }

    /// Drop a node from every group. No-op for unknown host ids.
    ///
    /// Views captured before the call keep the node, but it is flagged as
    /// removed so plans walking those views skip it from now on.
    pub fn remove(&self, host_id: HostId) -> Option<Arc<Node>> {
        let _guard = self.writer.lock();
        let current = self.current.load();
        current.get(host_id)?;

        let mut next = Topology::clone(&current);
        let node = next.remove(host_id)?;
        node.mark_removed();
        self.current.store(Arc::new(next));
        debug!(%host_id, "node removed from registry");
        Some(node)
    }

    /// Move a node to the group for `distance`. Returns the previous distance.
    ///
    /// A distance update racing with a removal is expected; it yields
    /// [`Error::UnknownNode`] and leaves the registry untouched.
    pub fn set_distance(&self, host_id: HostId, distance: NodeDistance) -> Result<NodeDistance> {
        let _guard = self.writer.lock();
        let current = self.current.load();
        let node = current.get(host_id).cloned().ok_or(Error::UnknownNode(host_id))?;

        match current.distance(host_id) {
            Some(previous) if previous == distance => Ok(previous),
            _ => {
                let mut next = Topology::clone(&current);
                let previous = next
                    .relocate(host_id, distance)
                    .ok_or(Error::UnknownNode(host_id))?;
                // Flag first: a plan holding the old view must stop yielding
                // a node that just became IGNORED.
                node.swap_distance(distance);
                self.current.store(Arc::new(next));
                debug!(%host_id, %previous, current = %distance, "node distance changed");
                Ok(previous)
            }
        }
    }

    /// Update a node's health state. Returns the previous state.
    pub fn set_state(&self, host_id: HostId, state: NodeState) -> Result<NodeState> {
        let node = self.get(host_id).ok_or(Error::UnknownNode(host_id))?;
        Ok(node.swap_state(state))
    }
}
