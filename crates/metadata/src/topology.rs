//! Immutable views over the known nodes.
//!
//! A `Topology` is one published state of the registry: every known node,
//! partitioned into exactly one group per distance. Views are never mutated
//! after publication, so readers can walk them without synchronization.

use crate::node::{HostId, Node, NodeDistance};
use std::collections::HashMap;
use std::sync::Arc;

/// An immutable, cheaply cloneable list of nodes sharing one distance.
#[derive(Clone, Debug)]
pub struct NodeGroup {
    nodes: Arc<[Arc<Node>]>,
}

impl Default for NodeGroup {
    fn default() -> Self {
        Self::empty()
    }
}

impl NodeGroup {
    pub fn empty() -> Self {
        Self {
            nodes: Arc::from(Vec::new()),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&Arc<Node>> {
        self.nodes.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Node>> {
        self.nodes.iter()
    }

    pub fn contains(&self, host_id: HostId) -> bool {
        self.nodes.iter().any(|n| n.host_id() == host_id)
    }

    /// New group with `node` appended.
    pub(crate) fn with(&self, node: Arc<Node>) -> Self {
        let mut nodes = Vec::with_capacity(self.nodes.len() + 1);
        nodes.extend(self.nodes.iter().cloned());
        nodes.push(node);
        Self {
            nodes: Arc::from(nodes),
        }
    }

    /// New group without `host_id`.
    pub(crate) fn without(&self, host_id: HostId) -> Self {
        let nodes: Vec<Arc<Node>> = self
            .nodes
            .iter()
            .filter(|n| n.host_id() != host_id)
            .cloned()
            .collect();
        Self {
            nodes: Arc::from(nodes),
        }
    }
}

#[derive(Clone, Debug)]
struct Entry {
    node: Arc<Node>,
    distance: NodeDistance,
}

/// One consistent state of the registry.
///
/// # Invariants
///
/// - Every node in `entries` appears in exactly one of the three groups, the
///   one matching its entry's distance.
/// - Groups never contain a node absent from `entries`.
#[derive(Clone, Debug, Default)]
pub struct Topology {
    entries: HashMap<HostId, Entry>,
    local: NodeGroup,
    remote: NodeGroup,
    ignored: NodeGroup,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    /// The group of nodes currently at `distance`.
    pub fn group(&self, distance: NodeDistance) -> &NodeGroup {
        match distance {
            NodeDistance::Local => &self.local,
            NodeDistance::Remote => &self.remote,
            NodeDistance::Ignored => &self.ignored,
        }
    }

    pub fn get(&self, host_id: HostId) -> Option<&Arc<Node>> {
        self.entries.get(&host_id).map(|e| &e.node)
    }

    /// Distance of a known node, `None` if the node is unknown.
    pub fn distance(&self, host_id: HostId) -> Option<NodeDistance> {
        self.entries.get(&host_id).map(|e| e.distance)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All known nodes, in no particular order.
    pub fn nodes(&self) -> impl Iterator<Item = &Arc<Node>> {
        self.entries.values().map(|e| &e.node)
    }

    fn group_mut(&mut self, distance: NodeDistance) -> &mut NodeGroup {
        match distance {
            NodeDistance::Local => &mut self.local,
            NodeDistance::Remote => &mut self.remote,
            NodeDistance::Ignored => &mut self.ignored,
        }
    }

    pub(crate) fn insert(&mut self, node: Arc<Node>, distance: NodeDistance) {
        let group = self.group_mut(distance);
        *group = group.with(Arc::clone(&node));
        self.entries.insert(node.host_id(), Entry { node, distance });
    }

    pub(crate) fn remove(&mut self, host_id: HostId) -> Option<Arc<Node>> {
        let entry = self.entries.remove(&host_id)?;
        let group = self.group_mut(entry.distance);
        *group = group.without(host_id);
        Some(entry.node)
    }

    /// Move a known node to another group. Returns the previous distance.
    pub(crate) fn relocate(
        &mut self,
        host_id: HostId,
        distance: NodeDistance,
    ) -> Option<NodeDistance> {
        let entry = self.entries.get_mut(&host_id)?;
        let previous = entry.distance;
        if previous == distance {
            return Some(previous);
        }
        entry.distance = distance;
        let node = Arc::clone(&entry.node);

        let from = self.group_mut(previous);
        *from = from.without(host_id);
        let to = self.group_mut(distance);
        *to = to.with(node);
        Some(previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeInfo;

    fn node(id: u128) -> Arc<Node> {
        let info = NodeInfo::new(HostId(id), "10.0.0.1:9042".parse().unwrap());
        Arc::new(Node::new(info, NodeDistance::Local))
    }

    #[test]
    fn test_insert_places_node_in_one_group() {
        let mut topology = Topology::new();
        topology.insert(node(1), NodeDistance::Local);
        topology.insert(node(2), NodeDistance::Remote);

        assert_eq!(topology.len(), 2);
        assert!(topology.group(NodeDistance::Local).contains(HostId(1)));
        assert!(!topology.group(NodeDistance::Remote).contains(HostId(1)));
        assert_eq!(topology.distance(HostId(2)), Some(NodeDistance::Remote));
    }

    #[test]
    fn test_relocate_moves_between_groups() {
        let mut topology = Topology::new();
        topology.insert(node(1), NodeDistance::Local);

        assert_eq!(topology.relocate(HostId(1), NodeDistance::Ignored), Some(NodeDistance::Local));
        assert!(topology.group(NodeDistance::Local).is_empty());
        assert!(topology.group(NodeDistance::Ignored).contains(HostId(1)));

        assert_eq!(topology.relocate(HostId(9), NodeDistance::Local), None);
    }

    #[test]
    fn test_cloned_view_is_unaffected_by_later_changes() {
        let mut topology = Topology::new();
        topology.insert(node(1), NodeDistance::Local);
        let before = topology.clone();

        topology.remove(HostId(1));
        assert!(topology.is_empty());
        assert_eq!(before.group(NodeDistance::Local).len(), 1);
    }
}
