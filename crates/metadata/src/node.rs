//! Node abstractions for the cluster view.
//!
//! Nodes represent the peers of the ring as seen by the client. They are
//! identified by a compact `HostId` that the cluster assigns once and that
//! survives address changes.

use crossbeam::atomic::AtomicCell;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};

/// Stable identifier of a node in the cluster.
///
/// Newtype over `u128` (the host id is a UUID on the wire) so comparisons and
/// hashing stay cheap on the plan-generation path.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct HostId(pub u128);

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

/// Health state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum NodeState {
    /// Not yet confirmed either way. Eligible for query plans.
    Unknown,
    /// Reported up by the topology source.
    Up,
    /// Reported down by the topology source.
    Down,
    /// Operator override; never used for queries until forced back up.
    ForcedDown,
}

impl Default for NodeState {
    fn default() -> Self {
        NodeState::Unknown
    }
}

impl NodeState {
    /// Whether a node in this state may be handed to the execution layer.
    #[inline]
    pub fn is_eligible(self) -> bool {
        matches!(self, NodeState::Unknown | NodeState::Up)
    }

    /// Get state as a string for logs and metric labels
    pub fn as_str(self) -> &'static str {
        match self {
            NodeState::Unknown => "unknown",
            NodeState::Up => "up",
            NodeState::Down => "down",
            NodeState::ForcedDown => "forced_down",
        }
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Usefulness of a node to this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum NodeDistance {
    /// Same datacenter as the client; tried first.
    Local,
    /// Other datacenter; tried once local nodes are exhausted.
    Remote,
    /// Never used for queries and never pooled.
    Ignored,
}

impl NodeDistance {
    pub const ALL: [NodeDistance; 3] = [
        NodeDistance::Local,
        NodeDistance::Remote,
        NodeDistance::Ignored,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NodeDistance::Local => "local",
            NodeDistance::Remote => "remote",
            NodeDistance::Ignored => "ignored",
        }
    }
}

impl fmt::Display for NodeDistance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Descriptor of a node as reported by the topology source.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub host_id: HostId,
    /// Address the driver connects to.
    pub address: SocketAddr,
    /// Datacenter label; absent when the peer did not report one.
    pub datacenter: Option<String>,
    /// Rack label.
    pub rack: Option<String>,
}

impl NodeInfo {
    /// Construct a descriptor with no topology labels.
    pub fn new(host_id: HostId, address: SocketAddr) -> Self {
        Self {
            host_id,
            address,
            datacenter: None,
            rack: None,
        }
    }

    pub fn with_topology(
        host_id: HostId,
        address: SocketAddr,
        datacenter: Option<String>,
        rack: Option<String>,
    ) -> Self {
        Self {
            host_id,
            address,
            datacenter,
            rack,
        }
    }
}

/// A known node, shared between the registry and every topology view.
///
/// The identity never changes. Health state and distance live in atomic cells
/// so readers holding an old view still observe the *current* values; the
/// descriptor sits behind a lock because it is only written by the registry
/// and rarely read on the hot path.
pub struct Node {
    host_id: HostId,
    info: RwLock<NodeInfo>,
    state: AtomicCell<NodeState>,
    distance: AtomicCell<NodeDistance>,
    removed: AtomicBool,
}

impl Node {
    pub(crate) fn new(info: NodeInfo, distance: NodeDistance) -> Self {
        Self {
            host_id: info.host_id,
            info: RwLock::new(info),
            state: AtomicCell::new(NodeState::Unknown),
            distance: AtomicCell::new(distance),
            removed: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn host_id(&self) -> HostId {
        self.host_id
    }

    pub fn address(&self) -> SocketAddr {
        self.info.read().address
    }

    pub fn datacenter(&self) -> Option<String> {
        self.info.read().datacenter.clone()
    }

    pub fn rack(&self) -> Option<String> {
        self.info.read().rack.clone()
    }

    /// Copy of the current descriptor.
    pub fn info(&self) -> NodeInfo {
        self.info.read().clone()
    }

    #[inline]
    pub fn state(&self) -> NodeState {
        self.state.load()
    }

    /// Distance most recently assigned by the registry.
    #[inline]
    pub fn distance(&self) -> NodeDistance {
        self.distance.load()
    }

    /// True once the registry dropped this node. A re-added host id gets a
    /// fresh `Node`, so this never flips back.
    #[inline]
    pub fn is_removed(&self) -> bool {
        self.removed.load(Ordering::Acquire)
    }

    /// Whether the node may be yielded by a query plan right now.
    #[inline]
    pub fn is_eligible(&self) -> bool {
        !self.is_removed() && self.state().is_eligible() && self.distance() != NodeDistance::Ignored
    }

    pub(crate) fn replace_info(&self, info: NodeInfo) -> NodeInfo {
        std::mem::replace(&mut *self.info.write(), info)
    }

    pub(crate) fn swap_state(&self, state: NodeState) -> NodeState {
        self.state.swap(state)
    }

    pub(crate) fn swap_distance(&self, distance: NodeDistance) -> NodeDistance {
        self.distance.swap(distance)
    }

    pub(crate) fn mark_removed(&self) {
        self.removed.store(true, Ordering::Release);
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let info = self.info.read();
        f.debug_struct("Node")
            .field("host_id", &self.host_id)
            .field("address", &info.address)
            .field("datacenter", &info.datacenter)
            .field("state", &self.state())
            .field("distance", &self.distance())
            .finish()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({}, {})", self.address(), self.host_id)
    }
}
