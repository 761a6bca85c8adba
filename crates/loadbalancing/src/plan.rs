//! Query plan generation.
//!
//! A query plan is the ordered list of nodes a request tries, consumed lazily:
//! the execution layer pulls the next node only when the previous attempt
//! failed, and drops the plan on success.
//!
//! # Algorithm
//!
//! 1. Capture one topology view (a single atomic load).
//! 2. Take a start offset from a shared counter (`fetch_add`), so concurrent
//!    plans begin on different nodes.
//! 3. Walk the LOCAL group from that offset, wrapping once.
//! 4. Then walk the REMOTE group the same way, if remote nodes are permitted
//!    for this request, up to the configured cap.
//!
//! Eligibility (state, removal, IGNORED distance) is checked when a node is
//! about to be yielded, not when the plan is created, so a node going down
//! mid-plan is skipped. Both groups come from the same view and are disjoint,
//! so a node is yielded at most once.
//!
//! # Performance
//!
//! - **Creation**: O(1), one atomic load and one atomic increment, no lock.
//! - **Each element**: O(1) amortized, three atomic loads per candidate.

use crate::config::LoadBalancingConfig;
use crate::request::Request;
use metadata::{Node, NodeDistance, NodeGroup, Topology};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Lazy, single-use sequence of candidate nodes for one request.
///
/// An empty plan is valid output: the execution layer turns it into a
/// "no host available" error.
pub struct QueryPlan {
    inner: Box<dyn Iterator<Item = Arc<Node>> + Send>,
}

impl QueryPlan {
    pub fn new<I>(nodes: I) -> Self
    where
        I: Iterator<Item = Arc<Node>> + Send + 'static,
    {
        Self { inner: Box::new(nodes) }
    }

    pub fn empty() -> Self {
        Self::new(std::iter::empty())
    }

    /// Drop nodes failing `predicate`, evaluated as each node is pulled.
    pub fn filter_nodes<F>(self, mut predicate: F) -> Self
    where
        F: FnMut(&Node) -> bool + Send + 'static,
    {
        Self::new(self.inner.filter(move |node| predicate(&**node)))
    }
}

impl Iterator for QueryPlan {
    type Item = Arc<Node>;

    #[inline]
    fn next(&mut self) -> Option<Arc<Node>> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl fmt::Debug for QueryPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryPlan").finish_non_exhaustive()
    }
}

/// Round-robin walk over the LOCAL then REMOTE group of one view.
#[derive(Debug, Clone)]
pub struct RoundRobinPlan {
    local: NodeGroup,
    remote: NodeGroup,
    offset: usize,
    local_cursor: usize,
    remote_cursor: usize,
    remote_budget: usize,
}

impl RoundRobinPlan {
    /// `remote_budget` is the number of remote nodes this plan may still
    /// yield; 0 disables the remote phase.
    pub fn new(topology: &Topology, offset: usize, remote_budget: usize) -> Self {
        Self {
            local: topology.group(NodeDistance::Local).clone(),
            remote: topology.group(NodeDistance::Remote).clone(),
            offset,
            local_cursor: 0,
            remote_cursor: 0,
            remote_budget,
        }
    }

    fn next_from(group: &NodeGroup, offset: usize, cursor: &mut usize) -> Option<Arc<Node>> {
        let len = group.len();
        while *cursor < len {
            let index = offset.wrapping_add(*cursor) % len;
            *cursor += 1;
            if let Some(node) = group.get(index) {
                if node.is_eligible() {
                    return Some(Arc::clone(node));
                }
            }
        }
        None
    }
}

impl Iterator for RoundRobinPlan {
    type Item = Arc<Node>;

    fn next(&mut self) -> Option<Arc<Node>> {
        if let Some(node) = Self::next_from(&self.local, self.offset, &mut self.local_cursor) {
            return Some(node);
        }
        if self.remote_budget == 0 {
            return None;
        }
        let node = Self::next_from(&self.remote, self.offset, &mut self.remote_cursor)?;
        self.remote_budget -= 1;
        Some(node)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let local_left = self.local.len() - self.local_cursor;
        let remote_left = (self.remote.len() - self.remote_cursor).min(self.remote_budget);
        (0, Some(local_left + remote_left))
    }
}

/// Hands out query plans; owns the rotation counter.
#[derive(Debug)]
pub struct QueryPlanner {
    round_robin: AtomicUsize,
    allow_remote: bool,
    allow_remote_for_local_consistency: bool,
    max_remote_nodes: Option<usize>,
}

impl QueryPlanner {
    pub fn new(config: &LoadBalancingConfig) -> Self {
        Self {
            round_robin: AtomicUsize::new(0),
            allow_remote: config.allow_remote,
            allow_remote_for_local_consistency: config.allow_remote_for_local_consistency,
            max_remote_nodes: config.max_remote_nodes,
        }
    }

    /// Build a fresh plan over `topology`.
    pub fn plan(&self, topology: &Topology, request: &Request) -> RoundRobinPlan {
        let offset = self.round_robin.fetch_add(1, Ordering::Relaxed);
        RoundRobinPlan::new(topology, offset, self.remote_budget(request))
    }

    fn remote_budget(&self, request: &Request) -> usize {
        if !self.allow_remote {
            return 0;
        }
        if request.is_dc_local() && !self.allow_remote_for_local_consistency {
            return 0;
        }
        self.max_remote_nodes.unwrap_or(usize::MAX)
    }
}
