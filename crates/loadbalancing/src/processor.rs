//! Topology event processor.
//!
//! The only writer of the node registry. Events may be submitted from any
//! thread; they go through a single queue and are applied one at a time, in
//! submission order, by whichever submitter currently holds the writer lock.
//!
//! ```text
//! Lifecycle: Created → Initializing → Ready → Closed
//!
//!   Created:      events are dropped (init sees the full node list)
//!   Initializing: events queue up and are applied right after init
//!   Ready:        events are applied
//!   Closed:       events are dropped
//! ```
//!
//! A panic while applying one event (typically from a user-supplied distance
//! evaluator) is caught and logged; the next event is processed normally.

use crate::distance::{resolve_local_datacenter, DistancePolicy};
use crate::error::{LoadBalancingError, Result};
use crate::isolate;
use crate::listener::{MultiplexingTopologyListener, TopologyListener};
use crate::reporter::DistanceReporter;
use crossbeam::atomic::AtomicCell;
use crossbeam::channel::{self, Receiver, Sender};
use metadata::{HostId, Node, NodeDistance, NodeInfo, NodeRegistry, NodeState, Upsert};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::{Arc, OnceLock};
use tracing::{debug, error, info, warn};

/// Policy lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Lifecycle {
    Created,
    Initializing,
    Ready,
    Closed,
}

/// A discrete change reported by the topology source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopologyEvent {
    /// Node discovered, or its descriptor refreshed.
    Added(NodeInfo),
    Removed(HostId),
    Up(HostId),
    Down(HostId),
    /// Operator override: never use the node until `ForceUp`.
    ForceDown(HostId),
    ForceUp(HostId),
    /// Run the distance policy again for one node.
    Reevaluate(HostId),
}

impl TopologyEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            TopologyEvent::Added(_) => "added",
            TopologyEvent::Removed(_) => "removed",
            TopologyEvent::Up(_) => "up",
            TopologyEvent::Down(_) => "down",
            TopologyEvent::ForceDown(_) => "force_down",
            TopologyEvent::ForceUp(_) => "force_up",
            TopologyEvent::Reevaluate(_) => "reevaluate",
        }
    }

    pub fn host_id(&self) -> HostId {
        match self {
            TopologyEvent::Added(info) => info.host_id,
            TopologyEvent::Removed(id)
            | TopologyEvent::Up(id)
            | TopologyEvent::Down(id)
            | TopologyEvent::ForceDown(id)
            | TopologyEvent::ForceUp(id)
            | TopologyEvent::Reevaluate(id) => *id,
        }
    }
}

enum Command {
    Event(TopologyEvent),
    SetDistance(HostId, NodeDistance),
}

/// Serializes topology mutations onto the registry.
pub struct TopologyEventProcessor {
    registry: Arc<NodeRegistry>,
    distance_policy: DistancePolicy,
    configured_datacenter: Option<String>,
    local_datacenter: OnceLock<String>,
    listener: Arc<MultiplexingTopologyListener>,
    lifecycle: AtomicCell<Lifecycle>,
    queue_tx: Sender<Command>,
    queue_rx: Receiver<Command>,
    writer: Mutex<()>,
}

impl TopologyEventProcessor {
    pub fn new(
        registry: Arc<NodeRegistry>,
        distance_policy: DistancePolicy,
        configured_datacenter: Option<String>,
        listener: Arc<MultiplexingTopologyListener>,
    ) -> Self {
        let (queue_tx, queue_rx) = channel::unbounded();
        Self {
            registry,
            distance_policy,
            configured_datacenter,
            local_datacenter: OnceLock::new(),
            listener,
            lifecycle: AtomicCell::new(Lifecycle::Created),
            queue_tx,
            queue_rx,
            writer: Mutex::new(()),
        }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle.load()
    }

    /// Local datacenter, known once `init` succeeded.
    pub fn local_datacenter(&self) -> Option<&str> {
        self.local_datacenter.get().map(String::as_str)
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    /// Populate the registry from the initial node list.
    ///
    /// `contact_points` are the host ids of the nodes the control connection
    /// was established with; they drive local datacenter inference. Must be
    /// called exactly once. A failure is fatal and leaves the processor
    /// closed.
    pub fn init(&self, nodes: Vec<NodeInfo>, contact_points: &[HostId]) -> Result<()> {
        let guard = self.writer.lock();
        if let Err(current) = self
            .lifecycle
            .compare_exchange(Lifecycle::Created, Lifecycle::Initializing)
        {
            return Err(match current {
                Lifecycle::Closed => LoadBalancingError::Closed,
                _ => LoadBalancingError::AlreadyInitialized,
            });
        }

        let result = self.populate(nodes, contact_points);
        match &result {
            Ok(()) => {
                if self
                    .lifecycle
                    .compare_exchange(Lifecycle::Initializing, Lifecycle::Ready)
                    .is_err()
                {
                    drop(guard);
                    return Err(LoadBalancingError::Closed);
                }
                info!(
                    local_datacenter = self.local_datacenter().unwrap_or_default(),
                    nodes = self.registry.len(),
                    "Load balancing policy ready"
                );
            }
            Err(e) => {
                self.lifecycle.store(Lifecycle::Closed);
                metrics::counter!("ring_driver_init_failures_total", "error" => e.error_type())
                    .increment(1);
                error!(error = %e, "Load balancing policy initialization failed");
            }
        }
        drop(guard);

        // Replay whatever arrived while we were initializing.
        self.drain();
        result
    }

    fn populate(&self, nodes: Vec<NodeInfo>, contact_points: &[HostId]) -> Result<()> {
        let wanted: HashSet<HostId> = contact_points.iter().copied().collect();
        let contacts: Vec<&NodeInfo> = nodes
            .iter()
            .filter(|n| wanted.contains(&n.host_id))
            .collect();
        let configured = self.configured_datacenter.as_deref();
        if configured.is_none() && !wanted.is_empty() && contacts.is_empty() {
            return Err(LoadBalancingError::UnknownContactPoints);
        }
        let local_dc = resolve_local_datacenter(configured, &contacts)?;
        let local_dc = self.local_datacenter.get_or_init(|| local_dc).clone();

        for info in nodes {
            let host_id = info.host_id;
            let upsert = isolate::catch(|| {
                self.registry
                    .upsert(info, |info| self.distance_policy.compute_distance(info, &local_dc))
            });
            match upsert {
                Ok(outcome) => self.announce(outcome),
                Err(panic) => {
                    error!(
                        %host_id,
                        error = %panic,
                        "Unexpected error while evaluating node distance, skipping node"
                    );
                }
            }
        }
        Ok(())
    }

    /// Queue an event and apply everything pending if no one else is.
    pub fn submit(&self, event: TopologyEvent) {
        self.enqueue(Command::Event(event));
    }

    /// Stop accepting events. Idempotent.
    pub fn close(&self) {
        if self.lifecycle.swap(Lifecycle::Closed) != Lifecycle::Closed {
            info!("Load balancing policy closed");
            self.listener.close();
        }
    }

    fn enqueue(&self, command: Command) {
        // The receiver lives as long as `self`, so sending cannot fail.
        let _ = self.queue_tx.send(command);
        self.drain();
    }

    fn drain(&self) {
        loop {
            let Some(_guard) = self.writer.try_lock() else {
                // The current holder drains our command before it leaves.
                return;
            };
            while let Ok(command) = self.queue_rx.try_recv() {
                self.dispatch(command);
            }
            drop(_guard);
            // A command may have landed between the last receive and the
            // unlock while its sender saw the lock taken.
            if self.queue_rx.is_empty() {
                return;
            }
        }
    }

    fn dispatch(&self, command: Command) {
        let (kind, host_id) = match &command {
            Command::Event(event) => (event.kind(), event.host_id()),
            Command::SetDistance(id, _) => ("set_distance", *id),
        };

        match self.lifecycle.load() {
            Lifecycle::Ready => {}
            Lifecycle::Closed => {
                debug!(event = kind, %host_id, "Ignoring topology event received after close");
                return;
            }
            Lifecycle::Created | Lifecycle::Initializing => {
                debug!(event = kind, %host_id, "Ignoring topology event received before init");
                return;
            }
        }
        let Some(local_dc) = self.local_datacenter.get() else {
            return;
        };

        if let Err(panic) = isolate::catch(|| self.apply(command, local_dc)) {
            error!(
                event = kind,
                %host_id,
                error = %panic,
                "Unexpected error while processing topology event"
            );
        }
    }

    fn apply(&self, command: Command, local_dc: &str) {
        let event = match command {
            Command::SetDistance(id, distance) => {
                match self.registry.get(id) {
                    Some(node) => self.update_distance(&node, distance),
                    None => {
                        warn!(host_id = %id, %distance, "Dropping distance update for unknown node")
                    }
                }
                return;
            }
            Command::Event(event) => event,
        };

        match event {
            TopologyEvent::Added(info) => {
                let outcome = self
                    .registry
                    .upsert(info, |info| self.distance_policy.compute_distance(info, local_dc));
                self.announce(outcome);
            }
            TopologyEvent::Removed(id) => match self.registry.remove(id) {
                Some(node) => {
                    debug!(host_id = %id, "Node removed");
                    self.listener.on_removed(&node);
                }
                None => debug!(host_id = %id, "Ignoring removal of unknown node"),
            },
            TopologyEvent::Up(id) => self.update_state(id, NodeState::Up, false),
            TopologyEvent::Down(id) => self.update_state(id, NodeState::Down, false),
            TopologyEvent::ForceDown(id) => self.update_state(id, NodeState::ForcedDown, true),
            TopologyEvent::ForceUp(id) => match self.registry.get(id) {
                Some(node) if node.state() == NodeState::ForcedDown => {
                    self.update_state(id, NodeState::Up, true)
                }
                Some(_) => {
                    debug!(host_id = %id, "Ignoring force-up of a node that is not forced down")
                }
                None => debug!(host_id = %id, "Ignoring force-up of unknown node"),
            },
            TopologyEvent::Reevaluate(id) => match self.registry.get(id) {
                Some(node) => {
                    let distance = self.distance_policy.compute_distance(&node.info(), local_dc);
                    self.update_distance(&node, distance);
                }
                None => debug!(host_id = %id, "Ignoring re-evaluation of unknown node"),
            },
        }
    }

    fn announce(&self, outcome: Upsert) {
        match outcome {
            Upsert::Created(node) => {
                debug!(host_id = %node.host_id(), distance = %node.distance(), "Node added");
                self.listener.on_added(&node);
                self.listener.on_distance_changed(&node, node.distance());
            }
            Upsert::Relocated {
                node,
                previous,
                current,
            } => {
                if previous != current {
                    self.listener.on_distance_changed(&node, current);
                }
            }
            Upsert::Updated(_) | Upsert::Unchanged(_) => {}
        }
    }

    fn update_state(&self, id: HostId, state: NodeState, forced: bool) {
        let Some(node) = self.registry.get(id) else {
            debug!(host_id = %id, %state, "Ignoring state change of unknown node");
            return;
        };
        if !forced && node.state() == NodeState::ForcedDown {
            debug!(host_id = %id, %state, "Ignoring state change of forced-down node");
            return;
        }
        match self.registry.set_state(id, state) {
            Ok(previous) if previous != state => {
                debug!(host_id = %id, %previous, current = %state, "Node state changed");
                self.listener.on_state_changed(&node, previous, state);
            }
            Ok(_) => {}
            Err(e) => debug!(error = %e, "Ignoring state change"),
        }
    }

    fn update_distance(&self, node: &Node, distance: NodeDistance) {
        match self.registry.set_distance(node.host_id(), distance) {
            Ok(previous) if previous != distance => {
                self.listener.on_distance_changed(node, distance);
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, %distance, "Dropping distance update"),
        }
    }
}

impl DistanceReporter for TopologyEventProcessor {
    /// Applied in order with the other events; see [`DistanceReporter`].
    fn set_distance(&self, host_id: HostId, distance: NodeDistance) {
        self.enqueue(Command::SetDistance(host_id, distance));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(id: u128, dc: &str) -> NodeInfo {
        NodeInfo::with_topology(
            HostId(id),
            format!("10.0.0.{}:9042", id).parse().unwrap(),
            Some(dc.to_string()),
            None,
        )
    }

    fn processor(allow_remote: bool) -> TopologyEventProcessor {
        TopologyEventProcessor::new(
            Arc::new(NodeRegistry::new()),
            DistancePolicy::new(allow_remote),
            None,
            Arc::new(MultiplexingTopologyListener::new()),
        )
    }

    #[test]
    fn test_init_twice_is_rejected() {
        let p = processor(false);
        p.init(vec![info(1, "dc1")], &[HostId(1)]).unwrap();
        assert_eq!(p.lifecycle(), Lifecycle::Ready);
        assert_eq!(
            p.init(vec![info(2, "dc1")], &[HostId(2)]),
            Err(LoadBalancingError::AlreadyInitialized)
        );
        assert_eq!(p.registry().len(), 1);
    }

    #[test]
    fn test_failed_init_closes() {
        let p = processor(false);
        let result = p.init(vec![info(1, "dc1"), info(2, "dc2")], &[HostId(1), HostId(2)]);
        assert!(matches!(result, Err(LoadBalancingError::AmbiguousLocalDatacenter(_))));
        assert_eq!(p.lifecycle(), Lifecycle::Closed);
        assert!(p.registry().is_empty());
    }

    #[test]
    fn test_unmatched_contact_points_are_reported() {
        let p = processor(false);
        let result = p.init(vec![info(1, "dc1")], &[HostId(9)]);
        assert_eq!(result, Err(LoadBalancingError::UnknownContactPoints));
        assert_eq!(p.lifecycle(), Lifecycle::Closed);

        let p = processor(false);
        assert_eq!(p.init(vec![info(1, "dc1")], &[]), Err(LoadBalancingError::NoContactPoints));
    }

    #[test]
    fn test_configured_datacenter_needs_no_contact_points() {
        let p = TopologyEventProcessor::new(
            Arc::new(NodeRegistry::new()),
            DistancePolicy::new(false),
            Some("dc1".to_string()),
            Arc::new(MultiplexingTopologyListener::new()),
        );
        p.init(vec![info(1, "dc1")], &[HostId(9)]).unwrap();
        assert_eq!(p.local_datacenter(), Some("dc1"));
    }

    #[test]
    fn test_events_before_init_are_dropped() {
        let p = processor(false);
        p.submit(TopologyEvent::Added(info(1, "dc1")));
        assert!(p.registry().is_empty());
    }

    #[test]
    fn test_forced_down_ignores_up_and_down() {
        let p = processor(false);
        p.init(vec![info(1, "dc1")], &[HostId(1)]).unwrap();

        p.submit(TopologyEvent::ForceDown(HostId(1)));
        p.submit(TopologyEvent::Up(HostId(1)));
        assert_eq!(p.registry().get(HostId(1)).unwrap().state(), NodeState::ForcedDown);

        p.submit(TopologyEvent::ForceUp(HostId(1)));
        assert_eq!(p.registry().get(HostId(1)).unwrap().state(), NodeState::Up);
    }

    #[test]
    fn test_reported_distance_for_removed_node_is_dropped() {
        let p = processor(true);
        p.init(vec![info(1, "dc1"), info(2, "dc2")], &[HostId(1)]).unwrap();

        p.submit(TopologyEvent::Removed(HostId(2)));
        p.set_distance(HostId(2), NodeDistance::Local);

        assert_eq!(p.registry().distance(HostId(2)), None);
        assert_eq!(p.registry().len(), 1);
    }

    #[test]
    fn test_event_kind_and_host() {
        let event = TopologyEvent::Added(info(3, "dc1"));
        assert_eq!(event.kind(), "added");
        assert_eq!(event.host_id(), HostId(3));
        assert_eq!(TopologyEvent::ForceUp(HostId(4)).kind(), "force_up");
    }
}
