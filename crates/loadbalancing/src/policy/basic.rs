//! Basic load balancing policy.
//!
//! Datacenter-aware round-robin:
//!
//! - Nodes of the local datacenter are LOCAL and tried first, rotating the
//!   start node on every plan.
//! - Other nodes are REMOTE (tried after every local node, optionally capped)
//!   or IGNORED when remote usage is disabled.
//! - DOWN and FORCED_DOWN nodes are skipped while the plan is consumed.
//!
//! The policy is the composition of three parts sharing one registry:
//! the topology event processor (writer), the distance policy (consulted by
//! the processor) and the query planner (reader).

use crate::config::LoadBalancingConfig;
use crate::distance::{DistancePolicy, NodeDistanceEvaluator};
use crate::error::Result;
use crate::listener::{MultiplexingTopologyListener, TopologyListener};
use crate::plan::{QueryPlan, QueryPlanner};
use crate::policy::LoadBalancingPolicy;
use crate::processor::{Lifecycle, TopologyEvent, TopologyEventProcessor};
use crate::reporter::DistanceReporter;
use crate::request::Request;
use metadata::{HostId, NodeDistance, NodeInfo, NodeRegistry};
use std::sync::Arc;
use tracing::debug;

/// Builder for [`BasicLoadBalancingPolicy`].
///
/// # Example
///
/// ```rust
/// use loadbalancing::{LoadBalancingConfig, PolicyBuilder};
///
/// let policy = PolicyBuilder::new(LoadBalancingConfig::with_local_datacenter("dc1"))
///     .build()
///     .unwrap();
/// ```
pub struct PolicyBuilder {
    config: LoadBalancingConfig,
    evaluator: Option<Arc<dyn NodeDistanceEvaluator>>,
    listeners: Vec<Arc<dyn TopologyListener>>,
}

impl PolicyBuilder {
    pub fn new(config: LoadBalancingConfig) -> Self {
        Self {
            config,
            evaluator: None,
            listeners: Vec::new(),
        }
    }

    /// Install a distance evaluator consulted before the datacenter rule.
    pub fn with_evaluator(mut self, evaluator: Arc<dyn NodeDistanceEvaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    /// Register a topology listener from the start (so it also sees `init`).
    pub fn with_listener(mut self, listener: Arc<dyn TopologyListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn build(self) -> Result<BasicLoadBalancingPolicy> {
        self.config.validate()?;

        let mut distance_policy = DistancePolicy::new(self.config.allow_remote);
        if let Some(evaluator) = self.evaluator {
            distance_policy = distance_policy.with_evaluator(evaluator);
        }

        let registry = Arc::new(NodeRegistry::new());
        let listener = Arc::new(MultiplexingTopologyListener::from_listeners(self.listeners));
        let processor = TopologyEventProcessor::new(
            Arc::clone(&registry),
            distance_policy,
            self.config.local_datacenter.clone(),
            Arc::clone(&listener),
        );

        Ok(BasicLoadBalancingPolicy {
            planner: QueryPlanner::new(&self.config),
            config: self.config,
            registry,
            processor,
            listener,
        })
    }
}

/// Datacenter-aware round-robin policy.
pub struct BasicLoadBalancingPolicy {
    config: LoadBalancingConfig,
    registry: Arc<NodeRegistry>,
    processor: TopologyEventProcessor,
    planner: QueryPlanner,
    listener: Arc<MultiplexingTopologyListener>,
}

impl BasicLoadBalancingPolicy {
    pub fn new(config: LoadBalancingConfig) -> Result<Self> {
        PolicyBuilder::new(config).build()
    }

    pub fn builder(config: LoadBalancingConfig) -> PolicyBuilder {
        PolicyBuilder::new(config)
    }

    pub fn config(&self) -> &LoadBalancingConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.processor.lifecycle()
    }

    /// Configured or inferred local datacenter, once initialized.
    pub fn local_datacenter(&self) -> Option<&str> {
        self.processor.local_datacenter()
    }

    /// Add an observer of distance and state changes.
    pub fn register_listener(&self, listener: Arc<dyn TopologyListener>) {
        self.listener.register(listener);
    }

    /// Reporter for distance decisions made outside the processor.
    pub fn distance_reporter(&self) -> &dyn DistanceReporter {
        &self.processor
    }
}

impl LoadBalancingPolicy for BasicLoadBalancingPolicy {
    fn init(&self, nodes: Vec<NodeInfo>, contact_points: &[HostId]) -> Result<()> {
        self.processor.init(nodes, contact_points)
    }

    fn on_event(&self, event: TopologyEvent) {
        self.processor.submit(event);
    }

    fn new_query_plan(&self, request: &Request) -> QueryPlan {
        if self.processor.lifecycle() != Lifecycle::Ready {
            debug!(
                lifecycle = ?self.processor.lifecycle(),
                "Policy not ready, returning empty query plan"
            );
            return QueryPlan::empty();
        }
        let view = self.registry.view();
        QueryPlan::new(self.planner.plan(&view, request))
    }

    fn distance(&self, host_id: HostId) -> Option<NodeDistance> {
        self.registry.distance(host_id)
    }

    fn close(&self) {
        self.processor.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LoadBalancingError;

    fn info(id: u128, dc: &str) -> NodeInfo {
        NodeInfo::with_topology(
            HostId(id),
            format!("10.0.0.{}:9042", id).parse().unwrap(),
            Some(dc.to_string()),
            None,
        )
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        let config = LoadBalancingConfig {
            allow_remote: true,
            max_remote_nodes: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            BasicLoadBalancingPolicy::new(config),
            Err(LoadBalancingError::Config(_))
        ));
    }

    #[test]
    fn test_plan_before_init_is_empty() {
        let policy = BasicLoadBalancingPolicy::new(LoadBalancingConfig::default()).unwrap();
        assert_eq!(policy.new_query_plan(&Request::new()).count(), 0);
        assert_eq!(policy.lifecycle(), Lifecycle::Created);
    }

    #[test]
    fn test_plan_after_close_is_empty() {
        let policy = BasicLoadBalancingPolicy::new(LoadBalancingConfig::default()).unwrap();
        policy.init(vec![info(1, "dc1")], &[HostId(1)]).unwrap();
        assert_eq!(policy.new_query_plan(&Request::new()).count(), 1);

        policy.close();
        assert_eq!(policy.new_query_plan(&Request::new()).count(), 0);
        // Late events are ignored.
        policy.on_add(info(2, "dc1"));
        assert_eq!(policy.distance(HostId(2)), None);
    }

    #[test]
    fn test_distance_reporter_is_serialized_with_events() {
        let policy = BasicLoadBalancingPolicy::new(LoadBalancingConfig::default()).unwrap();
        policy.init(vec![info(1, "dc1"), info(2, "dc1")], &[HostId(1)]).unwrap();

        policy.distance_reporter().set_distance(HostId(2), NodeDistance::Ignored);
        assert_eq!(policy.distance(HostId(2)), Some(NodeDistance::Ignored));

        let plan: Vec<_> = policy.new_query_plan(&Request::new()).map(|n| n.host_id()).collect();
        assert_eq!(plan, vec![HostId(1)]);
    }
}
