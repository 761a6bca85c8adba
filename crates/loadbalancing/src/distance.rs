//! Distance policy.
//!
//! Classifies each node as LOCAL, REMOTE or IGNORED relative to the local
//! datacenter:
//!
//! 1. A user-supplied [`NodeDistanceEvaluator`] gets the first word. When it
//!    returns `Some(distance)` that decision wins.
//! 2. Nodes of the local datacenter are LOCAL.
//! 3. Everything else is REMOTE, or IGNORED when remote nodes are disabled.
//!
//! The local datacenter is either configured or inferred once, at
//! initialization, from the contact points (see [`resolve_local_datacenter`]).

use crate::error::{LoadBalancingError, Result};
use metadata::{NodeDistance, NodeInfo};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Hook that overrides the datacenter rule for selected nodes.
///
/// Returning `None` defers to the built-in rule.
pub trait NodeDistanceEvaluator: Send + Sync {
    fn evaluate_distance(&self, node: &NodeInfo, local_datacenter: &str) -> Option<NodeDistance>;
}

impl<F> NodeDistanceEvaluator for F
where
    F: Fn(&NodeInfo, &str) -> Option<NodeDistance> + Send + Sync,
{
    fn evaluate_distance(&self, node: &NodeInfo, local_datacenter: &str) -> Option<NodeDistance> {
        self(node, local_datacenter)
    }
}

/// Datacenter-based distance rule.
#[derive(Clone, Default)]
pub struct DistancePolicy {
    allow_remote: bool,
    evaluator: Option<Arc<dyn NodeDistanceEvaluator>>,
}

impl DistancePolicy {
    pub fn new(allow_remote: bool) -> Self {
        Self {
            allow_remote,
            evaluator: None,
        }
    }

    pub fn with_evaluator(mut self, evaluator: Arc<dyn NodeDistanceEvaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    /// Classify `node` against `local_datacenter`.
    ///
    /// Pure apart from whatever the evaluator does; a panicking evaluator
    /// unwinds through this call.
    pub fn compute_distance(&self, node: &NodeInfo, local_datacenter: &str) -> NodeDistance {
        if let Some(evaluator) = &self.evaluator {
            if let Some(distance) = evaluator.evaluate_distance(node, local_datacenter) {
                return distance;
            }
        }

        if node.datacenter.as_deref() == Some(local_datacenter) {
            NodeDistance::Local
        } else if self.allow_remote {
            NodeDistance::Remote
        } else {
            NodeDistance::Ignored
        }
    }
}

impl fmt::Debug for DistancePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DistancePolicy")
            .field("allow_remote", &self.allow_remote)
            .field("evaluator", &self.evaluator.is_some())
            .finish()
    }
}

/// Determine the local datacenter at initialization.
///
/// With an explicit datacenter, contact points from elsewhere only produce a
/// warning. Without one, every contact point that reports a datacenter must
/// report the same one; anything else is a fatal startup error because the
/// policy cannot safely guess.
pub fn resolve_local_datacenter(
    configured: Option<&str>,
    contact_points: &[&NodeInfo],
) -> Result<String> {
    match configured {
        Some(dc) => {
            let mismatched: Vec<String> = contact_points
                .iter()
                .filter(|cp| cp.datacenter.as_deref() != Some(dc))
                .map(|cp| {
                    let dc = cp.datacenter.as_deref().unwrap_or("<none>");
                    format!("{}={}", cp.address, dc)
                })
                .collect();
            if !mismatched.is_empty() {
                warn!(
                    local_datacenter = dc,
                    contact_points = %mismatched.join(", "),
                    "Configured local datacenter differs from that of some contact points; \
                     only nodes of the configured datacenter will be LOCAL"
                );
            }
            Ok(dc.to_string())
        }
        None => {
            let dc = infer_local_datacenter(contact_points)?;
            info!(local_datacenter = %dc, "Inferred local datacenter from contact points");
            Ok(dc)
        }
    }
}

/// Infer the local datacenter from the contact points alone.
pub fn infer_local_datacenter(contact_points: &[&NodeInfo]) -> Result<String> {
    if contact_points.is_empty() {
        return Err(LoadBalancingError::NoContactPoints);
    }

    let datacenters: BTreeSet<&str> = contact_points
        .iter()
        .filter_map(|cp| cp.datacenter.as_deref())
        .collect();

    let mut iter = datacenters.iter();
    match (iter.next(), iter.next()) {
        (None, _) => Err(LoadBalancingError::UndeterminedLocalDatacenter),
        (Some(dc), None) => Ok((*dc).to_string()),
        _ => Err(LoadBalancingError::AmbiguousLocalDatacenter(
            datacenters.into_iter().map(str::to_string).collect(),
        )),
    }
}
