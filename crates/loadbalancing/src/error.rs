//! Load balancing error types

use thiserror::Error;

/// Errors surfaced by the load balancing core.
///
/// Only startup and contract violations are reported this way. Failures
/// while applying topology events or notifying observers are logged and
/// swallowed, and an empty query plan is a valid result, not an error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadBalancingError {
    #[error("No local datacenter was configured and no contact points were provided to infer it")]
    NoContactPoints,

    #[error(
        "No local datacenter was configured and none of the contact points are \
         among the known nodes"
    )]
    UnknownContactPoints,

    #[error("No local datacenter was configured and none of the contact points reported one")]
    UndeterminedLocalDatacenter,

    #[error(
        "No local datacenter was configured, but the contact points are from \
         different datacenters: {}",
        .0.join(", ")
    )]
    AmbiguousLocalDatacenter(Vec<String>),

    #[error("Policy was already initialized")]
    AlreadyInitialized,

    #[error("Policy is closed")]
    Closed,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl LoadBalancingError {
    /// Whether the driver must abort startup on this error.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, LoadBalancingError::Closed)
    }

    /// Get the error type as a string for metrics labeling
    pub fn error_type(&self) -> &'static str {
        match self {
            LoadBalancingError::NoContactPoints => "no_contact_points",
            LoadBalancingError::UnknownContactPoints => "unknown_contact_points",
            LoadBalancingError::UndeterminedLocalDatacenter => "undetermined_local_datacenter",
            LoadBalancingError::AmbiguousLocalDatacenter(_) => "ambiguous_local_datacenter",
            LoadBalancingError::AlreadyInitialized => "already_initialized",
            LoadBalancingError::Closed => "closed",
            LoadBalancingError::Config(_) => "config",
        }
    }
}

pub type Result<T> = std::result::Result<T, LoadBalancingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ambiguous_message_lists_datacenters() {
        let err = LoadBalancingError::AmbiguousLocalDatacenter(vec!["dc1".into(), "dc2".into()]);
        assert!(err.to_string().ends_with("dc1, dc2"));
        assert!(err.is_fatal());
        assert_eq!(err.error_type(), "ambiguous_local_datacenter");
    }

    #[test]
    fn test_error_types_are_distinct() {
        let errors = [
            LoadBalancingError::NoContactPoints,
            LoadBalancingError::UnknownContactPoints,
            LoadBalancingError::UndeterminedLocalDatacenter,
            LoadBalancingError::AmbiguousLocalDatacenter(vec![]),
            LoadBalancingError::AlreadyInitialized,
            LoadBalancingError::Closed,
            LoadBalancingError::Config(String::new()),
        ];
        let labels: std::collections::HashSet<_> = errors.iter().map(|e| e.error_type()).collect();
        assert_eq!(labels.len(), errors.len());
    }

    #[test]
    fn test_closed_is_not_fatal() {
        assert!(!LoadBalancingError::Closed.is_fatal());
    }
}
