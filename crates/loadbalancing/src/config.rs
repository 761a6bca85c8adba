//! Load balancing configuration

use crate::error::{LoadBalancingError, Result};
use serde::{Deserialize, Serialize};

/// Configuration surface of the load balancing policy.
///
/// How the values are loaded is up to the embedding driver.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LoadBalancingConfig {
    /// Explicit local datacenter. When absent it is inferred from the
    /// contact points at initialization.
    #[serde(default)]
    pub local_datacenter: Option<String>,

    /// Use nodes outside the local datacenter. When false they are IGNORED.
    #[serde(default)]
    pub allow_remote: bool,

    /// Maximum number of remote nodes a single query plan may contain
    #[serde(default)]
    pub max_remote_nodes: Option<usize>,

    /// Let DC-local consistency levels (LOCAL_ONE, LOCAL_QUORUM, ...) fail
    /// over to remote nodes
    #[serde(default)]
    pub allow_remote_for_local_consistency: bool,
}

impl Default for LoadBalancingConfig {
    fn default() -> Self {
        Self {
            local_datacenter: None,
            allow_remote: false,
            max_remote_nodes: None,
            allow_remote_for_local_consistency: false,
        }
    }
}

impl LoadBalancingConfig {
    /// Config pinned to an explicit local datacenter.
    pub fn with_local_datacenter(datacenter: impl Into<String>) -> Self {
        Self {
            local_datacenter: Some(datacenter.into()),
            ..Default::default()
        }
    }

    /// Reject contradictory settings.
    pub fn validate(&self) -> Result<()> {
        if let Some(dc) = &self.local_datacenter {
            if dc.trim().is_empty() {
                return Err(LoadBalancingError::Config(
                    "local_datacenter must not be empty".to_string(),
                ));
            }
        }
        if self.allow_remote && self.max_remote_nodes == Some(0) {
            return Err(LoadBalancingError::Config(
                "allow_remote is set but max_remote_nodes is 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_document() {
        let config: LoadBalancingConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, LoadBalancingConfig::default());
        assert!(!config.allow_remote);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_full_document() {
        let config: LoadBalancingConfig = serde_json::from_str(
            r#"{"local_datacenter":"dc1","allow_remote":true,"max_remote_nodes":2}"#,
        )
        .unwrap();
        assert_eq!(config.local_datacenter.as_deref(), Some("dc1"));
        assert_eq!(config.max_remote_nodes, Some(2));
        assert!(!config.allow_remote_for_local_consistency);
    }

    #[test]
    fn test_validate_rejects_contradictions() {
        let empty_dc = LoadBalancingConfig::with_local_datacenter("  ");
        assert!(matches!(empty_dc.validate(), Err(LoadBalancingError::Config(_))));

        let zero_remote = LoadBalancingConfig {
            allow_remote: true,
            max_remote_nodes: Some(0),
            ..Default::default()
        };
        assert!(zero_remote.validate().is_err());
    }
}
