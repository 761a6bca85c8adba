//! Consistency levels, as far as routing cares about them.

use serde::{Deserialize, Serialize};

/// Consistency level requested by a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsistencyLevel {
    Any,
    One,
    Two,
    Three,
    Quorum,
    All,
    LocalOne,
    LocalQuorum,
    EachQuorum,
    Serial,
    LocalSerial,
}

impl ConsistencyLevel {
    /// Levels that only make sense against replicas of the local datacenter.
    pub fn is_dc_local(self) -> bool {
        matches!(
            self,
            ConsistencyLevel::LocalOne
                | ConsistencyLevel::LocalQuorum
                | ConsistencyLevel::LocalSerial
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dc_local_levels() {
        assert!(ConsistencyLevel::LocalOne.is_dc_local());
        assert!(ConsistencyLevel::LocalQuorum.is_dc_local());
        assert!(ConsistencyLevel::LocalSerial.is_dc_local());
        assert!(!ConsistencyLevel::Quorum.is_dc_local());
        assert!(!ConsistencyLevel::EachQuorum.is_dc_local());
    }
}
