//! Per-request routing context.

use crate::consistency::ConsistencyLevel;

/// What the plan generator knows about the request being routed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    /// Consistency level of the statement, if the caller set one.
    pub consistency: Option<ConsistencyLevel>,
}

impl Request {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_consistency(consistency: ConsistencyLevel) -> Self {
        Self {
            consistency: Some(consistency),
        }
    }

    pub(crate) fn is_dc_local(&self) -> bool {
        self.consistency.map_or(false, ConsistencyLevel::is_dc_local)
    }
}
