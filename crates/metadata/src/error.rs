//! Error types for the metadata crate.

use crate::node::HostId;
use thiserror::Error;

/// Result type alias for the metadata crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while mutating the node registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The node is not (or no longer) known to the registry.
    #[error("Unknown node: {0}")]
    UnknownNode(HostId),
}
