//! Distance reporting.

use metadata::{HostId, NodeDistance};

/// Callback through which distance decisions reach the registry and the
/// observers.
///
/// The topology event processor owns the implementation. Reports are applied
/// in order with every other topology event; a report for a node that has
/// been removed in the meantime is logged and dropped.
pub trait DistanceReporter: Send + Sync {
    fn set_distance(&self, host_id: HostId, distance: NodeDistance);
}
