//! Request trackers.
//!
//! Trackers are side-channel observers of request execution (latency
//! histograms, slow query logs, ...). The execution layer reports to a single
//! tracker; [`MultiplexingRequestTracker`] lets any number of them share that
//! slot.

use crate::isolate;
use crate::request::Request;
use arc_swap::ArcSwap;
use metadata::Node;
use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Observer of request outcomes. All methods default to no-ops.
///
/// `log_prefix` identifies the session (and request) in log lines.
pub trait RequestTracker: Send + Sync {
    /// The request succeeded.
    fn on_success(&self, _request: &Request, _latency: Duration, _node: &Node, _log_prefix: &str) {}

    /// The request failed; `node` is the last node tried, if any.
    fn on_error(
        &self,
        _request: &Request,
        _error: &(dyn StdError + 'static),
        _latency: Duration,
        _node: Option<&Node>,
        _log_prefix: &str,
    ) {
    }

    /// One attempt on one node succeeded.
    fn on_node_success(
        &self,
        _request: &Request,
        _latency: Duration,
        _node: &Node,
        _log_prefix: &str,
    ) {
    }

    /// One attempt on one node failed.
    fn on_node_error(
        &self,
        _request: &Request,
        _error: &(dyn StdError + 'static),
        _latency: Duration,
        _node: &Node,
        _log_prefix: &str,
    ) {
    }

    fn on_session_ready(&self, _session_name: &str) {}

    fn close(&self) {}

    /// Set by multiplexers so they can be flattened on registration.
    fn as_multiplexing(&self) -> Option<&MultiplexingRequestTracker> {
        None
    }
}

/// Combines multiple request trackers into a single one.
///
/// Any panic raised by a child tracker is caught and logged.
#[derive(Default)]
pub struct MultiplexingRequestTracker {
    trackers: ArcSwap<Vec<Arc<dyn RequestTracker>>>,
}

impl MultiplexingRequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_trackers(trackers: impl IntoIterator<Item = Arc<dyn RequestTracker>>) -> Self {
        let multiplexer = Self::new();
        for tracker in trackers {
            multiplexer.register(tracker);
        }
        multiplexer
    }

    /// Add a tracker, possibly after the session started.
    pub fn register(&self, tracker: Arc<dyn RequestTracker>) {
        if let Some(nested) = tracker.as_multiplexing() {
            for inner in nested.trackers.load().iter() {
                self.register(Arc::clone(inner));
            }
            return;
        }
        self.trackers.rcu(|current| {
            let mut next = Vec::clone(current);
            next.push(Arc::clone(&tracker));
            next
        });
    }

    pub fn len(&self) -> usize {
        self.trackers.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.trackers.load().is_empty()
    }

    fn invoke(&self, log_prefix: &str, event: &str, action: impl Fn(&dyn RequestTracker)) {
        for tracker in self.trackers.load().iter() {
            if let Err(panic) = isolate::catch(|| action(tracker.as_ref())) {
                warn!(
                    %log_prefix,
                    event,
                    error = %panic,
                    "Unexpected error while notifying request tracker"
                );
            }
        }
    }
}

impl RequestTracker for MultiplexingRequestTracker {
    fn on_success(&self, request: &Request, latency: Duration, node: &Node, log_prefix: &str) {
        self.invoke(log_prefix, "on_success", |t| {
            t.on_success(request, latency, node, log_prefix)
        });
    }

    fn on_error(
        &self,
        request: &Request,
        error: &(dyn StdError + 'static),
        latency: Duration,
        node: Option<&Node>,
        log_prefix: &str,
    ) {
        self.invoke(log_prefix, "on_error", |t| {
            t.on_error(request, error, latency, node, log_prefix)
        });
    }

    fn on_node_success(&self, request: &Request, latency: Duration, node: &Node, log_prefix: &str) {
        self.invoke(log_prefix, "on_node_success", |t| {
            t.on_node_success(request, latency, node, log_prefix)
        });
    }

    fn on_node_error(
        &self,
        request: &Request,
        error: &(dyn StdError + 'static),
        latency: Duration,
        node: &Node,
        log_prefix: &str,
    ) {
        self.invoke(log_prefix, "on_node_error", |t| {
            t.on_node_error(request, error, latency, node, log_prefix)
        });
    }

    fn on_session_ready(&self, session_name: &str) {
        self.invoke(session_name, "on_session_ready", |t| t.on_session_ready(session_name));
    }

    fn close(&self) {
        for tracker in self.trackers.load().iter() {
            if let Err(panic) = isolate::catch(|| tracker.close()) {
                warn!(error = %panic, "Unexpected error while closing request tracker");
            }
        }
    }

    fn as_multiplexing(&self) -> Option<&MultiplexingRequestTracker> {
        Some(self)
    }
}
