//! Reachability driven by the embedder.

// ============================================================================
// Imports
// ============================================================================

use tracing::debug;

use crate::stream::{Replay, Subscription};

use super::Reachability;
use super::status::ReachabilityStatus;

// ============================================================================
// ManualReachability
// ============================================================================

/// A [`Reachability`] source whose status is pushed from outside.
///
/// Use it when the platform already delivers connectivity events (for
/// example a mobile host app) and the crate should not probe on its own.
/// `start` and `stop` are no-ops.
#[derive(Debug)]
pub struct ManualReachability {
    status: Replay<ReachabilityStatus>,
}

impl ManualReachability {
    /// Creates a source holding `initial`.
    #[must_use]
    pub fn new(initial: ReachabilityStatus) -> Self {
        Self {
            status: Replay::new(initial),
        }
    }

    /// Sets the current status.
    ///
    /// Subscribers are notified only if the status changed.
    pub fn set(&self, status: ReachabilityStatus) {
        if self.status.publish(status) {
            debug!(%status, "Reachability set");
        }
    }
}

impl Default for ManualReachability {
    fn default() -> Self {
        Self::new(ReachabilityStatus::Unknown)
    }
}

impl Reachability for ManualReachability {
    fn status(&self) -> ReachabilityStatus {
        self.status.get()
    }

    fn status_changes(&self) -> Subscription<ReachabilityStatus> {
        self.status.subscribe()
    }

    fn start(&self) {}

    fn stop(&self) {}
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::reachability::ConnectionKind;

    #[test]
    fn test_set_publishes_changes_only() {
        let reachability = ManualReachability::default();
        let mut changes = reachability.status_changes();

        reachability.set(ReachabilityStatus::Offline);
        reachability.set(ReachabilityStatus::Offline);
        reachability.set(ReachabilityStatus::Connected(ConnectionKind::Cellular));

        let seen: Vec<_> = std::iter::from_fn(|| changes.try_recv()).collect();
        assert_eq!(
            seen,
            vec![
                ReachabilityStatus::Unknown,
                ReachabilityStatus::Offline,
                ReachabilityStatus::Connected(ConnectionKind::Cellular),
            ]
        );
        assert!(reachability.is_online());
    }
}
