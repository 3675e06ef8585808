//! Network reachability.
//!
//! Answers "can this device reach the internet right now" and publishes a
//! live status stream. The WebSocket client only depends on the
//! [`Reachability`] trait, so any source can be injected.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ReachabilityMonitor`] | Probing monitor with explicit start/stop |
//! | [`ManualReachability`] | Status pushed by the embedder |
//! | [`ReachabilityStatus`] | `Connected(kind)`, `Offline`, or `Unknown` |
//! | [`NetworkInterfaces`] / [`ServerProbe`] | Pluggable evaluation sources |

// ============================================================================
// Submodules
// ============================================================================

/// Reachability driven by the embedder.
pub mod manual;

/// Probing reachability monitor.
pub mod monitor;

/// Interface inspection and server probes.
pub mod probe;

/// Status values.
pub mod status;

// ============================================================================
// Re-exports
// ============================================================================

pub use manual::ManualReachability;
pub use monitor::{ReachabilityConfig, ReachabilityMonitor};
pub use probe::{HttpProbe, InterfaceSnapshot, NetworkInterfaces, ServerProbe, SystemInterfaces};
pub use status::{ConnectionKind, ReachabilityStatus};

use crate::stream::Subscription;

// ============================================================================
// Reachability
// ============================================================================

/// A source of reachability status.
///
/// `status_changes` must replay the current status to new subscribers and
/// must not emit equal consecutive values.
pub trait Reachability: Send + Sync {
    /// Returns the last known status without blocking.
    fn status(&self) -> ReachabilityStatus;

    /// Subscribes to status changes, starting with the current status.
    fn status_changes(&self) -> Subscription<ReachabilityStatus>;

    /// Starts observation. Idempotent.
    fn start(&self);

    /// Stops observation, freezing the status. Idempotent.
    fn stop(&self);

    /// Returns `true` if the last known status is online.
    fn is_online(&self) -> bool {
        self.status().is_online()
    }
}
