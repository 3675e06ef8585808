//! Reconnection policy.
//!
//! Controls connect timeouts, backoff between automatic reconnects, and
//! the heartbeat period.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use resilient_ws::ReconnectPolicy;
//!
//! let policy = ReconnectPolicy::new()
//!     .with_connection_timeout(Duration::from_secs(10))
//!     .with_reconnect_delays(Duration::from_millis(500), Duration::from_secs(30));
//!
//! assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(1500));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default time allowed for `connect()` to see the socket open.
const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(15);

/// Default delay before the first automatic reconnect.
const DEFAULT_MIN_RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Default ceiling for the reconnect delay.
const DEFAULT_MAX_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Default heartbeat period.
const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

// ============================================================================
// ReconnectPolicy
// ============================================================================

/// Timing policy for one client. Immutable once the client is built.
///
/// Serializes with durations as integer milliseconds:
///
/// ```json
/// { "connectionTimeoutMs": 15000, "minReconnectDelayMs": 1000,
///   "maxReconnectDelayMs": 5000, "heartbeatIntervalMs": 10000 }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    /// Time `connect()` waits for the socket to open.
    #[serde(rename = "connectionTimeoutMs", with = "duration_ms")]
    pub connection_timeout: Duration,

    /// Delay before the first reconnect; grows linearly per attempt.
    #[serde(rename = "minReconnectDelayMs", with = "duration_ms")]
    pub min_reconnect_delay: Duration,

    /// Ceiling for the reconnect delay.
    #[serde(rename = "maxReconnectDelayMs", with = "duration_ms")]
    pub max_reconnect_delay: Duration,

    /// Period of heartbeat pings while connected.
    #[serde(rename = "heartbeatIntervalMs", with = "duration_ms")]
    pub heartbeat_interval: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl ReconnectPolicy {
    /// Creates a policy with default settings.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
            min_reconnect_delay: DEFAULT_MIN_RECONNECT_DELAY,
            max_reconnect_delay: DEFAULT_MAX_RECONNECT_DELAY,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ReconnectPolicy {
    /// Sets the connect timeout.
    #[inline]
    #[must_use]
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Sets the minimum and maximum reconnect delays.
    #[inline]
    #[must_use]
    pub fn with_reconnect_delays(mut self, min: Duration, max: Duration) -> Self {
        self.min_reconnect_delay = min;
        self.max_reconnect_delay = max;
        self
    }

    /// Sets the heartbeat period.
    #[inline]
    #[must_use]
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }
}

// ============================================================================
// Backoff
// ============================================================================

impl ReconnectPolicy {
    /// Delay before reconnect attempt `attempt` (1-based).
    ///
    /// `min(min_reconnect_delay * attempt, max_reconnect_delay)`.
    #[inline]
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.min_reconnect_delay
            .saturating_mul(attempt)
            .min(self.max_reconnect_delay)
    }

    /// Checks the policy invariants.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if the minimum delay exceeds the maximum, or the
    /// connection timeout or heartbeat interval is zero.
    pub fn validate(&self) -> Result<()> {
        if self.min_reconnect_delay > self.max_reconnect_delay {
            return Err(Error::config(format!(
                "min_reconnect_delay ({}ms) exceeds max_reconnect_delay ({}ms)",
                self.min_reconnect_delay.as_millis(),
                self.max_reconnect_delay.as_millis()
            )));
        }

        if self.connection_timeout.is_zero() {
            return Err(Error::config("connection_timeout must be greater than zero"));
        }

        if self.heartbeat_interval.is_zero() {
            return Err(Error::config("heartbeat_interval must be greater than zero"));
        }

        Ok(())
    }
}

// ============================================================================
// Serde Helpers
// ============================================================================

/// (De)serializes a `Duration` as integer milliseconds.
mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

// ============================================================================
// Tests
// ============================================================================
