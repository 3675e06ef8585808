//! Reachability status values.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// ConnectionKind
// ============================================================================

/// Network path the device is using.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionKind {
    /// Connected over wifi.
    Wifi,
    /// Connected over a cellular link.
    Cellular,
    /// Connection type could not be determined.
    Unknown,
}

impl fmt::Display for ConnectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Wifi => "wifi",
            Self::Cellular => "cellular",
            Self::Unknown => "unknown",
        })
    }
}

// ============================================================================
// ReachabilityStatus
// ============================================================================

/// Whether the device can currently reach the internet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(tag = "status", content = "kind", rename_all = "lowercase")]
pub enum ReachabilityStatus {
    /// Online over the given kind of network.
    Connected(ConnectionKind),
    /// No usable network path.
    Offline,
    /// Not yet determined, or the cause of an outage is unknown.
    #[default]
    Unknown,
}

impl ReachabilityStatus {
    /// Returns `true` if the network is usable.
    #[inline]
    #[must_use]
    pub fn is_online(&self) -> bool {
        matches!(self, Self::Connected(_))
    }

    /// Returns the connection kind when online.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> Option<ConnectionKind> {
        match self {
            Self::Connected(kind) => Some(*kind),
            Self::Offline | Self::Unknown => None,
        }
    }
}

impl fmt::Display for ReachabilityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected(kind) => write!(f, "online ({kind})"),
            Self::Offline => f.write_str("offline"),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_online() {
        assert!(ReachabilityStatus::Connected(ConnectionKind::Wifi).is_online());
        assert!(ReachabilityStatus::Connected(ConnectionKind::Unknown).is_online());
        assert!(!ReachabilityStatus::Offline.is_online());
        assert!(!ReachabilityStatus::Unknown.is_online());
    }

    #[test]
    fn test_default_is_unknown() {
        assert_eq!(ReachabilityStatus::default(), ReachabilityStatus::Unknown);
    }

    #[test]
    fn test_kind() {
        assert_eq!(
            ReachabilityStatus::Connected(ConnectionKind::Cellular).kind(),
            Some(ConnectionKind::Cellular)
        );
        assert_eq!(ReachabilityStatus::Offline.kind(), None);
    }

    #[test]
    fn test_serde_shape() {
        let json = serde_json::to_string(&ReachabilityStatus::Connected(ConnectionKind::Wifi))
            .expect("serialize");
        assert_eq!(json, r#"{"status":"connected","kind":"wifi"}"#);

        let offline: ReachabilityStatus =
            serde_json::from_str(r#"{"status":"offline"}"#).expect("deserialize");
        assert_eq!(offline, ReachabilityStatus::Offline);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            ReachabilityStatus::Connected(ConnectionKind::Wifi).to_string(),
            "online (wifi)"
        );
        assert_eq!(ReachabilityStatus::Offline.to_string(), "offline");
    }
}
