//! Inbound and outbound message types.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

// ============================================================================
// Constants
// ============================================================================

/// Close codes that count as a clean shutdown.
///
/// 1000 normal, 1001 going away, 1005 no status received.
const NORMAL_CLOSE_CODES: [u16; 3] = [1000, 1001, 1005];

// ============================================================================
// IncomingMessage
// ============================================================================

/// A frame received from the server.
///
/// Ownership moves to the subscriber on delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncomingMessage {
    /// Text frame.
    Text(String),
    /// Binary frame.
    Binary(Vec<u8>),
}

impl IncomingMessage {
    /// Returns the text payload, if this is a text frame.
    #[inline]
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Binary(_) => None,
        }
    }

    /// Returns the binary payload, if this is a binary frame.
    #[inline]
    #[must_use]
    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            Self::Text(_) => None,
            Self::Binary(data) => Some(data),
        }
    }

    /// Returns the payload length in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Binary(data) => data.len(),
        }
    }

    /// Returns `true` if the payload is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// OutgoingMessage
// ============================================================================

/// A frame handed to the transport for writing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutgoingMessage {
    /// Text frame.
    Text(String),
    /// Binary frame.
    Binary(Vec<u8>),
    /// Empty transport-level ping used as a heartbeat.
    Ping,
}

// ============================================================================
// CloseReason
// ============================================================================

/// Why a socket closed, as reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReason {
    /// WebSocket close code, if one was received.
    pub code: Option<u16>,
    /// Close reason text (may be empty).
    pub reason: String,
}

impl CloseReason {
    /// Creates a close reason.
    #[inline]
    pub fn new(code: Option<u16>, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// Close initiated by this side.
    #[inline]
    #[must_use]
    pub fn local() -> Self {
        Self::new(Some(1000), "closed by client")
    }

    /// Returns `true` for a clean shutdown.
    ///
    /// A missing code counts as clean.
    #[inline]
    #[must_use]
    pub fn is_normal(&self) -> bool {
        self.code
            .is_none_or(|code| NORMAL_CLOSE_CODES.contains(&code))
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{code} {}", self.reason),
            None => f.write_str(&self.reason),
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
    fn test_incoming_accessors() {
        let text = IncomingMessage::Text("hello".into());
        assert_eq!(text.as_text(), Some("hello"));
        assert_eq!(text.as_binary(), None);
        assert_eq!(text.len(), 5);

        let binary = IncomingMessage::Binary(vec![1, 2, 3]);
        assert_eq!(binary.as_binary(), Some(&[1u8, 2, 3][..]));
        assert_eq!(binary.as_text(), None);
        assert!(!binary.is_empty());
    }

    #[test]
    fn test_close_reason_normal_codes() {
        assert!(CloseReason::local().is_normal());
        assert!(CloseReason::new(Some(1001), "going away").is_normal());
        assert!(CloseReason::new(None, "stream ended").is_normal());
        assert!(!CloseReason::new(Some(1006), "abnormal").is_normal());
        assert!(!CloseReason::new(Some(4001), "kicked").is_normal());
    }

    #[test]
    fn test_close_reason_display() {
        assert_eq!(
            CloseReason::new(Some(1011), "internal").to_string(),
            "1011 internal"
        );
        assert_eq!(CloseReason::new(None, "eof").to_string(), "eof");
    }
}
