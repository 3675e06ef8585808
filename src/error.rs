//! Error types for the reconnecting WebSocket client.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use resilient_ws::{Result, WebSocketClient};
//!
//! async fn example(client: &WebSocketClient) -> Result<()> {
//!     client.connect().await?;
//!     client.send_text("hello")?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::InvalidUrl`] |
//! | Connection | [`Error::Timeout`], [`Error::NotConnected`], [`Error::ChannelClosed`] |
//! | Transport | [`Error::Transport`] |
//!
//! Transport failures observed on the socket never surface as a returned
//! error. They travel inside
//! [`ConnectionState::Disconnected`](crate::protocol::ConnectionState::Disconnected)
//! as a [`TransportError`].

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::result::Result as StdResult;
use std::sync::Arc;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;
use url::ParseError;

use crate::protocol::CloseReason;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// TransportError
// ============================================================================

/// Opaque error reported by the underlying transport.
///
/// Cheap to clone and comparable by message, so it can live inside
/// [`ConnectionState`](crate::protocol::ConnectionState) values that are
/// replayed to many subscribers.
#[derive(Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TransportError {
    message: Arc<str>,
}

impl TransportError {
    /// Creates a transport error from a message.
    #[inline]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Arc::from(message.into()),
        }
    }

    /// Creates a transport error for an abnormal close.
    pub fn closed(reason: &CloseReason) -> Self {
        match reason.code {
            Some(code) if reason.reason.is_empty() => {
                Self::new(format!("Connection closed with code {code}"))
            }
            Some(code) => Self::new(format!(
                "Connection closed with code {code}: {}",
                reason.reason
            )),
            None => Self::new(format!("Connection closed: {}", reason.reason)),
        }
    }

    /// Returns the error message.
    #[inline]
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Debug for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TransportError").field(&self.message).finish()
    }
}

impl From<WsError> for TransportError {
    fn from(err: WsError) -> Self {
        Self::new(err.to_string())
    }
}

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when client or monitor configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// The target URL could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] ParseError),

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Connect attempt exceeded the connection timeout.
    ///
    /// The underlying attempt keeps running; a late success is handled
    /// like a background reconnect.
    #[error("Connection timeout after {timeout_ms}ms")]
    Timeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Send attempted without a live socket.
    #[error("Not connected")]
    NotConnected,

    /// The client's state stream ended while waiting on it.
    ///
    /// Only happens when the client is torn down mid-wait.
    #[error("Channel closed")]
    ChannelClosed,

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// Error reported by the transport.
    ///
    /// The client never returns this variant. It lets callers `?` a
    /// [`TransportError`] taken from a
    /// [`ConnectionState`](crate::protocol::ConnectionState).
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn timeout(timeout_ms: u64) -> Self {
        Self::Timeout { timeout_ms }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::NotConnected | Self::ChannelClosed | Self::Transport(_)
        )
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors may succeed on retry.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::NotConnected | Self::Transport(_)
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::from(TransportError::new("connection refused"));
        assert_eq!(err.to_string(), "Transport error: connection refused");
    }

    #[test]
    fn test_config_error() {
        let err = Error::config("min delay exceeds max delay");
        assert_eq!(
            err.to_string(),
            "Configuration error: min delay exceeds max delay"
        );
    }

    #[test]
    fn test_timeout_display() {
        let err = Error::timeout(15_000);
        assert_eq!(err.to_string(), "Connection timeout after 15000ms");
    }

    #[test]
    fn test_is_timeout() {
        assert!(Error::timeout(1000).is_timeout());
        assert!(!Error::NotConnected.is_timeout());
    }

    #[test]
    fn test_is_connection_error() {
        assert!(Error::NotConnected.is_connection_error());
        assert!(Error::timeout(1000).is_connection_error());
        assert!(Error::ChannelClosed.is_connection_error());
        assert!(Error::from(TransportError::new("reset")).is_connection_error());
        assert!(!Error::config("test").is_connection_error());
    }

    #[test]
    fn test_is_recoverable() {
        assert!(Error::timeout(1000).is_recoverable());
        assert!(Error::NotConnected.is_recoverable());
        assert!(!Error::config("test").is_recoverable());
    }

    #[test]
    fn test_from_parse_error() {
        let parse_err = url::Url::parse("not a url").unwrap_err();
        let err: Error = parse_err.into();
        assert!(matches!(err, Error::InvalidUrl(_)));
    }

    #[test]
    fn test_transport_error_equality() {
        let a = TransportError::new("reset");
        let b = TransportError::new("reset");
        let c = TransportError::new("refused");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.clone().message(), "reset");
    }

    #[test]
    fn test_transport_error_propagates_from_state() {
        use crate::protocol::ConnectionState;

        fn check(state: &ConnectionState) -> Result<()> {
            if let Some(error) = state.error() {
                Err(error.clone())?;
            }
            Ok(())
        }

        let failed = ConnectionState::Disconnected(Some(TransportError::new("reset")));
        let err = check(&failed).unwrap_err();
        assert!(matches!(&err, Error::Transport(e) if e.message() == "reset"));
        assert!(err.is_recoverable());
        assert!(check(&ConnectionState::Connected).is_ok());

        let source = std::error::Error::source(&err).expect("source");
        assert_eq!(source.to_string(), "reset");
    }

    #[test]
    fn test_transport_error_from_close_reason() {
        let with_reason = CloseReason::new(Some(1011), "server restart");
        assert_eq!(
            TransportError::closed(&with_reason).message(),
            "Connection closed with code 1011: server restart"
        );

        let bare = CloseReason::new(Some(4000), "");
        assert_eq!(
            TransportError::closed(&bare).message(),
            "Connection closed with code 4000"
        );
    }

    #[test]
    fn test_transport_error_from_ws_error() {
        let err: TransportError = WsError::ConnectionClosed.into();
        assert!(!err.message().is_empty());
    }
}
