//! Connection state value.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use crate::error::TransportError;

// ============================================================================
// ConnectionState
// ============================================================================

/// Connection state published by the client.
///
/// Equality compares the wrapped error, so two disconnects caused by the
/// same failure are equal and the state stream reports only one of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// No live socket. Carries the transport error that caused the
    /// disconnect, if any.
    Disconnected(Option<TransportError>),
    /// A socket is open.
    Connected,
}

impl ConnectionState {
    /// Returns `true` if a socket is open.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Returns the error behind a disconnect, if any.
    #[inline]
    #[must_use]
    pub fn error(&self) -> Option<&TransportError> {
        match self {
            Self::Disconnected(error) => error.as_ref(),
            Self::Connected => None,
        }
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::Disconnected(None)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected => f.write_str("connected"),
            Self::Disconnected(None) => f.write_str("disconnected"),
            Self::Disconnected(Some(error)) => write!(f, "disconnected ({error})"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
