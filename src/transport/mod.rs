//! WebSocket transport layer.
//!
//! The client never touches a socket directly. It drives a [`Transport`]
//! and receives callbacks through a [`TransportHandler`].
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐  open / close / send   ┌──────────────────┐
//! │                  │───────────────────────►│                  │
//! │ WebSocketClient  │                        │    Transport     │◄──► server
//! │                  │◄───────────────────────│  (session task)  │
//! └──────────────────┘  on_open / on_close    └──────────────────┘
//!                       on_failure / on_message
//! ```
//!
//! # Contract
//!
//! - `open`, `close`, and `send` never block and never call the handler
//!   synchronously; callbacks arrive later from the transport's own task.
//! - Callbacks for one socket arrive in order and stop after `on_close` or
//!   `on_failure`.
//! - A socket replaced by a newer `open`, or abandoned by `close` before it
//!   finished its handshake, reports nothing.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | tokio-tungstenite adapter |

// ============================================================================
// Submodules
// ============================================================================

/// tokio-tungstenite transport adapter.
pub mod connection;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::TungsteniteTransport;

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use url::Url;

use crate::error::TransportError;
use crate::protocol::{CloseReason, IncomingMessage, OutgoingMessage};

// ============================================================================
// Traits
// ============================================================================

/// Receives events from a [`Transport`].
pub trait TransportHandler: Send + Sync {
    /// The socket finished its handshake.
    fn on_open(&self);

    /// The socket closed.
    fn on_close(&self, reason: CloseReason);

    /// The socket failed to open or broke.
    fn on_failure(&self, error: TransportError);

    /// A frame arrived.
    fn on_message(&self, message: IncomingMessage);
}

/// A raw WebSocket transport owning at most one socket.
pub trait Transport: Send + Sync {
    /// Opens a socket to `url`, replacing any existing one.
    fn open(&self, url: &Url, headers: &[(String, String)], handler: Arc<dyn TransportHandler>);

    /// Closes the current socket.
    ///
    /// An open socket performs the closing handshake and reports
    /// `on_close`; a socket still handshaking is abandoned silently.
    fn close(&self);

    /// Queues a frame for writing.
    ///
    /// Returns `true` if an open socket accepted it.
    fn send(&self, message: OutgoingMessage) -> bool;
}
