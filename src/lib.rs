//! Resilient WebSocket - auto-reconnecting WebSocket client.
//!
//! This library keeps one logical WebSocket connection alive across network
//! loss, server restarts, and flaky links.
//!
//! # Architecture
//!
//! - **Client**: connection state machine, backoff, heartbeat, streams
//! - **Transport**: raw socket capability (tokio-tungstenite by default)
//! - **Reachability**: process-wide "is the network usable" signal that
//!   gates reconnects
//!
//! Key design principles:
//!
//! - One socket per client; callbacks from replaced sockets are ignored
//! - Reconnects wait for the network first, then for the backoff delay
//! - A caller-requested disconnect suppresses reconnects until `connect()`
//! - State and messages are published as streams; no polling
//!
//! # Quick Start
//!
//! ```no_run
//! use resilient_ws::{ReachabilityMonitor, Result, WebSocketClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // Start the shared network monitor once per process
//!     ReachabilityMonitor::shared()?.start();
//!
//!     let client = WebSocketClient::new("wss://echo.example.com")?;
//!     let mut messages = client.incoming_messages();
//!
//!     client.connect().await?;
//!     client.send_text("ping")?;
//!
//!     if let Some(message) = messages.recv().await {
//!         println!("Received: {:?}", message.as_text());
//!     }
//!
//!     client.disconnect().await
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | [`WebSocketClient`], builder, and [`ReconnectPolicy`] |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`protocol`] | Message and connection state types |
//! | [`reachability`] | Network reachability sources |
//! | [`stream`] | Replaying and broadcasting value streams |
//! | [`transport`] | WebSocket transport layer |

// ============================================================================
// Modules
// ============================================================================

/// Reconnecting WebSocket client.
///
/// Use [`WebSocketClient::builder()`] to create a configured client.
pub mod client;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Message and connection state types.
pub mod protocol;

/// Network reachability.
///
/// The client depends only on the [`Reachability`] trait.
pub mod reachability;

/// Multi-subscriber value streams.
pub mod stream;

/// WebSocket transport layer.
///
/// Abstracts the socket behind [`Transport`] so it can be replaced in tests.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Client types
pub use client::{ReconnectPolicy, WebSocketClient, WebSocketClientBuilder};

// Error types
pub use error::{Error, Result, TransportError};

// Protocol types
pub use protocol::{CloseReason, ConnectionState, IncomingMessage, OutgoingMessage};

// Reachability types
pub use reachability::{
    ConnectionKind, ManualReachability, Reachability, ReachabilityConfig, ReachabilityMonitor,
    ReachabilityStatus,
};

// Stream types
pub use stream::Subscription;

// Transport types
pub use transport::{Transport, TransportHandler, TungsteniteTransport};
