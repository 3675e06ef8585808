//! Reconnecting WebSocket client.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`WebSocketClient`] | Connection state machine with automatic reconnects |
//! | [`WebSocketClientBuilder`] | Fluent configuration |
//! | [`ReconnectPolicy`] | Timeouts, backoff, and heartbeat period |

// ============================================================================
// Submodules
// ============================================================================

/// Builder pattern for client configuration.
pub mod builder;

/// Core client implementation.
pub mod core;

/// Reconnection policy.
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::WebSocketClientBuilder;
pub use self::core::WebSocketClient;
pub use options::ReconnectPolicy;
