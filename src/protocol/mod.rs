//! Connection state and message types.
//!
//! This module defines the values that flow between the transport, the
//! client, and subscribers.
//!
//! # Message Flow
//!
//! | Type | Direction | Purpose |
//! |------|-----------|---------|
//! | [`OutgoingMessage`] | Client → Transport | Text, binary, or heartbeat ping |
//! | [`IncomingMessage`] | Transport → Subscribers | Inbound text or binary frame |
//! | [`CloseReason`] | Transport → Client | Why a socket closed |
//! | [`ConnectionState`] | Client → Subscribers | Connected / disconnected |
//!
//! The crate has no wire protocol of its own; framing is whatever the
//! underlying transport speaks.

// ============================================================================
// Submodules
// ============================================================================

/// Inbound and outbound message types.
pub mod message;

/// Connection state value.
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use message::{CloseReason, IncomingMessage, OutgoingMessage};
pub use state::ConnectionState;
