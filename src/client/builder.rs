//! Builder pattern for client configuration.
//!
//! Provides a fluent API for configuring and creating [`WebSocketClient`]
//! instances.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use resilient_ws::WebSocketClient;
//!
//! # fn example() -> resilient_ws::Result<()> {
//! let client = WebSocketClient::builder("wss://example.com/socket")
//!     .connection_timeout(Duration::from_secs(5))
//!     .max_reconnect_delay(Duration::from_secs(30))
//!     .header("Authorization", "Bearer token")
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use url::Url;

use crate::error::{Error, Result};
use crate::reachability::{Reachability, ReachabilityMonitor};
use crate::transport::{Transport, TungsteniteTransport};

use super::core::WebSocketClient;
use super::options::ReconnectPolicy;

// ============================================================================
// WebSocketClientBuilder
// ============================================================================

/// Builder for configuring a [`WebSocketClient`].
///
/// Use [`WebSocketClient::builder()`] to create a new builder.
#[derive(Clone)]
pub struct WebSocketClientBuilder {
    /// Target URL, parsed on build.
    url: String,
    /// Timing policy.
    policy: ReconnectPolicy,
    /// Extra handshake headers.
    headers: Vec<(String, String)>,
    /// Transport override.
    transport: Option<Arc<dyn Transport>>,
    /// Reachability override.
    reachability: Option<Arc<dyn Reachability>>,
    /// Runtime for background tasks; defaults to the current one.
    runtime: Option<Handle>,
}

impl fmt::Debug for WebSocketClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebSocketClientBuilder")
            .field("url", &self.url)
            .field("policy", &self.policy)
            .field("headers", &self.headers)
            .field("custom_transport", &self.transport.is_some())
            .field("custom_reachability", &self.reachability.is_some())
            .field("custom_runtime", &self.runtime.is_some())
            .finish()
    }
}

// ============================================================================
// WebSocketClientBuilder Implementation
// ============================================================================

impl WebSocketClientBuilder {
    /// Creates a builder for `url` with default settings.
    #[inline]
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            policy: ReconnectPolicy::default(),
            headers: Vec::new(),
            transport: None,
            reachability: None,
            runtime: None,
        }
    }

    /// Sets the time `connect()` waits for the socket to open.
    #[inline]
    #[must_use]
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.policy.connection_timeout = timeout;
        self
    }

    /// Sets the delay before the first automatic reconnect.
    #[inline]
    #[must_use]
    pub fn min_reconnect_delay(mut self, delay: Duration) -> Self {
        self.policy.min_reconnect_delay = delay;
        self
    }

    /// Sets the ceiling for the reconnect delay.
    #[inline]
    #[must_use]
    pub fn max_reconnect_delay(mut self, delay: Duration) -> Self {
        self.policy.max_reconnect_delay = delay;
        self
    }

    /// Sets the heartbeat period.
    #[inline]
    #[must_use]
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.policy.heartbeat_interval = interval;
        self
    }

    /// Replaces the whole timing policy.
    #[inline]
    #[must_use]
    pub fn policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Adds a header sent with every handshake.
    #[inline]
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the `Origin` header.
    #[inline]
    #[must_use]
    pub fn origin(self, value: impl Into<String>) -> Self {
        self.header("Origin", value)
    }

    /// Uses a custom transport instead of [`TungsteniteTransport`].
    #[inline]
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Uses a custom reachability source instead of
    /// [`ReachabilityMonitor::shared`].
    #[inline]
    #[must_use]
    pub fn reachability(mut self, reachability: Arc<dyn Reachability>) -> Self {
        self.reachability = Some(reachability);
        self
    }

    /// Runs heartbeat and reconnect tasks on `runtime`.
    ///
    /// Needed when building outside a runtime context.
    #[inline]
    #[must_use]
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Builds the client with validation.
    ///
    /// The shared reachability monitor is not started here; call
    /// [`ReachabilityMonitor::start`] once per process, or the client will
    /// never reconnect on its own.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidUrl`] if the URL does not parse
    /// - [`Error::Config`] if the scheme is not `ws` or `wss`
    /// - [`Error::Config`] if the policy is inconsistent
    /// - [`Error::Config`] if no runtime was given and none is current
    /// - [`Error::Config`] if the shared monitor cannot be created
    pub fn build(self) -> Result<WebSocketClient> {
        let url = self.validate_url()?;
        self.policy.validate()?;
        let runtime = self.resolve_runtime()?;

        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(TungsteniteTransport::new()) as Arc<dyn Transport>);
        let reachability = match self.reachability {
            Some(reachability) => reachability,
            None => ReachabilityMonitor::shared()? as Arc<dyn Reachability>,
        };

        Ok(WebSocketClient::from_parts(
            url,
            self.headers,
            self.policy,
            transport,
            reachability,
            runtime,
        ))
    }
}

// ============================================================================
// Validation
// ============================================================================

impl WebSocketClientBuilder {
    /// Parses the URL and checks its scheme.
    fn validate_url(&self) -> Result<Url> {
        let url = Url::parse(&self.url)?;

        match url.scheme() {
            "ws" | "wss" => Ok(url),
            other => Err(Error::config(format!(
                "Unsupported URL scheme '{other}' in {}\n\
                 Use a ws:// or wss:// URL.",
                self.url
            ))),
        }
    }

    /// Returns the configured runtime or the current one.
    fn resolve_runtime(&self) -> Result<Handle> {
        if let Some(runtime) = &self.runtime {
            return Ok(runtime.clone());
        }

        Handle::try_current().map_err(|_| {
            Error::config(
                "No Tokio runtime for background tasks\n\
                 Build the client inside a runtime or pass one with .runtime().",
            )
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::reachability::ManualReachability;

    fn offline_builder(url: &str) -> WebSocketClientBuilder {
        WebSocketClientBuilder::new(url).reachability(Arc::new(ManualReachability::default()))
    }

    #[test]
    fn test_new_uses_default_policy() {
        let builder = WebSocketClientBuilder::new("ws://localhost");
        assert_eq!(builder.policy, ReconnectPolicy::default());
        assert!(builder.headers.is_empty());
        assert!(builder.transport.is_none());
        assert!(builder.reachability.is_none());
        assert!(builder.runtime.is_none());
    }

    #[test]
    fn test_setters_update_policy() {
        let builder = WebSocketClientBuilder::new("ws://localhost")
            .connection_timeout(Duration::from_secs(3))
            .min_reconnect_delay(Duration::from_millis(200))
            .max_reconnect_delay(Duration::from_secs(60))
            .heartbeat_interval(Duration::from_secs(30));

        assert_eq!(builder.policy.connection_timeout, Duration::from_secs(3));
        assert_eq!(builder.policy.min_reconnect_delay, Duration::from_millis(200));
        assert_eq!(builder.policy.max_reconnect_delay, Duration::from_secs(60));
        assert_eq!(builder.policy.heartbeat_interval, Duration::from_secs(30));
    }

    #[test]
    fn test_headers_accumulate_in_order() {
        let builder = WebSocketClientBuilder::new("ws://localhost")
            .header("X-Token", "abc")
            .origin("https://example.com");
        assert_eq!(
            builder.headers,
            vec![
                ("X-Token".to_string(), "abc".to_string()),
                ("Origin".to_string(), "https://example.com".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_build_accepts_ws_and_wss() {
        let client = offline_builder("ws://localhost:9000/feed").build().expect("ws");
        assert_eq!(client.url().as_str(), "ws://localhost:9000/feed");

        let client = offline_builder("wss://example.com").build().expect("wss");
        assert_eq!(client.url().scheme(), "wss");
    }

    #[tokio::test]
    async fn test_build_rejects_other_schemes() {
        let err = offline_builder("https://example.com").build().unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
        assert!(err.to_string().contains("https"));
    }

    #[tokio::test]
    async fn test_build_rejects_unparseable_url() {
        let err = offline_builder("not a url").build().unwrap_err();
        assert!(matches!(err, Error::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn test_build_rejects_inverted_delays() {
        let err = offline_builder("ws://localhost")
            .min_reconnect_delay(Duration::from_secs(10))
            .max_reconnect_delay(Duration::from_secs(1))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[tokio::test]
    async fn test_built_client_starts_disconnected() {
        let client = offline_builder("ws://localhost").build().expect("build");
        assert!(!client.is_connected());
        assert_eq!(client.reconnect_attempts(), 0);
        assert_eq!(client.policy(), &ReconnectPolicy::default());
    }

    #[test]
    fn test_build_outside_runtime_is_rejected() {
        let err = offline_builder("ws://localhost").build().unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
        assert!(err.to_string().contains("runtime"));
    }

    #[test]
    fn test_build_with_explicit_runtime() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("runtime");
        let client = offline_builder("ws://localhost")
            .runtime(runtime.handle().clone())
            .build()
            .expect("build");
        assert!(!client.is_connected());
    }

    #[test]
    fn test_builder_is_clone() {
        let builder = WebSocketClientBuilder::new("ws://localhost").header("A", "1");
        let cloned = builder.clone();
        assert_eq!(builder.headers, cloned.headers);
    }
}
