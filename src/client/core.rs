//! Reconnecting WebSocket client.
//!
//! The [`WebSocketClient`] keeps at most one logical connection to a URL
//! and reconnects on its own unless the caller asked to disconnect.
//!
//! # State Machine
//!
//! ```text
//!                connect()                 on_open
//! Disconnected ───────────► (connecting) ───────────► Connected
//!      ▲                                                  │
//!      └──────────── disconnect() / on_close / on_failure ┘
//! ```
//!
//! # Reconnection
//!
//! After a disconnect that was not requested by the caller, the client
//! waits for the reachability source to report online, then sleeps
//! `min(min_reconnect_delay * attempt, max_reconnect_delay)` before opening
//! again. `connect()`, `disconnect()`, and destruction cancel a pending
//! reconnect.
//!
//! # Example
//!
//! ```no_run
//! use resilient_ws::{ReachabilityMonitor, WebSocketClient};
//!
//! # async fn example() -> resilient_ws::Result<()> {
//! ReachabilityMonitor::shared()?.start();
//!
//! let client = WebSocketClient::builder("wss://example.com/socket").build()?;
//! let mut incoming = client.incoming_messages();
//!
//! client.connect().await?;
//! client.send_text("hello")?;
//!
//! if let Some(message) = incoming.recv().await {
//!     println!("{message:?}");
//! }
//!
//! client.disconnect().await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, timeout};
use tracing::{debug, info, trace, warn};
use url::Url;
use uuid::Uuid;

use crate::error::{Error, Result, TransportError};
use crate::protocol::{CloseReason, ConnectionState, IncomingMessage, OutgoingMessage};
use crate::reachability::Reachability;
use crate::stream::{Broadcast, Replay, Subscription};
use crate::transport::{Transport, TransportHandler};

use super::builder::WebSocketClientBuilder;
use super::options::ReconnectPolicy;

// ============================================================================
// Types
// ============================================================================

/// Fields mutated from more than one context. Only touched under the guard.
#[derive(Debug, Default)]
struct GuardedState {
    /// The caller asked to disconnect; suppresses reconnects.
    is_manual_close: bool,
    /// A socket is open.
    is_connected: bool,
    /// Automatic reconnects since the last successful open.
    reconnect_attempts: u32,
}

/// A scheduled reconnect task.
struct PendingReconnect {
    /// Identifies the schedule that spawned the task.
    generation: u64,
    handle: JoinHandle<()>,
}

/// Reconnect bookkeeping.
#[derive(Default)]
struct ReconnectSlot {
    next_generation: u64,
    pending: Option<PendingReconnect>,
}

/// Internal shared state for a client.
pub(crate) struct ClientInner {
    /// Identifier used in log fields.
    id: Uuid,
    /// Target URL.
    url: Url,
    /// Extra handshake headers.
    headers: Vec<(String, String)>,
    /// Timing policy.
    policy: ReconnectPolicy,
    /// Raw socket capability.
    transport: Arc<dyn Transport>,
    /// Reachability source gating reconnects.
    reachability: Arc<dyn Reachability>,
    /// Callback adapter handed to the transport.
    handler: Arc<dyn TransportHandler>,
    /// Runtime for heartbeat and reconnect tasks.
    runtime: Handle,
    /// Weak self-reference for spawned tasks.
    this: Weak<ClientInner>,
    /// Flags shared between callers and callbacks.
    guarded: Mutex<GuardedState>,
    /// Connection state stream.
    states: Replay<ConnectionState>,
    /// Inbound message stream.
    incoming: Broadcast<IncomingMessage>,
    /// Heartbeat task while connected.
    heartbeat: Mutex<Option<JoinHandle<()>>>,
    /// Pending backoff reconnect.
    reconnect: Mutex<ReconnectSlot>,
    /// Set once by `destroy`; silences callbacks.
    destroyed: AtomicBool,
    /// Wakes `connect()` callers when the client is destroyed.
    destroyed_signal: Notify,
}

// ============================================================================
// WebSocketClient
// ============================================================================

/// A WebSocket client that reconnects automatically.
///
/// Dropping the client (or calling [`destroy`](Self::destroy)) stops the
/// heartbeat, cancels any pending reconnect, and closes the socket.
///
/// # Runtime
///
/// Background tasks run on the Tokio runtime captured at build time, so
/// transport callbacks may arrive from any thread.
///
/// # Thread Safety
///
/// `WebSocketClient` is `Send + Sync`; every operation may be called
/// concurrently from any task.
pub struct WebSocketClient {
    /// Shared inner state.
    pub(crate) inner: Arc<ClientInner>,
}

// ============================================================================
// WebSocketClient - Display
// ============================================================================

impl fmt::Debug for WebSocketClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebSocketClient")
            .field("id", &self.inner.id)
            .field("url", &self.inner.url.as_str())
            .field("state", &self.connection_state())
            .field("reconnect_attempts", &self.reconnect_attempts())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// WebSocketClient - Constructor
// ============================================================================

impl WebSocketClient {
    /// Creates a configuration builder for a client targeting `url`.
    #[inline]
    #[must_use]
    pub fn builder(url: impl Into<String>) -> WebSocketClientBuilder {
        WebSocketClientBuilder::new(url)
    }

    /// Creates a client with default settings.
    ///
    /// # Errors
    ///
    /// See [`WebSocketClientBuilder::build`].
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Self::builder(url).build()
    }

    /// Assembles a client from validated parts.
    pub(crate) fn from_parts(
        url: Url,
        headers: Vec<(String, String)>,
        policy: ReconnectPolicy,
        transport: Arc<dyn Transport>,
        reachability: Arc<dyn Reachability>,
        runtime: Handle,
    ) -> Self {
        let inner = Arc::new_cyclic(|this: &Weak<ClientInner>| ClientInner {
            id: Uuid::new_v4(),
            url,
            headers,
            policy,
            transport,
            reachability,
            handler: Arc::new(CallbackBridge {
                client: this.clone(),
            }),
            runtime,
            this: this.clone(),
            guarded: Mutex::new(GuardedState::default()),
            states: Replay::new(ConnectionState::Disconnected(None)),
            incoming: Broadcast::new(),
            heartbeat: Mutex::new(None),
            reconnect: Mutex::new(ReconnectSlot::default()),
            destroyed: AtomicBool::new(false),
            destroyed_signal: Notify::new(),
        });

        debug!(client = %inner.id, url = %inner.url, "Client created");

        Self { inner }
    }
}

// ============================================================================
// WebSocketClient - Accessors
// ============================================================================

impl WebSocketClient {
    /// Returns the client identifier used in logs.
    #[inline]
    #[must_use]
    pub fn id(&self) -> &Uuid {
        &self.inner.id
    }

    /// Returns the target URL.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.inner.url
    }

    /// Returns the timing policy.
    #[inline]
    #[must_use]
    pub fn policy(&self) -> &ReconnectPolicy {
        &self.inner.policy
    }

    /// Returns the last published connection state.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.inner.states.get()
    }

    /// Returns `true` if a socket is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.guarded.lock().is_connected
    }

    /// Returns the number of reconnects since the last successful open.
    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.guarded.lock().reconnect_attempts
    }

    /// Subscribes to connection state changes, starting with the current
    /// state.
    pub fn connection_states(&self) -> Subscription<ConnectionState> {
        self.inner.states.subscribe()
    }

    /// Subscribes to inbound frames.
    pub fn incoming_messages(&self) -> Subscription<IncomingMessage> {
        self.inner.incoming.subscribe()
    }
}

// ============================================================================
// WebSocketClient - Lifecycle
// ============================================================================

impl WebSocketClient {
    /// Connects, resolving once the socket is open.
    ///
    /// Succeeds immediately if already connected. Otherwise re-enables
    /// automatic reconnects and resets the attempt counter.
    ///
    /// # Errors
    ///
    /// - [`Error::Timeout`] if the socket does not open within the
    ///   connection timeout. The attempt keeps running; a late open is
    ///   treated like a background reconnect.
    /// - [`Error::ChannelClosed`] if the client is destroyed, before or
    ///   during the wait.
    pub async fn connect(&self) -> Result<()> {
        let inner = &self.inner;

        // Registered before the check so a concurrent destroy cannot be missed.
        let destroyed = inner.destroyed_signal.notified();
        tokio::pin!(destroyed);
        destroyed.as_mut().enable();
        if inner.is_destroyed() {
            return Err(Error::ChannelClosed);
        }

        let mut states = {
            let mut guarded = inner.guarded.lock();
            guarded.is_manual_close = false;

            if guarded.is_connected {
                trace!(client = %inner.id, "Already connected");
                return Ok(());
            }

            guarded.reconnect_attempts = 0;
            inner.cancel_pending_reconnect();

            // Subscribe before opening so the transition cannot be missed.
            let states = inner.states.subscribe();
            info!(client = %inner.id, url = %inner.url, "Connecting");
            inner.open_socket();
            states
        };

        let opened = async {
            tokio::select! {
                biased;
                result = wait_for(&mut states, true) => result,
                () = &mut destroyed => Err(Error::ChannelClosed),
            }
        };

        let connection_timeout = inner.policy.connection_timeout;
        match timeout(connection_timeout, opened).await {
            Ok(result) => result,
            Err(_) => {
                let timeout_ms = u64::try_from(connection_timeout.as_millis()).unwrap_or(u64::MAX);
                warn!(client = %inner.id, timeout_ms, "Connect timed out");
                Err(Error::timeout(timeout_ms))
            }
        }
    }

    /// Disconnects, resolving once the socket is closed.
    ///
    /// Disables automatic reconnects until the next [`connect`](Self::connect)
    /// and cancels a pending one. Succeeds immediately if not connected.
    /// Destroying the client mid-wait also counts as closed.
    ///
    /// # Errors
    ///
    /// [`Error::ChannelClosed`] if the state stream ends mid-wait.
    pub async fn disconnect(&self) -> Result<()> {
        let inner = &self.inner;

        let mut states = {
            let mut guarded = inner.guarded.lock();
            guarded.is_manual_close = true;
            inner.cancel_pending_reconnect();

            // Also abandons a handshake still in flight.
            inner.transport.close();

            if !guarded.is_connected {
                debug!(client = %inner.id, "Disconnect while not connected");
                return Ok(());
            }

            info!(client = %inner.id, "Disconnecting");
            inner.states.subscribe()
        };

        wait_for(&mut states, false).await
    }

    /// Tears the client down.
    ///
    /// Stops the heartbeat, cancels any pending reconnect, and closes the
    /// socket. An open client publishes a final `Disconnected(None)`;
    /// nothing is published after that. Also runs on drop.
    pub fn destroy(&self) {
        self.inner.shutdown();
    }
}

// ============================================================================
// WebSocketClient - Messaging
// ============================================================================

impl WebSocketClient {
    /// Sends a text frame.
    ///
    /// Resolves once the transport accepted the write; delivery is not
    /// acknowledged.
    ///
    /// # Errors
    ///
    /// [`Error::NotConnected`] if no socket is open.
    pub fn send_text(&self, text: impl Into<String>) -> Result<()> {
        self.send(OutgoingMessage::Text(text.into()))
    }

    /// Sends a binary frame.
    ///
    /// # Errors
    ///
    /// [`Error::NotConnected`] if no socket is open.
    pub fn send_binary(&self, data: impl Into<Vec<u8>>) -> Result<()> {
        self.send(OutgoingMessage::Binary(data.into()))
    }

    fn send(&self, message: OutgoingMessage) -> Result<()> {
        if !self.inner.guarded.lock().is_connected {
            return Err(Error::NotConnected);
        }

        if self.inner.transport.send(message) {
            Ok(())
        } else {
            debug!(client = %self.inner.id, "Transport refused write");
            Err(Error::NotConnected)
        }
    }
}

impl Drop for WebSocketClient {
    fn drop(&mut self) {
        self.inner.shutdown();
    }
}

/// Waits until the state stream reports the wanted connectedness.
async fn wait_for(states: &mut Subscription<ConnectionState>, connected: bool) -> Result<()> {
    while let Some(state) = states.recv().await {
        if state.is_connected() == connected {
            return Ok(());
        }
    }
    Err(Error::ChannelClosed)
}

// ============================================================================
// ClientInner - Transport Events
// ============================================================================

impl ClientInner {
    /// Handles a socket open.
    fn handle_open(&self) {
        let mut guarded = self.guarded.lock();
        if self.is_destroyed() {
            return;
        }
        guarded.is_connected = true;
        guarded.reconnect_attempts = 0;
        self.states.publish(ConnectionState::Connected);
        self.start_heartbeat();

        info!(client = %self.id, "Connected");

        if guarded.is_manual_close {
            debug!(client = %self.id, "Socket opened after disconnect request, closing");
            self.transport.close();
        }
    }

    /// Handles a socket close or failure.
    fn handle_disconnect(&self, error: Option<TransportError>) {
        self.stop_heartbeat();

        let (was_manual_close, attempt, delay) = {
            let mut guarded = self.guarded.lock();
            if self.is_destroyed() {
                return;
            }
            guarded.reconnect_attempts = guarded.reconnect_attempts.saturating_add(1);
            guarded.is_connected = false;
            self.states.publish(ConnectionState::Disconnected(error.clone()));
            (
                guarded.is_manual_close,
                guarded.reconnect_attempts,
                self.policy.delay_for_attempt(guarded.reconnect_attempts),
            )
        };

        match &error {
            Some(e) => info!(client = %self.id, error = %e, "Disconnected"),
            None => info!(client = %self.id, "Disconnected"),
        }

        if was_manual_close {
            return;
        }

        self.schedule_reconnect(attempt, delay);
    }

    /// Handles an inbound frame.
    fn handle_message(&self, message: IncomingMessage) {
        trace!(client = %self.id, len = message.len(), "Message received");
        self.incoming.publish(message);
    }
}

// ============================================================================
// ClientInner - Reconnection
// ============================================================================

impl ClientInner {
    /// Spawns the reachability-gated backoff reconnect.
    fn schedule_reconnect(&self, attempt: u32, delay: Duration) {
        let client = self.this.clone();
        let mut changes = self.reachability.status_changes();

        // Held across the spawn so the task cannot run ahead of its slot entry.
        let mut slot = self.reconnect.lock();
        if self.is_destroyed() {
            return;
        }
        slot.next_generation += 1;
        let generation = slot.next_generation;

        let handle = self.runtime.spawn(async move {
            // Reachability first, then the backoff delay.
            loop {
                match changes.recv().await {
                    Some(status) if status.is_online() => break,
                    Some(status) => trace!(%status, "Waiting for network"),
                    None => return,
                }
            }

            sleep(delay).await;

            if let Some(inner) = client.upgrade() {
                inner.attempt_reconnect(generation);
            }
        });

        if let Some(previous) = slot.pending.replace(PendingReconnect { generation, handle }) {
            previous.handle.abort();
        }

        debug!(
            client = %self.id,
            attempt,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            online = self.reachability.is_online(),
            "Reconnect scheduled"
        );
    }

    /// Runs a scheduled reconnect unless it was cancelled or superseded.
    fn attempt_reconnect(&self, generation: u64) {
        {
            let mut slot = self.reconnect.lock();
            if slot.pending.as_ref().map(|p| p.generation) != Some(generation) {
                return;
            }
            // Detach our own handle.
            slot.pending = None;
        }

        if self.destroyed.load(Ordering::SeqCst) {
            return;
        }

        let guarded = self.guarded.lock();
        if guarded.is_manual_close {
            debug!(client = %self.id, "Disconnected during backoff, closing");
            self.transport.close();
        } else if guarded.is_connected {
            trace!(client = %self.id, "Already reconnected");
        } else {
            info!(client = %self.id, attempt = guarded.reconnect_attempts, "Reconnecting");
            self.open_socket();
        }
    }

    /// Aborts a pending reconnect, if any.
    fn cancel_pending_reconnect(&self) {
        if let Some(pending) = self.reconnect.lock().pending.take() {
            pending.handle.abort();
            debug!(client = %self.id, "Pending reconnect cancelled");
        }
    }

    /// Asks the transport to open.
    fn open_socket(&self) {
        self.transport
            .open(&self.url, &self.headers, Arc::clone(&self.handler));
    }
}

// ============================================================================
// ClientInner - Heartbeat
// ============================================================================

impl ClientInner {
    /// Starts pinging every heartbeat interval, first ping immediately.
    fn start_heartbeat(&self) {
        let transport = Arc::clone(&self.transport);
        let period = self.policy.heartbeat_interval;
        let client = self.id;

        let handle = self.runtime.spawn(async move {
            let mut ticker = interval(period);
            loop {
                ticker.tick().await;
                if transport.send(OutgoingMessage::Ping) {
                    trace!(client = %client, "Heartbeat sent");
                } else {
                    debug!(client = %client, "Heartbeat refused");
                }
            }
        });

        if let Some(previous) = self.heartbeat.lock().replace(handle) {
            previous.abort();
        }
    }

    /// Stops the heartbeat, if running.
    fn stop_heartbeat(&self) {
        if let Some(handle) = self.heartbeat.lock().take() {
            handle.abort();
        }
    }
}

// ============================================================================
// ClientInner - Teardown
// ============================================================================

impl ClientInner {
    fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Stops everything. Idempotent.
    fn shutdown(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }

        {
            let mut guarded = self.guarded.lock();
            guarded.is_manual_close = true;
            if guarded.is_connected {
                guarded.is_connected = false;
                self.states.publish(ConnectionState::Disconnected(None));
            }
        }

        self.cancel_pending_reconnect();
        self.stop_heartbeat();
        self.transport.close();
        self.destroyed_signal.notify_waiters();

        info!(client = %self.id, "Client destroyed");
    }
}

// ============================================================================
// CallbackBridge
// ============================================================================

/// Routes transport callbacks to a live client.
///
/// Holds the client weakly so the transport never keeps it alive.
struct CallbackBridge {
    client: Weak<ClientInner>,
}

impl CallbackBridge {
    fn with_client(&self, f: impl FnOnce(&ClientInner)) {
        if let Some(inner) = self.client.upgrade()
            && !inner.is_destroyed()
        {
            f(&inner);
        }
    }
}

impl TransportHandler for CallbackBridge {
    fn on_open(&self) {
        self.with_client(ClientInner::handle_open);
    }

    fn on_close(&self, reason: CloseReason) {
        let error = (!reason.is_normal()).then(|| TransportError::closed(&reason));
        self.with_client(|inner| inner.handle_disconnect(error));
    }

    fn on_failure(&self, error: TransportError) {
        self.with_client(|inner| inner.handle_disconnect(Some(error)));
    }

    fn on_message(&self, message: IncomingMessage) {
        self.with_client(|inner| inner.handle_message(message));
    }
}

// ============================================================================
// Tests
// ============================================================================
