//! tokio-tungstenite transport adapter.
//!
//! Each `open` spawns a session task that performs the handshake and then
//! runs the socket event loop.
//!
//! # Event Loop
//!
//! The session task handles:
//!
//! - Outgoing frames and close requests from the client
//! - Incoming frames, forwarded to the handler in arrival order
//! - Close frames and socket errors, reported once as the final callback
//!
//! A session only reports its final callback if it is still the current
//! session when it ends. Replaced or abandoned sessions end silently.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tracing::{debug, trace, warn};
use url::Url;

use crate::error::TransportError;
use crate::protocol::{CloseReason, IncomingMessage, OutgoingMessage};

use super::{Transport, TransportHandler};

// ============================================================================
// Types
// ============================================================================

/// The current session, shared with session tasks.
type SessionSlot = Arc<Mutex<Option<Session>>>;

/// Internal commands for the session task.
enum SessionCommand {
    /// Write a frame.
    Send(Message),
    /// Perform the closing handshake.
    Close,
}

/// Handle to a session task.
struct Session {
    /// Session number, for logging and staleness checks.
    id: u64,
    /// Channel to the session task. Dropping it ends the session silently.
    command_tx: UnboundedSender<SessionCommand>,
    /// Handshake finished.
    open: bool,
}

/// How a session's event loop ended.
enum Outcome {
    /// Close handshake, local or remote.
    Closed(CloseReason),
    /// Socket error.
    Failed(TransportError),
    /// Replaced or dropped; report nothing.
    Abandoned,
}

// ============================================================================
// TungsteniteTransport
// ============================================================================

/// [`Transport`] over `tokio-tungstenite`.
///
/// Owns at most one socket. `wss://` URLs need the `native-tls` feature.
///
/// # Thread Safety
///
/// `TungsteniteTransport` is `Send + Sync`. All operations are
/// non-blocking; I/O happens on the session task.
pub struct TungsteniteTransport {
    /// Current session, if any.
    slot: SessionSlot,
    /// Next session number.
    next_id: AtomicU64,
}

impl TungsteniteTransport {
    /// Creates a transport with no socket.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
            next_id: AtomicU64::new(1),
        }
    }

    /// Returns `true` if the current socket finished its handshake.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.slot.lock().as_ref().is_some_and(|session| session.open)
    }
}

impl Default for TungsteniteTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TungsteniteTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let session = self.slot.lock().as_ref().map(|s| (s.id, s.open));
        f.debug_struct("TungsteniteTransport")
            .field("session", &session)
            .finish()
    }
}

impl Drop for TungsteniteTransport {
    fn drop(&mut self) {
        // Ends the session task silently.
        self.slot.lock().take();
    }
}

// ============================================================================
// Transport
// ============================================================================

impl Transport for TungsteniteTransport {
    fn open(&self, url: &Url, headers: &[(String, String)], handler: Arc<dyn TransportHandler>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let replaced = self.slot.lock().replace(Session {
            id,
            command_tx,
            open: false,
        });
        if let Some(previous) = replaced {
            debug!(session = previous.id, "Replacing previous session");
        }

        debug!(session = id, url = %url, "Opening WebSocket");

        let request = build_request(url, headers);
        tokio::spawn(run_session(
            id,
            request,
            command_rx,
            handler,
            Arc::clone(&self.slot),
        ));
    }

    fn close(&self) {
        let mut slot = self.slot.lock();
        match slot.as_ref() {
            Some(session) if session.open => {
                debug!(session = session.id, "Closing WebSocket");
                let _ = session.command_tx.send(SessionCommand::Close);
            }
            Some(session) => {
                debug!(session = session.id, "Abandoning WebSocket handshake");
                *slot = None;
            }
            None => {}
        }
    }

    fn send(&self, message: OutgoingMessage) -> bool {
        let slot = self.slot.lock();
        match slot.as_ref() {
            Some(session) if session.open => session
                .command_tx
                .send(SessionCommand::Send(to_ws_message(message)))
                .is_ok(),
            _ => false,
        }
    }
}

// ============================================================================
// Session Task
// ============================================================================

/// Runs one socket from handshake to close.
async fn run_session(
    id: u64,
    request: Result<Request, TransportError>,
    mut commands: UnboundedReceiver<SessionCommand>,
    handler: Arc<dyn TransportHandler>,
    slot: SessionSlot,
) {
    let request = match request {
        Ok(request) => request,
        Err(e) => {
            warn!(session = id, error = %e, "Invalid handshake request");
            if release(&slot, id) {
                handler.on_failure(e);
            }
            return;
        }
    };

    let stream = tokio::select! {
        result = connect_async(request) => match result {
            Ok((stream, _response)) => stream,
            Err(e) => {
                debug!(session = id, error = %e, "WebSocket handshake failed");
                if release(&slot, id) {
                    handler.on_failure(e.into());
                }
                return;
            }
        },
        None = commands.recv() => {
            debug!(session = id, "Session abandoned during handshake");
            return;
        }
    };

    if !mark_open(&slot, id) {
        debug!(session = id, "Session replaced during handshake");
        let mut stream = stream;
        let _ = stream.close(None).await;
        return;
    }

    debug!(session = id, "WebSocket connected");
    handler.on_open();

    let (mut ws_write, mut ws_read) = stream.split();

    let outcome = loop {
        tokio::select! {
            // Commands first, so a replaced session stops delivering.
            biased;

            command = commands.recv() => {
                match command {
                    Some(SessionCommand::Send(message)) => {
                        if let Err(e) = ws_write.send(message).await {
                            break Outcome::Failed(e.into());
                        }
                        trace!(session = id, "Frame sent");
                    }

                    Some(SessionCommand::Close) => {
                        let _ = ws_write.close().await;
                        break Outcome::Closed(CloseReason::local());
                    }

                    None => {
                        let _ = ws_write.close().await;
                        break Outcome::Abandoned;
                    }
                }
            }

            message = ws_read.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        handler.on_message(IncomingMessage::Text(text.as_str().to_owned()));
                    }

                    Some(Ok(Message::Binary(data))) => {
                        handler.on_message(IncomingMessage::Binary(data.to_vec()));
                    }

                    Some(Ok(Message::Close(frame))) => {
                        // Flushes the close reply queued by tungstenite.
                        let _ = ws_write.close().await;
                        break Outcome::Closed(close_reason(frame));
                    }

                    Some(Err(e)) => {
                        break Outcome::Failed(e.into());
                    }

                    None => {
                        break Outcome::Closed(CloseReason::new(None, "stream ended"));
                    }

                    // Ignore Ping, Pong, raw frames
                    Some(Ok(_)) => {}
                }
            }
        }
    };

    match outcome {
        Outcome::Closed(reason) => {
            debug!(session = id, %reason, "WebSocket closed");
            if release(&slot, id) {
                handler.on_close(reason);
            }
        }
        Outcome::Failed(error) => {
            warn!(session = id, error = %error, "WebSocket failed");
            if release(&slot, id) {
                handler.on_failure(error);
            }
        }
        Outcome::Abandoned => {
            debug!(session = id, "Session abandoned");
        }
    }
}

/// Marks the session open if it is still current.
fn mark_open(slot: &SessionSlot, id: u64) -> bool {
    match slot.lock().as_mut() {
        Some(session) if session.id == id => {
            session.open = true;
            true
        }
        _ => false,
    }
}

/// Clears the slot if it still holds this session.
///
/// Returns `true` if the session was current and may report.
fn release(slot: &SessionSlot, id: u64) -> bool {
    let mut slot = slot.lock();
    if slot.as_ref().is_some_and(|session| session.id == id) {
        *slot = None;
        return true;
    }
    false
}

// ============================================================================
// Conversions
// ============================================================================

/// Builds the handshake request with extra headers.
fn build_request(url: &Url, headers: &[(String, String)]) -> Result<Request, TransportError> {
    let mut request = url.as_str().into_client_request()?;

    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| TransportError::new(format!("Invalid header name {name:?}: {e}")))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|e| TransportError::new(format!("Invalid value for header {name}: {e}")))?;
        request.headers_mut().insert(header_name, header_value);
    }

    Ok(request)
}

/// Converts an outgoing message to a tungstenite frame.
fn to_ws_message(message: OutgoingMessage) -> Message {
    match message {
        OutgoingMessage::Text(text) => Message::Text(text.into()),
        OutgoingMessage::Binary(data) => Message::Binary(data.into()),
        OutgoingMessage::Ping => Message::Ping(Default::default()),
    }
}

/// Converts a received close frame to a close reason.
fn close_reason(frame: Option<CloseFrame>) -> CloseReason {
    match frame {
        Some(frame) => CloseReason::new(Some(u16::from(frame.code)), frame.reason.as_str()),
        None => CloseReason::new(None, ""),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use tokio::net::TcpListener;
    use tokio::sync::oneshot;
    use tokio::time::timeout;
    use tokio_tungstenite::tungstenite::handshake::server::{
        ErrorResponse, Request as ServerRequest, Response,
    };
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
    use tokio_tungstenite::{accept_async, accept_hdr_async};

    #[derive(Debug)]
    enum Event {
        Open,
        Close(CloseReason),
        Failure(TransportError),
        Message(IncomingMessage),
    }

    struct Recorder(UnboundedSender<Event>);

    impl TransportHandler for Recorder {
        fn on_open(&self) {
            let _ = self.0.send(Event::Open);
        }

        fn on_close(&self, reason: CloseReason) {
            let _ = self.0.send(Event::Close(reason));
        }

        fn on_failure(&self, error: TransportError) {
            let _ = self.0.send(Event::Failure(error));
        }

        fn on_message(&self, message: IncomingMessage) {
            let _ = self.0.send(Event::Message(message));
        }
    }

    fn recorder() -> (Arc<dyn TransportHandler>, UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Recorder(tx)), rx)
    }

    async fn next_event(rx: &mut UnboundedReceiver<Event>) -> Event {
        timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("event in time")
            .expect("recorder alive")
    }

    /// Echoes text and binary frames; closes with 4001 on "kick".
    async fn echo_server() -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let Ok(mut ws) = accept_async(stream).await else {
                        return;
                    };
                    while let Some(Ok(message)) = ws.next().await {
                        match message {
                            Message::Text(ref text) if text.as_str() == "kick" => {
                                let frame = CloseFrame {
                                    code: CloseCode::from(4001),
                                    reason: "kicked".into(),
                                };
                                let _ = ws.close(Some(frame)).await;
                                break;
                            }
                            Message::Text(_) | Message::Binary(_) => {
                                if ws.send(message).await.is_err() {
                                    break;
                                }
                            }
                            Message::Close(_) => break,
                            _ => {}
                        }
                    }
                });
            }
        });

        Url::parse(&format!("ws://127.0.0.1:{port}")).expect("url")
    }

    #[test]
    fn test_to_ws_message() {
        assert!(matches!(
            to_ws_message(OutgoingMessage::Text("hi".into())),
            Message::Text(_)
        ));
        assert!(matches!(
            to_ws_message(OutgoingMessage::Binary(vec![1])),
            Message::Binary(_)
        ));
        assert!(matches!(to_ws_message(OutgoingMessage::Ping), Message::Ping(_)));
    }

    #[test]
    fn test_build_request_applies_headers() {
        let url = Url::parse("ws://example.com/socket").expect("url");
        let headers = vec![
            ("Origin".to_string(), String::new()),
            ("X-Token".to_string(), "abc".to_string()),
        ];
        let request = build_request(&url, &headers).expect("request");
        assert_eq!(request.headers().get("origin").map(|v| v.as_bytes()), Some(&b""[..]));
        assert_eq!(request.headers().get("x-token").map(|v| v.as_bytes()), Some(&b"abc"[..]));
    }

    #[test]
    fn test_build_request_rejects_bad_header() {
        let url = Url::parse("ws://example.com").expect("url");
        let headers = vec![("bad header".to_string(), "x".to_string())];
        assert!(build_request(&url, &headers).is_err());
    }

    #[test]
    fn test_close_reason_from_frame() {
        assert_eq!(close_reason(None), CloseReason::new(None, ""));
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "bye".into(),
        };
        assert_eq!(close_reason(Some(frame)), CloseReason::new(Some(1000), "bye"));
    }

    #[tokio::test]
    async fn test_send_without_socket_is_rejected() {
        let transport = TungsteniteTransport::new();
        assert!(!transport.is_open());
        assert!(!transport.send(OutgoingMessage::Text("hi".into())));
        transport.close();
    }

    #[tokio::test]
    async fn test_open_echo_close() {
        let url = echo_server().await;
        let transport = TungsteniteTransport::new();
        let (handler, mut events) = recorder();

        transport.open(&url, &[], handler);
        assert!(matches!(next_event(&mut events).await, Event::Open));
        assert!(transport.is_open());

        assert!(transport.send(OutgoingMessage::Text("hello".into())));
        assert!(transport.send(OutgoingMessage::Binary(vec![1, 2, 3])));
        assert!(transport.send(OutgoingMessage::Ping));

        match next_event(&mut events).await {
            Event::Message(message) => assert_eq!(message, IncomingMessage::Text("hello".into())),
            other => panic!("unexpected event: {other:?}"),
        }
        match next_event(&mut events).await {
            Event::Message(message) => assert_eq!(message, IncomingMessage::Binary(vec![1, 2, 3])),
            other => panic!("unexpected event: {other:?}"),
        }

        transport.close();
        match next_event(&mut events).await {
            Event::Close(reason) => assert!(reason.is_normal()),
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(!transport.is_open());
    }

    #[tokio::test]
    async fn test_remote_close_reports_code() {
        let url = echo_server().await;
        let transport = TungsteniteTransport::new();
        let (handler, mut events) = recorder();

        transport.open(&url, &[], handler);
        assert!(matches!(next_event(&mut events).await, Event::Open));

        assert!(transport.send(OutgoingMessage::Text("kick".into())));
        match next_event(&mut events).await {
            Event::Close(reason) => {
                assert_eq!(reason.code, Some(4001));
                assert_eq!(reason.reason, "kicked");
                assert!(!reason.is_normal());
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_refused_connection_reports_failure() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
            listener.local_addr().expect("addr").port()
        };
        let url = Url::parse(&format!("ws://127.0.0.1:{port}")).expect("url");
        let transport = TungsteniteTransport::new();
        let (handler, mut events) = recorder();

        transport.open(&url, &[], handler);
        assert!(matches!(next_event(&mut events).await, Event::Failure(_)));
    }

    #[tokio::test]
    async fn test_handshake_sends_headers() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let (header_tx, header_rx) = oneshot::channel();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let callback =
                |request: &ServerRequest, response: Response| -> Result<Response, ErrorResponse> {
                    let token = request
                        .headers()
                        .get("x-token")
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_owned);
                    let _ = header_tx.send(token);
                    Ok(response)
                };
            let ws = accept_hdr_async(stream, callback).await;
            // Hold the socket until the test ends.
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(ws);
        });

        let url = Url::parse(&format!("ws://127.0.0.1:{port}")).expect("url");
        let transport = TungsteniteTransport::new();
        let (handler, mut events) = recorder();
        let headers = vec![("X-Token".to_string(), "secret".to_string())];

        transport.open(&url, &headers, handler);
        assert!(matches!(next_event(&mut events).await, Event::Open));

        let token = timeout(Duration::from_secs(5), header_rx)
            .await
            .expect("header in time")
            .expect("server alive");
        assert_eq!(token.as_deref(), Some("secret"));
    }

    #[tokio::test]
    async fn test_replaced_session_reports_nothing() {
        let url = echo_server().await;
        let transport = TungsteniteTransport::new();
        let (first, mut first_events) = recorder();
        let (second, mut second_events) = recorder();

        transport.open(&url, &[], first);
        transport.open(&url, &[], second);

        assert!(matches!(next_event(&mut second_events).await, Event::Open));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(first_events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_close_during_handshake_is_silent() {
        let url = echo_server().await;
        let transport = TungsteniteTransport::new();
        let (handler, mut events) = recorder();

        transport.open(&url, &[], handler);
        transport.close();

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(events.try_recv().is_err());
        assert!(!transport.is_open());
    }
}
