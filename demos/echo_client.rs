//! Echo client with automatic reconnection.
//!
//! Demonstrates:
//! - Starting the shared reachability monitor
//! - Building a client with a custom backoff
//! - Watching connection states and incoming messages
//! - Sending a message every few seconds while connected
//!
//! Usage:
//!   cargo run --example echo_client -- ws://127.0.0.1:9001
//!   cargo run --example echo_client -- wss://echo.example.com --debug

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use anyhow::Context;
use resilient_ws::{ConnectionState, ReachabilityMonitor, WebSocketClient};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Constants
// ============================================================================

const DEFAULT_URL: &str = "ws://127.0.0.1:9001";
const SEND_INTERVAL: Duration = Duration::from_secs(3);

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let debug = args.iter().any(|a| a == "--debug");
    let url = args
        .iter()
        .find(|a| !a.starts_with("--"))
        .map_or(DEFAULT_URL, String::as_str);

    init_logging(debug);

    println!("=== Echo Client ===\n");

    let monitor = ReachabilityMonitor::shared().context("reachability monitor")?;
    monitor.start();

    let client = WebSocketClient::builder(url)
        .min_reconnect_delay(Duration::from_millis(500))
        .max_reconnect_delay(Duration::from_secs(10))
        .build()
        .context("invalid client configuration")?;

    let mut states = client.connection_states();
    let mut messages = client.incoming_messages();
    let mut network = monitor.status_changes();

    println!("[Connect] {url}");
    if let Err(e) = client.connect().await {
        // Keeps retrying in the background.
        println!("          ✗ {e}");
    }

    let mut ticker = tokio::time::interval(SEND_INTERVAL);
    let mut counter = 0u64;

    loop {
        tokio::select! {
            Some(state) = states.recv() => match state {
                ConnectionState::Connected => println!("[State]   connected"),
                ConnectionState::Disconnected(Some(e)) => println!("[State]   disconnected: {e}"),
                ConnectionState::Disconnected(None) => println!("[State]   disconnected"),
            },
            Some(status) = network.recv() => println!("[Network] {status}"),
            Some(message) = messages.recv() => match message.as_text() {
                Some(text) => println!("[Recv]    {text}"),
                None => println!("[Recv]    {} bytes", message.len()),
            },
            _ = ticker.tick() => {
                if client.is_connected() {
                    counter += 1;
                    if let Err(e) = client.send_text(format!("hello #{counter}")) {
                        println!("[Send]    ✗ {e}");
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    println!("\n[Shutdown] Disconnecting...");
    client.disconnect().await?;
    monitor.stop();
    println!("           ✓ Done");

    Ok(())
}

// ============================================================================
// Functions
// ============================================================================

/// Initialize logging; `RUST_LOG` overrides the default level.
fn init_logging(debug: bool) {
    let default = if debug {
        "resilient_ws=debug"
    } else {
        "resilient_ws=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .init();
}
