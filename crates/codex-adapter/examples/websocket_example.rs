/*
[INPUT]:  CODEX_PUBLIC_KEY / CODEX_SECRET_KEY environment variables
[OUTPUT]: Real-time ticker and order book frames printed to stdout
[POS]:    Examples - WebSocket stream handling
[UPDATE]: When WebSocket API changes
*/

use codex_adapter::*;
use tokio::time::{Duration, sleep};

/// Example: authenticated WebSocket session
///
/// The session answers the auth challenge, re-sends the channel set after
/// every reconnect and stops for good on `disconnect()`.
#[tokio::main]
async fn main() {
    println!("=== Codex WebSocket Example ===\n");

    let public_key = std::env::var("CODEX_PUBLIC_KEY").unwrap_or_default();
    let secret_key = std::env::var("CODEX_SECRET_KEY").unwrap_or_default();
    let credentials = match Credentials::new(public_key, &secret_key) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Set CODEX_PUBLIC_KEY and CODEX_SECRET_KEY: {}", e);
            return;
        }
    };

    let config = match SessionConfig::production() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Invalid session config: {}", e);
            return;
        }
    };
    let session = WebSocketSession::new(config, credentials);

    // Channels requested before connect are sent once authenticated
    if let Err(e) = session.start_tickers().await {
        eprintln!("Subscribe failed: {}", e);
    }
    if let Err(e) = session.start_order_book("ethbtc").await {
        eprintln!("Subscribe failed: {}", e);
    }

    let handle = match session.connect(|frame| println!("<- {}", frame)).await {
        Ok(h) => h,
        Err(e) => {
            eprintln!("Failed to start session: {}", e);
            return;
        }
    };
    println!("✓ Session started, state: {}", handle.state());

    sleep(Duration::from_secs(10)).await;

    if let Err(e) = session.disconnect().await {
        eprintln!("Disconnect failed: {}", e);
    }
    println!("\n✓ WebSocket example complete, state: {}", session.state());
}
