/*
[INPUT]:  WebSocket test scenarios over an in-memory transport
[OUTPUT]: Test results for the WebSocket session
[POS]:    Integration tests - WebSocket
[UPDATE]: When WebSocket session changes
*/

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use codex_adapter::ws::{CALLER_CLOSE_CODE, TransportCommand};
use codex_adapter::{Channel, CodexError, SessionState, WebSocketSession, verify_hex};
use common::{MockConnector, ServerEnd, WAIT, accept, fast_session_config, test_credentials};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio_test::assert_ok;

fn collector() -> (impl Fn(Value) + Send + Sync + 'static, mpsc::UnboundedReceiver<Value>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        move |value| {
            let _ = tx.send(value);
        },
        rx,
    )
}

async fn wait_for_state(session: &WebSocketSession, state: SessionState) {
    let mut rx = session.subscribe_state();
    assert_ok!(
        tokio::time::timeout(WAIT, rx.wait_for(|current| *current == state))
            .await
            .expect("timed out waiting for state")
    );
}

fn channels(frame: &Value) -> Vec<String> {
    frame["payload"]["channels"]
        .as_array()
        .expect("channels array")
        .iter()
        .filter_map(|c| c.as_str().map(str::to_string))
        .collect()
}

#[tokio::test]
async fn test_disconnect_before_connect_is_not_connected() {
    let (connector, _servers) = MockConnector::new();
    let session = WebSocketSession::with_connector(fast_session_config(), test_credentials(), connector);
    assert_eq!(session.state(), SessionState::Disconnected);
    assert!(matches!(session.disconnect().await, Err(CodexError::NotConnected)));
}

#[tokio::test]
async fn test_challenge_answered_once_and_not_forwarded() {
    let credentials = test_credentials();
    let (connector, mut servers) = MockConnector::new();
    let session =
        WebSocketSession::with_connector(fast_session_config(), credentials.clone(), connector);
    let (callback, mut delivered) = collector();

    let _handle = assert_ok!(session.connect(callback).await);
    let mut server = accept(&mut servers).await;

    let request = server.next_frame().await;
    assert_eq!(
        request,
        json!({"type": "token_auth_request", "payload": {"public_key": credentials.public_key()}})
    );

    server.challenge("challenge123").await;
    let auth = server.next_frame().await;
    assert_eq!(auth["type"], "token_auth");
    let signature = auth["payload"]["signature"].as_str().expect("signature");
    assert!(verify_hex(credentials.public_key(), b"challenge123", signature));

    server.authorize().await;
    wait_for_state(&session, SessionState::Authenticated).await;

    server.send_json(json!({"type": "tickers", "data": []})).await;
    let first = tokio::time::timeout(WAIT, delivered.recv()).await.expect("delivery");
    assert_eq!(first, Some(json!({"type": "tickers", "data": []})));

    // nothing else went out: no second token_auth, no subscribe for an empty set
    assert!(server.commands.try_recv().is_err());

    assert_ok!(session.disconnect().await);
}

#[tokio::test]
async fn test_reconnect_resubscribes_desired_set() {
    let (connector, mut servers) = MockConnector::new();
    let session =
        WebSocketSession::with_connector(fast_session_config(), test_credentials(), connector.clone());
    let (callback, _delivered) = collector();

    assert_ok!(session.start_order_book("ETHBTC").await);
    assert_ok!(session.start_trades("ethbtc").await);
    let _handle = assert_ok!(session.connect(callback).await);

    let mut server = accept(&mut servers).await;
    server.handshake("first").await;
    let subscribe = server.next_frame().await;
    assert_eq!(subscribe["type"], "subscribe");
    assert_eq!(channels(&subscribe), vec!["order_book-ethbtc", "trade-ethbtc"]);

    // transport drops without a close code
    drop(server);

    let mut server = accept(&mut servers).await;
    server.handshake("second").await;
    let subscribe = server.next_frame().await;
    assert_eq!(subscribe["type"], "subscribe");
    assert_eq!(channels(&subscribe), vec!["order_book-ethbtc", "trade-ethbtc"]);
    assert_eq!(connector.connects(), 2);

    assert_ok!(session.disconnect().await);
}

#[tokio::test]
async fn test_disconnect_stops_reconnect() {
    let (connector, mut servers) = MockConnector::new();
    let session =
        WebSocketSession::with_connector(fast_session_config(), test_credentials(), connector.clone());
    let (callback, _delivered) = collector();

    let handle = assert_ok!(session.connect(callback).await);
    let mut server = accept(&mut servers).await;
    server.handshake("c").await;
    wait_for_state(&session, SessionState::Authenticated).await;

    assert_ok!(session.disconnect().await);
    assert_eq!(
        server.next_command().await,
        TransportCommand::Close(CALLER_CLOSE_CODE)
    );
    drop(server);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(connector.connects(), 1);
    assert_eq!(session.state(), SessionState::Closing);
    assert!(handle.is_finished());
    assert_ok!(handle.closed().await);

    // a second disconnect has nothing to stop
    assert!(matches!(session.disconnect().await, Err(CodexError::NotConnected)));
}

#[tokio::test]
async fn test_subscribe_is_idempotent_and_live_when_authenticated() {
    let (connector, mut servers) = MockConnector::new();
    let session = WebSocketSession::with_connector(fast_session_config(), test_credentials(), connector);
    let (callback, _delivered) = collector();

    assert_ok!(session.start_tickers().await);
    assert_ok!(session.start_tickers().await);
    assert_eq!(session.channels(), vec![Channel::tickers()]);

    let _handle = assert_ok!(session.connect(callback).await);
    let mut server = accept(&mut servers).await;
    server.handshake("c").await;
    assert_eq!(channels(&server.next_frame().await), vec!["tickers"]);
    wait_for_state(&session, SessionState::Authenticated).await;

    assert_ok!(session.start_order_book("btc_usdt").await);
    assert_eq!(
        server.next_frame().await,
        json!({"type": "subscribe", "payload": {"channels": ["order_book-btc_usdt"]}})
    );

    assert_ok!(session.stop_tickers().await);
    assert_eq!(
        server.next_frame().await,
        json!({"type": "unsubscribe", "payload": {"channels": ["tickers"]}})
    );
    assert_eq!(session.channels(), vec![Channel::order_book("btc_usdt")]);

    assert_ok!(session.disconnect().await);
}

#[tokio::test]
async fn test_silence_after_token_auth_counts_as_authorized() {
    let (connector, mut servers) = MockConnector::new();
    let session = WebSocketSession::with_connector(fast_session_config(), test_credentials(), connector);
    let (callback, _delivered) = collector();

    assert_ok!(session.subscribe("trade-ethbtc").await);
    let _handle = assert_ok!(session.connect(callback).await);
    let mut server = accept(&mut servers).await;

    server.next_frame().await;
    server.challenge("quiet").await;
    assert_eq!(server.next_frame().await["type"], "token_auth");

    // no "authorized" message; the grace timer completes the handshake
    let subscribe = server.next_frame().await;
    assert_eq!(channels(&subscribe), vec!["trade-ethbtc"]);
    assert_eq!(session.state(), SessionState::Authenticated);

    assert_ok!(session.disconnect().await);
}

#[tokio::test]
async fn test_repeated_challenge_surfaces_auth_error() {
    let (connector, mut servers) = MockConnector::new();
    let session =
        WebSocketSession::with_connector(fast_session_config(), test_credentials(), connector.clone());
    let (callback, mut delivered) = collector();

    let handle = assert_ok!(session.connect(callback).await);
    let mut server = accept(&mut servers).await;

    server.next_frame().await;
    server.challenge("first").await;
    assert_eq!(server.next_frame().await["type"], "token_auth");
    server.challenge("again").await;

    assert_eq!(
        server.next_command().await,
        TransportCommand::Close(CALLER_CLOSE_CODE)
    );
    let result = tokio::time::timeout(WAIT, handle.closed()).await.expect("session stops");
    assert!(matches!(result, Err(CodexError::Authentication { .. })));
    assert!(handle.last_error().is_some());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(connector.connects(), 1);
    assert!(delivered.try_recv().is_err());
}

#[tokio::test]
async fn test_connect_is_idempotent_while_running() {
    let (connector, mut servers) = MockConnector::new();
    let session =
        WebSocketSession::with_connector(fast_session_config(), test_credentials(), connector.clone());

    let (first, _rx1) = collector();
    let (second, _rx2) = collector();
    assert_ok!(session.connect(first).await);
    assert_ok!(session.connect(second).await);

    let _server = accept(&mut servers).await;
    assert_eq!(connector.connects(), 1);

    assert_ok!(session.disconnect().await);
}

#[tokio::test]
async fn test_disconnect_during_backoff_cancels_reconnect() {
    let (connector, mut servers) = MockConnector::new();
    let config = codex_adapter::SessionConfig {
        reconnect_delay: Duration::from_millis(500),
        ..fast_session_config()
    };
    let session = WebSocketSession::with_connector(config, test_credentials(), connector.clone());
    let (callback, _delivered) = collector();

    let handle = assert_ok!(session.connect(callback).await);
    let mut server = accept(&mut servers).await;
    server.handshake("c").await;
    wait_for_state(&session, SessionState::Authenticated).await;

    drop(server);
    wait_for_state(&session, SessionState::Disconnected).await;

    assert_ok!(session.disconnect().await);
    assert!(handle.is_finished());

    tokio::time::sleep(Duration::from_millis(800)).await;
    assert_eq!(connector.connects(), 1);
    assert!(servers.try_recv().is_err());
    assert_eq!(session.state(), SessionState::Closing);
}

#[tokio::test]
async fn test_panicking_callback_does_not_stall_session() {
    let (connector, mut servers) = MockConnector::new();
    let session = WebSocketSession::with_connector(fast_session_config(), test_credentials(), connector);

    let (tx, mut delivered) = mpsc::unbounded_channel();
    let failed_once = Arc::new(AtomicBool::new(false));
    let flag = failed_once.clone();
    let _handle = assert_ok!(
        session
            .connect(move |value| {
                if !flag.swap(true, Ordering::SeqCst) {
                    panic!("callback failure");
                }
                let _ = tx.send(value);
            })
            .await
    );

    let mut server = accept(&mut servers).await;
    server.handshake("c").await;
    wait_for_state(&session, SessionState::Authenticated).await;

    server.send_json(json!({"type": "trade", "seq": 1})).await;
    server.send_json(json!({"type": "trade", "seq": 2})).await;

    let next = tokio::time::timeout(WAIT, delivered.recv()).await.expect("delivery");
    assert_eq!(next, Some(json!({"type": "trade", "seq": 2})));
    assert!(failed_once.load(Ordering::SeqCst));
    assert_eq!(session.state(), SessionState::Authenticated);

    let stopped = tokio::time::timeout(WAIT, session.disconnect()).await;
    assert!(matches!(stopped, Ok(Ok(()))));
}

#[tokio::test]
async fn test_subscribe_with_transport_gone_is_deferred() {
    let (connector, mut servers) = MockConnector::new();
    let session = WebSocketSession::with_connector(fast_session_config(), test_credentials(), connector);
    let (callback, _delivered) = collector();

    assert_ok!(session.start_tickers().await);
    let _handle = assert_ok!(session.connect(callback).await);
    let mut server = accept(&mut servers).await;
    server.handshake("c").await;
    assert_eq!(channels(&server.next_frame().await), vec!["tickers"]);
    wait_for_state(&session, SessionState::Authenticated).await;

    // the socket stops accepting writes before any close event arrives
    let ServerEnd { commands, events } = server;
    drop(commands);
    assert_ok!(session.start_trades("ethbtc").await);
    assert_eq!(session.channels().len(), 2);

    drop(events);
    let mut server = accept(&mut servers).await;
    server.handshake("again").await;
    assert_eq!(
        channels(&server.next_frame().await),
        vec!["tickers", "trade-ethbtc"]
    );

    assert_ok!(session.disconnect().await);
}
