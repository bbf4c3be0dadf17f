/*
[INPUT]:  Test configuration and mock server requirements
[OUTPUT]: Shared test utilities, fixtures, and mock helpers
[POS]:    Test infrastructure - shared across all test modules
[UPDATE]: When adding new test patterns or fixtures
*/

//! Common test utilities for codex-adapter tests

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use codex_adapter::ws::{Connector, Transport, TransportCommand, TransportEvent};
use codex_adapter::{ClientConfig, CodexClient, Credentials, Ed25519Signer, SessionConfig};
use serde_json::Value;
use tokio::sync::mpsc;
use url::Url;
use wiremock::MockServer;

pub const WAIT: Duration = Duration::from_secs(2);

/// Setup a mock HTTP server for testing
pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

/// Deterministic credentials derived from a fixed seed
pub fn test_credentials() -> Credentials {
    Credentials::from_signer(Ed25519Signer::from_seed(&[7u8; 32]))
}

/// Client pointed at the mock server
pub fn client_for(server: &MockServer) -> CodexClient {
    CodexClient::with_config(ClientConfig {
        base_url: server.uri(),
        ..ClientConfig::default()
    })
    .expect("client init")
}

/// Session timings short enough for tests
pub fn fast_session_config() -> SessionConfig {
    SessionConfig {
        ping_interval: Duration::from_secs(60),
        reconnect_delay: Duration::from_millis(20),
        auth_grace: Duration::from_millis(300),
        ..SessionConfig::new(Url::parse("ws://mock.invalid/ws").expect("url"))
    }
}

/// Server side of one mocked connection
pub struct ServerEnd {
    pub commands: mpsc::Receiver<TransportCommand>,
    pub events: mpsc::Sender<TransportEvent>,
}

impl ServerEnd {
    /// Next command from the client, skipping pings
    pub async fn next_command(&mut self) -> TransportCommand {
        loop {
            let command = tokio::time::timeout(WAIT, self.commands.recv())
                .await
                .expect("timed out waiting for client command")
                .expect("client dropped the connection");
            if command != TransportCommand::Ping {
                return command;
            }
        }
    }

    /// Next JSON text frame from the client
    pub async fn next_frame(&mut self) -> Value {
        match self.next_command().await {
            TransportCommand::Text(text) => serde_json::from_str(&text).expect("client sent json"),
            other => panic!("expected text frame, got {other:?}"),
        }
    }

    pub async fn send_json(&self, value: Value) {
        self.events
            .send(TransportEvent::Text(value.to_string()))
            .await
            .expect("client listening");
    }

    pub async fn challenge(&self, description: &str) {
        self.send_json(serde_json::json!({
            "data": {"msg": "api_token_authorize_requested", "description": description}
        }))
        .await;
    }

    pub async fn authorize(&self) {
        self.send_json(serde_json::json!({"data": {"msg": "authorized"}}))
            .await;
    }

    /// Run the handshake from the server side; returns the token_auth frame
    pub async fn handshake(&mut self, description: &str) -> Value {
        let request = self.next_frame().await;
        assert_eq!(request["type"], "token_auth_request");
        self.challenge(description).await;
        let auth = self.next_frame().await;
        assert_eq!(auth["type"], "token_auth");
        self.authorize().await;
        auth
    }
}

/// In-memory connector handing each connection's server end to the test
pub struct MockConnector {
    connects: AtomicUsize,
    servers: mpsc::UnboundedSender<ServerEnd>,
}

impl MockConnector {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ServerEnd>) {
        let (servers, rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            connects: AtomicUsize::new(0),
            servers,
        });
        (connector, rx)
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, _url: &Url) -> codex_adapter::Result<Transport> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let (command_tx, command_rx) = mpsc::channel(64);
        let (event_tx, event_rx) = mpsc::channel(64);
        let _ = self.servers.send(ServerEnd {
            commands: command_rx,
            events: event_tx,
        });
        Ok(Transport {
            commands: command_tx,
            events: event_rx,
        })
    }
}

/// Wait for the next accepted connection
pub async fn accept(servers: &mut mpsc::UnboundedReceiver<ServerEnd>) -> ServerEnd {
    tokio::time::timeout(WAIT, servers.recv())
        .await
        .expect("timed out waiting for a connection")
        .expect("connector dropped")
}
