/*
[INPUT]:  WebSocket URL, outbound commands (text, ping, close)
[OUTPUT]: Inbound transport events (text, pong, error, closed)
[POS]:    WebSocket layer - transport seam between session and tokio-tungstenite
[UPDATE]: When changing TLS/connect options or the event vocabulary
*/

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::debug;
use url::Url;

use crate::http::{CodexError, Result};

const CHANNEL_CAPACITY: usize = 100;

/// What the session asks the transport to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCommand {
    Text(String),
    Ping,
    Close(u16),
}

/// What the transport reports back
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Text(String),
    Pong,
    Error(String),
    Closed { code: Option<u16>, reason: String },
}

/// An open connection: commands go in, events come out. Dropping the
/// command sender closes the socket.
#[derive(Debug)]
pub struct Transport {
    pub commands: mpsc::Sender<TransportCommand>,
    pub events: mpsc::Receiver<TransportEvent>,
}

/// Dials a streaming endpoint
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &Url) -> Result<Transport>;
}

/// Default connector over tokio-tungstenite with rustls
#[derive(Debug, Default, Clone, Copy)]
pub struct TungsteniteConnector;

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(&self, url: &Url) -> Result<Transport> {
        let (ws_stream, _response) = connect_async(url.as_str())
            .await
            .map_err(|err| CodexError::Transport(err.to_string()))?;
        let (mut write, mut read) = ws_stream.split();
        let (command_tx, mut command_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel(CHANNEL_CAPACITY);

        tokio::spawn(async move {
            let closed = loop {
                tokio::select! {
                    command = command_rx.recv() => {
                        match command {
                            Some(TransportCommand::Text(text)) => {
                                if let Err(err) = write.send(WsMessage::Text(text.into())).await {
                                    break TransportEvent::Closed { code: None, reason: err.to_string() };
                                }
                            }
                            Some(TransportCommand::Ping) => {
                                if let Err(err) = write.send(WsMessage::Ping(Vec::new().into())).await {
                                    break TransportEvent::Closed { code: None, reason: err.to_string() };
                                }
                            }
                            Some(TransportCommand::Close(code)) => {
                                let frame = CloseFrame {
                                    code: CloseCode::from(code),
                                    reason: String::new().into(),
                                };
                                let _ = write.send(WsMessage::Close(Some(frame))).await;
                                break TransportEvent::Closed { code: Some(code), reason: "closed by client".to_string() };
                            }
                            None => {
                                let _ = write.send(WsMessage::Close(None)).await;
                                break TransportEvent::Closed { code: None, reason: "session dropped".to_string() };
                            }
                        }
                    }
                    incoming = read.next() => {
                        match incoming {
                            Some(Ok(WsMessage::Text(text))) => {
                                if event_tx.send(TransportEvent::Text(text.to_string())).await.is_err() {
                                    break TransportEvent::Closed { code: None, reason: "session dropped".to_string() };
                                }
                            }
                            Some(Ok(WsMessage::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                                Ok(text) => {
                                    let _ = event_tx.send(TransportEvent::Text(text)).await;
                                }
                                Err(_) => debug!(bytes = bytes.len(), "dropping non-utf8 binary frame"),
                            },
                            Some(Ok(WsMessage::Pong(_))) => {
                                let _ = event_tx.send(TransportEvent::Pong).await;
                            }
                            Some(Ok(WsMessage::Close(frame))) => {
                                let (code, reason) = match frame {
                                    Some(frame) => (Some(u16::from(frame.code)), frame.reason.to_string()),
                                    None => (None, String::new()),
                                };
                                break TransportEvent::Closed { code, reason };
                            }
                            Some(Ok(_)) => {}
                            Some(Err(err)) => {
                                let _ = event_tx.send(TransportEvent::Error(err.to_string())).await;
                                break TransportEvent::Closed { code: None, reason: err.to_string() };
                            }
                            None => {
                                break TransportEvent::Closed { code: None, reason: "stream ended".to_string() };
                            }
                        }
                    }
                }
            };

            let _ = event_tx.send(closed).await;
        });

        Ok(Transport {
            commands: command_tx,
            events: event_rx,
        })
    }
}
