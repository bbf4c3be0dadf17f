/*
[INPUT]:  Raw WebSocket text frames and subscription intents
[OUTPUT]: Typed outbound frames, channel ids, classified inbound frames
[POS]:    WebSocket layer - wire format and control message detection
[UPDATE]: When adding new message types or changing format
*/

use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `data.msg` value of the server's challenge
pub const API_TOKEN_AUTHORIZE_REQUESTED: &str = "api_token_authorize_requested";
/// `data.msg` value confirming the signature was accepted
pub const AUTHORIZED: &str = "authorized";

/// Stream channel: `"<topic>-<market>"` or a bare topic such as `"tickers"`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Channel(String);

impl Channel {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// `order_book-<market>`
    pub fn order_book(market: &str) -> Self {
        Self(format!("order_book-{}", market.to_lowercase()))
    }

    /// `trade-<market>`
    pub fn trades(market: &str) -> Self {
        Self(format!("trade-{}", market.to_lowercase()))
    }

    /// `tickers`
    pub fn tickers() -> Self {
        Self("tickers".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Channel {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Channel {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Frames the client sends: `{"type": ..., "payload": {...}}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum OutboundFrame {
    TokenAuthRequest { public_key: String },
    TokenAuth { signature: String },
    Subscribe { channels: Vec<Channel> },
    Unsubscribe { channels: Vec<Channel> },
}

impl OutboundFrame {
    pub fn kind(&self) -> &'static str {
        match self {
            OutboundFrame::TokenAuthRequest { .. } => "token_auth_request",
            OutboundFrame::TokenAuth { .. } => "token_auth",
            OutboundFrame::Subscribe { .. } => "subscribe",
            OutboundFrame::Unsubscribe { .. } => "unsubscribe",
        }
    }
}

/// Inbound frame after control detection
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// Server asks us to sign `description`
    Challenge { description: String },
    /// Server accepted the signature
    Authorized,
    /// Anything else, forwarded verbatim
    Data(Value),
}

impl InboundFrame {
    /// Parse a text frame and route protocol messages apart from data.
    /// A challenge without a `description` string is malformed.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(text)?;
        let data = value.get("data");
        let msg = data.and_then(|d| d.get("msg")).and_then(Value::as_str);

        match msg {
            Some(API_TOKEN_AUTHORIZE_REQUESTED) => {
                let description = data
                    .and_then(|d| d.get("description"))
                    .and_then(Value::as_str)
                    .ok_or_else(|| serde_json::Error::custom("auth challenge without description"))?;
                Ok(InboundFrame::Challenge {
                    description: description.to_string(),
                })
            }
            Some(AUTHORIZED) => Ok(InboundFrame::Authorized),
            _ => Ok(InboundFrame::Data(value)),
        }
    }
}
