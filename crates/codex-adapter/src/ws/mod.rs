/*
[INPUT]:  Session configuration, credentials and subscription channels
[OUTPUT]: Authenticated real-time stream with reconnect
[POS]:    WebSocket layer - real-time data streams
[UPDATE]: When adding new channels or changing connection logic
*/

pub mod client;
pub mod machine;
pub mod message;
pub mod transport;

pub use client::{MessageCallback, SessionConfig, SessionHandle, WebSocketSession};
pub use machine::{Action, CALLER_CLOSE_CODE, SessionMachine, SessionState};
pub use message::{Channel, InboundFrame, OutboundFrame};
pub use transport::{Connector, Transport, TransportCommand, TransportEvent, TungsteniteConnector};
