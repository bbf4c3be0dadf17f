/*
[INPUT]:  Crate modules and public type definitions
[OUTPUT]: Public Codex adapter crate surface
[POS]:    Crate root - module wiring
[UPDATE]: When public modules or exports change
*/

pub mod auth;
pub mod http;
pub mod types;
pub mod ws;

// Re-export commonly used types from auth
pub use auth::{Credentials, Ed25519Signer, NonceSource, sign, verify_hex};

// Re-export commonly used types from http
pub use http::{
    ClientConfig,
    CodexClient,
    CodexError,
    DEFAULT_BASE_URL,
    RequestSigner,
    Result,
    SignedPayload,
};

// Re-export all types
pub use types::*;

// Re-export commonly used types from ws
pub use ws::{
    Channel,
    Connector,
    SessionConfig,
    SessionHandle,
    SessionState,
    WebSocketSession,
};
