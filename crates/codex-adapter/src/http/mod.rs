/*
[INPUT]:  HTTP client configuration and API endpoints
[OUTPUT]: HTTP responses and signed API results
[POS]:    HTTP layer - REST API communication
[UPDATE]: When adding new endpoints or changing client behavior
*/

pub mod client;
pub mod error;
pub mod public;
pub mod signature;
pub mod trade;
pub mod user;
pub mod wallet;

pub use error::{CodexError, Result};
pub use signature::{RequestSigner, SignedPayload};

pub use client::{ClientConfig, CodexClient, DEFAULT_BASE_URL};
