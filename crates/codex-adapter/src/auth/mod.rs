/*
[INPUT]:  API key pair, payload bytes, wall clock
[OUTPUT]: Hex signatures, nonces, validated credentials
[POS]:    Auth layer - handles Codex API authentication primitives
[UPDATE]: When auth flow or signature methods change
*/

pub mod credentials;
pub mod nonce;
pub mod signer;

pub use credentials::Credentials;
pub use nonce::NonceSource;
pub use signer::{Ed25519Signer, sign, verify_hex};
