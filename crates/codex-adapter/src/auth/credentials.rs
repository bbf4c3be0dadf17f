/*
[INPUT]:  API public key and hex secret issued by the exchange
[OUTPUT]: Validated, immutable credential pair
[POS]:    Auth layer - shared credential for REST signing and WebSocket auth
[UPDATE]: When key formats or validation rules change
*/

use std::fmt;
use std::sync::Arc;

use crate::auth::Ed25519Signer;
use crate::http::{CodexError, Result};

/// API credentials: the public key sent in headers and the signer derived
/// from the secret. Replace the whole value to rotate keys.
#[derive(Clone)]
pub struct Credentials {
    public_key: String,
    signer: Arc<Ed25519Signer>,
}

impl Credentials {
    /// Build credentials from the exchange-issued pair.
    ///
    /// Fails with [`CodexError::MissingCredentials`] when either value is empty
    /// and [`CodexError::InvalidKey`] when the secret is malformed.
    pub fn new(public_key: impl Into<String>, secret_key_hex: &str) -> Result<Self> {
        let public_key = public_key.into();
        if public_key.trim().is_empty() || secret_key_hex.trim().is_empty() {
            return Err(CodexError::MissingCredentials);
        }
        let signer = Ed25519Signer::from_secret_hex(secret_key_hex)?;
        Ok(Self {
            public_key,
            signer: Arc::new(signer),
        })
    }

    /// Credentials whose public key is the one derived from the signer
    pub fn from_signer(signer: Ed25519Signer) -> Self {
        Self {
            public_key: signer.public_key_hex(),
            signer: Arc::new(signer),
        }
    }

    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    pub fn signer(&self) -> &Ed25519Signer {
        &self.signer
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("public_key", &self.public_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_values_are_missing_credentials() {
        let signer = Ed25519Signer::generate();
        assert!(matches!(
            Credentials::new("", &signer.secret_key_hex()),
            Err(CodexError::MissingCredentials)
        ));
        assert!(matches!(
            Credentials::new("pub", "  "),
            Err(CodexError::MissingCredentials)
        ));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let signer = Ed25519Signer::generate();
        let secret = signer.secret_key_hex();
        let credentials = Credentials::new("my-public-key", &secret).unwrap();

        let rendered = format!("{credentials:?}");
        assert!(rendered.contains("my-public-key"));
        assert!(!rendered.contains(&secret));
    }

    #[test]
    fn test_from_signer_uses_derived_public_key() {
        let signer = Ed25519Signer::from_seed(&[9u8; 32]);
        let expected = signer.public_key_hex();
        let credentials = Credentials::from_signer(signer);
        assert_eq!(credentials.public_key(), expected);
    }
}
