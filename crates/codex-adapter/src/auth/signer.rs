/*
[INPUT]:  Hex-encoded NaCl keypair secret and payload bytes
[OUTPUT]: Detached Ed25519 signatures as lower-case hex
[POS]:    Auth layer - cryptographic signing for REST and WebSocket auth
[UPDATE]: When changing signing algorithm or key format
*/

use ed25519_dalek::{
    KEYPAIR_LENGTH, PUBLIC_KEY_LENGTH, SECRET_KEY_LENGTH, Signature, Signer, SigningKey,
    Verifier, VerifyingKey,
};
use rand::rngs::OsRng;

use crate::http::{CodexError, Result};

/// Sign `payload` with a hex-encoded secret key and return the hex signature.
///
/// The key is the 64-byte NaCl layout (seed followed by public key). The
/// payload is signed exactly as given; building the canonical string is the
/// caller's job (see [`crate::http::RequestSigner`]).
pub fn sign(secret_key_hex: &str, payload: impl AsRef<[u8]>) -> Result<String> {
    let signer = Ed25519Signer::from_secret_hex(secret_key_hex)?;
    Ok(signer.sign_hex(payload.as_ref()))
}

/// Ed25519 signer for request authentication
#[derive(Debug, Clone)]
pub struct Ed25519Signer {
    signing_key: SigningKey,
}

impl Ed25519Signer {
    /// Generate a new random keypair
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        Self { signing_key }
    }

    /// Create signer from a 32-byte seed
    pub fn from_seed(seed: &[u8; SECRET_KEY_LENGTH]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Create signer from 64 keypair bytes (seed || public key)
    pub fn from_keypair_bytes(bytes: &[u8]) -> Result<Self> {
        let bytes: &[u8; KEYPAIR_LENGTH] = bytes.try_into().map_err(|_| {
            CodexError::InvalidKey(format!(
                "expected {KEYPAIR_LENGTH} bytes, got {}",
                bytes.len()
            ))
        })?;
        let signing_key = SigningKey::from_keypair_bytes(bytes).map_err(|_| {
            CodexError::InvalidKey("public half does not match the seed".to_string())
        })?;
        Ok(Self { signing_key })
    }

    /// Create signer from the hex encoding of the 64 keypair bytes
    pub fn from_secret_hex(secret_hex: &str) -> Result<Self> {
        let bytes = hex::decode(secret_hex.trim())
            .map_err(|err| CodexError::InvalidKey(format!("secret key is not hex: {err}")))?;
        Self::from_keypair_bytes(&bytes)
    }

    /// Sign a message and return the signature
    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message)
    }

    /// Sign a message and return the lower-case hex signature
    pub fn sign_hex(&self, message: &[u8]) -> String {
        hex::encode(self.sign(message).to_bytes())
    }

    /// Get the raw public key bytes
    pub fn public_key_bytes(&self) -> [u8; PUBLIC_KEY_LENGTH] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Public key as hex, the form the exchange issues as the API key
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key_bytes())
    }

    /// Keypair bytes as hex, the form accepted by [`Ed25519Signer::from_secret_hex`]
    pub fn secret_key_hex(&self) -> String {
        hex::encode(self.signing_key.to_keypair_bytes())
    }

    /// Verify a signature against a message
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        self.signing_key
            .verifying_key()
            .verify(message, signature)
            .is_ok()
    }
}

/// Verify a hex signature against a hex public key.
pub fn verify_hex(public_key_hex: &str, payload: &[u8], signature_hex: &str) -> bool {
    let Ok(public) = hex::decode(public_key_hex) else {
        return false;
    };
    let Ok(public) = <[u8; PUBLIC_KEY_LENGTH]>::try_from(public.as_slice()) else {
        return false;
    };
    let Ok(verifying_key) = VerifyingKey::from_bytes(&public) else {
        return false;
    };
    let Ok(signature) = hex::decode(signature_hex) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(&signature) else {
        return false;
    };
    verifying_key.verify(payload, &signature).is_ok()
}
