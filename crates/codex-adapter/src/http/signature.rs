/*
[INPUT]:  Credentials, nonce source, route and body/query of a request
[OUTPUT]: SignedPayload and the X-Tonce / X-Signature / X-Public-Key headers
[POS]:    HTTP layer - request signing for authenticated endpoints
[UPDATE]: When changing canonical payload layout or header format
*/

use std::sync::Arc;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Serialize;

use crate::auth::{Credentials, NonceSource};
use crate::http::{CodexError, Result};

pub const HEADER_TONCE: &str = "X-Tonce";
pub const HEADER_SIGNATURE: &str = "X-Signature";
pub const HEADER_PUBLIC_KEY: &str = "X-Public-Key";

/// Bytes left as-is in query keys and values: `A-Za-z0-9-_.!~*'()`
const QUERY_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// One signed request. Built fresh per request and never reused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedPayload {
    /// Serialized JSON body, empty for query-only requests
    pub body: String,
    /// Route as signed; for query requests this includes `?query`
    pub route: String,
    pub nonce: u64,
    /// Lower-case hex Ed25519 signature over `body || route || nonce`
    pub signature: String,
    pub public_key: String,
}

impl SignedPayload {
    /// The exact byte string that was signed
    pub fn canonical(&self) -> String {
        canonical_payload(&self.body, &self.route, self.nonce)
    }

    /// Header pairs to attach to the HTTP request
    pub fn headers(&self) -> [(&'static str, String); 3] {
        [
            (HEADER_TONCE, self.nonce.to_string()),
            (HEADER_SIGNATURE, self.signature.clone()),
            (HEADER_PUBLIC_KEY, self.public_key.clone()),
        ]
    }
}

/// `body || route || nonce`
pub fn canonical_payload(body: &str, route: &str, nonce: u64) -> String {
    format!("{body}{route}{nonce}")
}

/// Serialize a body the way the server re-serializes it: compact JSON, fields
/// in declaration order.
pub fn canonical_body<T: Serialize + ?Sized>(body: &T) -> Result<String> {
    serde_json::to_string(body).map_err(|err| CodexError::Encoding(err.to_string()))
}

/// Encode query pairs in the given order. Every key is emitted; an absent
/// value becomes `key=`. Space encodes as `%20`.
pub fn canonical_query<'a, I>(pairs: I) -> String
where
    I: IntoIterator<Item = (&'a str, Option<String>)>,
{
    pairs
        .into_iter()
        .map(|(key, value)| {
            format!(
                "{}={}",
                utf8_percent_encode(key, QUERY_ESCAPE),
                utf8_percent_encode(value.as_deref().unwrap_or_default(), QUERY_ESCAPE)
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// `route?query`; the `?` is kept even for an empty query
pub fn route_with_query(route: &str, query: &str) -> String {
    format!("{route}?{query}")
}

/// Signs REST requests with one credential and its nonce stream
#[derive(Debug, Clone)]
pub struct RequestSigner {
    credentials: Credentials,
    nonces: Arc<NonceSource>,
}

impl RequestSigner {
    pub fn new(credentials: Credentials, nonces: Arc<NonceSource>) -> Self {
        Self {
            credentials,
            nonces,
        }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Sign a body-bearing request: `JSON(body) + route + nonce`
    pub fn sign_body<T: Serialize + ?Sized>(&self, route: &str, body: &T) -> Result<SignedPayload> {
        let nonce = self.nonces.next();
        self.sign_body_with_nonce(route, body, nonce)
    }

    /// Same as [`RequestSigner::sign_body`] with a caller-supplied nonce
    pub fn sign_body_with_nonce<T: Serialize + ?Sized>(
        &self,
        route: &str,
        body: &T,
        nonce: u64,
    ) -> Result<SignedPayload> {
        let body = canonical_body(body)?;
        self.nonces.observe(nonce);
        Ok(self.sign_parts(body, route.to_string(), nonce))
    }

    /// Sign a query-only request: `route + "?" + query + nonce`
    pub fn sign_query(&self, route: &str, query: &str) -> SignedPayload {
        let nonce = self.nonces.next();
        self.sign_query_with_nonce(route, query, nonce)
    }

    /// Same as [`RequestSigner::sign_query`] with a caller-supplied nonce
    pub fn sign_query_with_nonce(&self, route: &str, query: &str, nonce: u64) -> SignedPayload {
        self.nonces.observe(nonce);
        self.sign_parts(String::new(), route_with_query(route, query), nonce)
    }

    fn sign_parts(&self, body: String, route: String, nonce: u64) -> SignedPayload {
        let payload = canonical_payload(&body, &route, nonce);
        let signature = self.credentials.signer().sign_hex(payload.as_bytes());
        SignedPayload {
            body,
            route,
            nonce,
            signature,
            public_key: self.credentials.public_key().to_string(),
        }
    }
}
