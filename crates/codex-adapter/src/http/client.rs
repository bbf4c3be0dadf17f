/*
[INPUT]:  HTTP configuration (base URL, timeouts) and optional credentials
[OUTPUT]: Configured reqwest client, signed request builders, raw JSON results
[POS]:    HTTP layer - core client implementation
[UPDATE]: When adding connection options or changing client behavior
*/

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::Serialize;
use tracing::{debug, warn};

use crate::auth::{Credentials, NonceSource};
use crate::http::signature::{RequestSigner, SignedPayload, canonical_query, route_with_query};
use crate::http::{CodexError, Result};

/// Base URL for the Codex API
pub const DEFAULT_BASE_URL: &str = "https://api.codex.one";
const COINS_PATH: &str = "/coins2";

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Which service a route lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Service {
    /// `<base>` - users, orders, balances, tickers
    Exchange,
    /// `<base>/coins2` - markets, currencies, deposits, withdrawals
    Coins,
}

/// Main HTTP client for the Codex API
#[derive(Debug)]
pub struct CodexClient {
    http_client: Client,
    base_url: String,
    credentials: Option<Credentials>,
    nonces: Arc<NonceSource>,
}

impl CodexClient {
    /// Create a new client with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Create a new client with custom configuration
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let base = Url::parse(&config.base_url)?;
        if base.host_str().is_none() {
            return Err(CodexError::Config(format!(
                "base url has no host: {}",
                config.base_url
            )));
        }

        let http_client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credentials: None,
            nonces: Arc::new(NonceSource::new()),
        })
    }

    /// Set credentials for authenticated requests, replacing any previous pair
    pub fn set_credentials(&mut self, credentials: Credentials) {
        self.credentials = Some(credentials);
    }

    /// Builder-style variant of [`CodexClient::set_credentials`]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.set_credentials(credentials);
        self
    }

    /// Get credentials if set
    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Streaming endpoint on the same host: `wss://<host>/ws`
    /// (`ws://` when the REST base is plain http).
    pub fn websocket_url(&self) -> Result<Url> {
        websocket_url_for(&self.base_url)
    }

    /// Signer bound to the configured credentials and this client's nonce stream
    pub fn request_signer(&self) -> Result<RequestSigner> {
        let credentials = self
            .credentials
            .clone()
            .ok_or(CodexError::MissingCredentials)?;
        Ok(RequestSigner::new(credentials, self.nonces.clone()))
    }

    fn url(&self, service: Service, route: &str) -> Result<Url> {
        let prefix = match service {
            Service::Exchange => "",
            Service::Coins => COINS_PATH,
        };
        Ok(Url::parse(&format!("{}{prefix}{route}", self.base_url))?)
    }

    /// Build an unsigned request
    pub(crate) fn public_request(&self, method: Method, route: &str) -> Result<RequestBuilder> {
        let url = self.url(Service::Exchange, route)?;
        Ok(self.http_client.request(method, url))
    }

    /// Build a request signed over `JSON(body) + route + nonce`
    pub(crate) fn signed_body_request<T: Serialize + ?Sized>(
        &self,
        method: Method,
        service: Service,
        route: &str,
        body: &T,
    ) -> Result<RequestBuilder> {
        let signed = self.request_signer()?.sign_body(route, body)?;
        let url = self.url(service, route)?;
        let builder = self
            .http_client
            .request(method, url)
            .header(CONTENT_TYPE, "application/json")
            .body(signed.body.clone());
        Ok(attach_signature(builder, &signed))
    }

    /// Build a request signed over `route + "?" + query + nonce`
    pub(crate) fn signed_query_request<'a, I>(
        &self,
        method: Method,
        route: &str,
        pairs: I,
    ) -> Result<RequestBuilder>
    where
        I: IntoIterator<Item = (&'a str, Option<String>)>,
    {
        let signer = self.request_signer()?;
        let query = canonical_query(pairs);
        let signed = signer.sign_query(route, &query);
        let url = self.url(Service::Exchange, &route_with_query(route, &query))?;
        Ok(attach_signature(self.http_client.request(method, url), &signed))
    }

    /// Send a request and decode the JSON response.
    ///
    /// Non-2xx responses become [`CodexError::Api`] carrying the body text; an
    /// empty body decodes to `Value::Null`. No retries at this layer.
    pub(crate) async fn send_json(&self, builder: RequestBuilder) -> Result<serde_json::Value> {
        let request = builder.build()?;
        let method = request.method().clone();
        let url = request.url().clone();
        debug!(%method, url = %url, "sending http request");

        let response = self.http_client.execute(request).await.map_err(|err| {
            warn!(%method, url = %url, error = %err, "http request failed");
            CodexError::Http(err)
        })?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            warn!(%method, url = %url, status = status.as_u16(), "http request rejected");
            return Err(CodexError::api_error(status, text));
        }

        if text.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }
}

fn attach_signature(builder: RequestBuilder, signed: &SignedPayload) -> RequestBuilder {
    signed
        .headers()
        .into_iter()
        .fold(builder, |builder, (name, value)| builder.header(name, value))
}

/// Derive the streaming URL from a REST base URL
pub fn websocket_url_for(base_url: &str) -> Result<Url> {
    let base = Url::parse(base_url)?;
    let host = base
        .host_str()
        .ok_or_else(|| CodexError::Config(format!("base url has no host: {base_url}")))?;
    let scheme = if base.scheme() == "http" { "ws" } else { "wss" };
    let authority = match base.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    Ok(Url::parse(&format!("{scheme}://{authority}/ws"))?)
}
