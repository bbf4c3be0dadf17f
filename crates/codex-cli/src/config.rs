/*
[INPUT]:  YAML configuration file, CLI/env key overrides
[OUTPUT]: Parsed CLI configuration, adapter client/session configs
[POS]:    Configuration layer - connection and stream setup
[UPDATE]: When adding new configuration options
*/

use std::time::Duration;

use anyhow::{Context, Result, bail};
use codex_adapter::{ClientConfig, Credentials, DEFAULT_BASE_URL, SessionConfig};
use serde::{Deserialize, Serialize};

/// Top-level configuration for the codex CLI
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CliConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub stream: StreamConfig,
}

/// REST endpoint and key pair
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Exchange-issued public key
    #[serde(default)]
    pub public_key: String,
    /// 64-byte Ed25519 keypair, hex encoded
    #[serde(default)]
    pub secret_key: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            public_key: String::new(),
            secret_key: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// WebSocket session tuning
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StreamConfig {
    /// Overrides the endpoint derived from `api.base_url`
    #[serde(default)]
    pub url: Option<String>,
    /// Channels subscribed on start, e.g. "order_book-ethbtc"
    #[serde(default)]
    pub channels: Vec<String>,
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
    #[serde(default = "default_auth_grace_ms")]
    pub auth_grace_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: None,
            channels: Vec::new(),
            ping_interval_secs: default_ping_interval_secs(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
            auth_grace_ms: default_auth_grace_ms(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_ping_interval_secs() -> u64 {
    30
}

fn default_reconnect_delay_secs() -> u64 {
    5
}

fn default_auth_grace_ms() -> u64 {
    2000
}

impl CliConfig {
    /// Load configuration from YAML file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).with_context(|| format!("read {path}"))?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content).context("parse yaml config")?;
        Ok(config)
    }

    /// Replace keys with values given on the command line or environment
    pub fn apply_key_overrides(&mut self, public_key: Option<String>, secret_key: Option<String>) {
        if let Some(public_key) = public_key {
            self.api.public_key = public_key;
        }
        if let Some(secret_key) = secret_key {
            self.api.secret_key = secret_key;
        }
    }

    pub fn has_credentials(&self) -> bool {
        !self.api.public_key.trim().is_empty() && !self.api.secret_key.trim().is_empty()
    }

    pub fn credentials(&self) -> Result<Credentials> {
        if !self.has_credentials() {
            bail!("public_key and secret_key are required (config, --public-key/--secret-key or CODEX_PUBLIC_KEY/CODEX_SECRET_KEY)");
        }
        Credentials::new(self.api.public_key.clone(), &self.api.secret_key)
            .context("load api credentials")
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.api.base_url.clone(),
            timeout: Duration::from_secs(self.api.timeout_secs),
            ..ClientConfig::default()
        }
    }

    pub fn session_config(&self) -> Result<SessionConfig> {
        let base = match &self.stream.url {
            Some(url) => SessionConfig::new(url.parse().context("invalid stream url")?),
            None => SessionConfig::for_base_url(&self.api.base_url).context("derive stream url")?,
        };
        Ok(SessionConfig {
            ping_interval: Duration::from_secs(self.stream.ping_interval_secs),
            reconnect_delay: Duration::from_secs(self.stream.reconnect_delay_secs),
            auth_grace: Duration::from_millis(self.stream.auth_grace_ms),
            ..base
        })
    }
}
