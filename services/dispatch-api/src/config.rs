//! Service configuration
//!
//! Loaded from a TOML file (`BINROUTE_CONFIG`, default `binroute.toml`), then
//! overridden by `PORT`, `BINROUTE_QR_SECRET` and `BINROUTE_LOG_FORMAT`.

use binroute_core::{CoreError, LogFormat};
use binroute_dispatch::model::{Collector, Organization, Role};
use binroute_dispatch::EngineConfig;
use serde::{Deserialize, Deserializer};
use std::path::Path;
use thiserror::Error;
use zeroize::Zeroize;

/// Default config file looked up when `BINROUTE_CONFIG` is unset
pub const DEFAULT_CONFIG_PATH: &str = "binroute.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] CoreError),

    #[error("invalid value for {var}: {value}")]
    InvalidEnv { var: &'static str, value: String },

    #[error("qr_secret is not configured")]
    MissingSecret,

    #[error("invalid qr_secret: {0}")]
    InvalidSecret(#[from] binroute_crypto::SigningError),

    #[error("failed to provision {entity} {id}: {reason}")]
    Provision {
        entity: &'static str,
        id: String,
        reason: String,
    },
}

/// String wiped from memory on drop and redacted from debug output
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Drop for SecretString {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("<redacted>")
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        String::deserialize(d).map(SecretString)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    /// Maximum accepted request body
    pub body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8090,
            body_limit_bytes: 64 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Outbound queue bound; events beyond it are dropped
    pub queue_capacity: usize,
    pub request_timeout_ms: u64,
    /// Delivery records kept for inspection
    pub delivery_log_capacity: usize,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            request_timeout_ms: 5_000,
            delivery_log_capacity: 500,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Heartbeats allowed per user inside one window
    pub max_requests: u32,
    pub window_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 12,
            window_ms: 60_000,
        }
    }
}

/// Static bearer token → caller entry
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialEntry {
    pub token: SecretString,
    pub user_id: String,
    pub role: Role,
    #[serde(default)]
    pub organization_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub log_format: LogFormat,
    pub qr_secret: SecretString,
    pub server: ServerConfig,
    pub engine: EngineConfig,
    pub webhooks: WebhookConfig,
    pub rate_limit: RateLimitConfig,
    pub credentials: Vec<CredentialEntry>,
    pub organizations: Vec<Organization>,
    pub collectors: Vec<Collector>,
}

impl ServiceConfig {
    /// Parse a TOML document
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(binroute_core::config::parse_toml(content)?)
    }

    /// Read the configured file, or defaults when the default path is absent
    pub fn load() -> Result<Self, ConfigError> {
        let explicit = std::env::var("BINROUTE_CONFIG").ok();
        let path = explicit.as_deref().unwrap_or(DEFAULT_CONFIG_PATH);

        let mut config = if explicit.is_none() && !Path::new(path).exists() {
            Self::default()
        } else {
            binroute_core::load_toml(path)?
        };
        config.apply_env(|var| std::env::var(var).ok())?;
        Ok(config)
    }

    /// Apply environment overrides from `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT") {
            self.server.port = port.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                var: "PORT",
                value: port.clone(),
            })?;
        }
        if let Some(secret) = lookup("BINROUTE_QR_SECRET") {
            self.qr_secret = SecretString::new(secret);
        }
        if let Some(format) = lookup("BINROUTE_LOG_FORMAT") {
            self.log_format = LogFormat::parse(&format).ok_or(ConfigError::InvalidEnv {
                var: "BINROUTE_LOG_FORMAT",
                value: format.clone(),
            })?;
        }
        Ok(())
    }
}
