use std::path::Path;
use std::time::Duration;

use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use reqwest::Url;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::logging::LoggingConfig;
use super::store::StoreConfig;

/// A top-level enum for versioned configurations.
#[derive(Deserialize, Serialize, JsonSchema)]
#[serde(tag = "version")]
pub enum Config {
    #[serde(rename = "1.0.0")]
    ConfigV1(ConfigV1),
}

/// Main config for v1.0.0: where the API lives, how tokens are renewed,
/// where the token is persisted and how we log.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct ConfigV1 {
    pub api: ApiConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),
    #[error("invalid url '{value}': {reason}")]
    InvalidUrl { value: String, reason: String },
    #[error("failed to build http client: {0}")]
    HttpClient(String),
}

/// Load config from a YAML file, with `AUTHRELAY_*` environment overrides
/// (`AUTHRELAY_AUTH__REFRESH_TIMEOUT_IN_MS=1000`).
pub fn load_config(path: impl AsRef<Path>) -> Result<ConfigV1, ConfigError> {
    let figment = Figment::new()
        .merge(Yaml::file(path.as_ref()))
        .merge(Env::prefixed("AUTHRELAY_").split("__"));
    from_figment(figment)
}

/// Parse a config from an in-memory YAML document.
pub fn load_config_str(yaml: &str) -> Result<ConfigV1, ConfigError> {
    from_figment(Figment::new().merge(Yaml::string(yaml)))
}

fn from_figment(figment: Figment) -> Result<ConfigV1, ConfigError> {
    let config = figment.extract::<Config>().map_err(Box::new)?;
    // handle configuration migration between versions here when necessary
    match config {
        Config::ConfigV1(c) => Ok(c),
    }
}

/// Resolve an endpoint path against the API base URL.
pub fn resolve_url(base: &Url, path: &str) -> Result<Url, ConfigError> {
    base.join(path).map_err(|e| ConfigError::InvalidUrl {
        value: path.to_string(),
        reason: e.to_string(),
    })
}

/// Render the JSON schema for the configuration.
pub fn config_schema() -> String {
    let schema = schema_for!(Config);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}

/// Where the resource server lives.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default = "default_request_timeout_in_ms")]
    pub request_timeout_in_ms: u64,
}

impl ApiConfig {
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.base_url).map_err(|e| ConfigError::InvalidUrl {
            value: self.base_url.clone(),
            reason: e.to_string(),
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_in_ms)
    }
}

/// Token renewal settings and the "token expired" signal contract.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct AuthConfig {
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,
    #[serde(default = "default_logout_path")]
    pub logout_path: String,
    /// HTTP status that, together with `expired_code`, means "renew and retry".
    #[serde(default = "default_expired_status")]
    pub expired_status: u16,
    /// Value of the `code` field in the error body that marks an expired token.
    #[serde(default = "default_expired_code")]
    pub expired_code: String,
    #[serde(default = "default_refresh_timeout_in_ms")]
    pub refresh_timeout_in_ms: u64,
    #[serde(default = "default_logout_timeout_in_ms")]
    pub logout_timeout_in_ms: u64,
    /// Clock skew tolerated when checking the `exp` claim of a refreshed token.
    #[serde(default = "default_expiry_leeway_in_secs")]
    pub expiry_leeway_in_secs: i64,
}

impl AuthConfig {
    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_millis(self.refresh_timeout_in_ms)
    }

    pub fn logout_timeout(&self) -> Duration {
        Duration::from_millis(self.logout_timeout_in_ms)
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            refresh_path: default_refresh_path(),
            logout_path: default_logout_path(),
            expired_status: default_expired_status(),
            expired_code: default_expired_code(),
            refresh_timeout_in_ms: default_refresh_timeout_in_ms(),
            logout_timeout_in_ms: default_logout_timeout_in_ms(),
            expiry_leeway_in_secs: default_expiry_leeway_in_secs(),
        }
    }
}

fn default_request_timeout_in_ms() -> u64 {
    10_000
}

fn default_refresh_path() -> String {
    "/auth/refresh".to_string()
}

fn default_logout_path() -> String {
    "/auth/logout".to_string()
}

fn default_expired_status() -> u16 {
    401
}

fn default_expired_code() -> String {
    "AUTH_002".to_string()
}

fn default_refresh_timeout_in_ms() -> u64 {
    5_000
}

fn default_logout_timeout_in_ms() -> u64 {
    2_000
}

fn default_expiry_leeway_in_secs() -> i64 {
    30
}
