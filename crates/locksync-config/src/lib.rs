//! Configuration for the locksync daemon.
//!
//! One TOML file (account + devices), `LOCKSYNC_` environment overrides,
//! access-token resolution (env + plaintext + keyring), and translation to
//! the `locksync_core` runtime types. A missing token is not an error here:
//! the account connection reports itself as not configured instead.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::debug;

use locksync_api::{DEFAULT_BASE_URL, TransportConfig};
use locksync_core::{AccountConfig, DeviceConfig, DeviceKind};

/// Keyring service and entry holding the access token.
pub const KEYRING_SERVICE: &str = "locksync";
pub const KEYRING_ENTRY: &str = "access-token";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl ConfigError {
    fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Seconds between background discovery scans. 0 disables discovery.
    #[serde(default = "default_discovery_interval")]
    pub discovery_interval: u64,

    #[serde(default)]
    pub account: AccountSection,

    #[serde(default)]
    pub devices: Vec<DeviceSection>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            discovery_interval: default_discovery_interval(),
            account: AccountSection::default(),
            devices: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountSection {
    /// Access token (plaintext, prefer keyring or env var).
    pub access_token: Option<String>,

    /// Environment variable name containing the access token.
    pub access_token_env: Option<String>,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Path to an extra PEM root certificate.
    pub ca_cert: Option<PathBuf>,
}

impl Default for AccountSection {
    fn default() -> Self {
        Self {
            access_token: None,
            access_token_env: None,
            base_url: default_base_url(),
            timeout: default_timeout(),
            ca_cert: None,
        }
    }
}

/// One synchronized device.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DeviceSection {
    pub name: String,

    #[serde(default = "default_kind")]
    pub kind: DeviceKind,

    /// Remote id. Accepts a string or an integer in TOML.
    #[serde(default, deserialize_with = "smartlock_id")]
    pub smartlock_id: Option<String>,

    pub poll_interval: Option<u64>,

    pub refresh_delay: Option<u64>,
}

impl DeviceSection {
    pub fn device_config(&self) -> DeviceConfig {
        DeviceConfig {
            smartlock_id: self.smartlock_id.clone(),
            poll_interval: self.poll_interval,
            refresh_delay: self.refresh_delay,
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.into()
}
fn default_timeout() -> u64 {
    30
}
fn default_discovery_interval() -> u64 {
    3600
}
fn default_kind() -> DeviceKind {
    DeviceKind::SmartLock
}

fn smartlock_id<'de, D: Deserializer<'de>>(de: D) -> Result<Option<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }

    Ok(Option::<Id>::deserialize(de)?.map(|id| match id {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    }))
}

impl Config {
    /// Check cross-field constraints figment cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = url::Url::parse(&self.account.base_url).map_err(|e| {
            ConfigError::invalid("account.base_url", format!("{}: {e}", self.account.base_url))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::invalid(
                "account.base_url",
                format!("expected http or https, got '{}'", url.scheme()),
            ));
        }
        if self.account.timeout == 0 {
            return Err(ConfigError::invalid("account.timeout", "must be at least 1 second"));
        }

        let mut names = HashSet::new();
        for device in &self.devices {
            if device.name.trim().is_empty() {
                return Err(ConfigError::invalid("devices.name", "must not be empty"));
            }
            if !names.insert(device.name.as_str()) {
                return Err(ConfigError::invalid(
                    "devices.name",
                    format!("duplicate device '{}'", device.name),
                ));
            }
        }
        Ok(())
    }

    pub fn device(&self, name: &str) -> Option<&DeviceSection> {
        self.devices.iter().find(|d| d.name == name)
    }

    /// Render as TOML with any plaintext token masked.
    pub fn to_redacted_toml(&self) -> Result<String, ConfigError> {
        let mut shown = self.clone();
        if shown.account.access_token.is_some() {
            shown.account.access_token = Some("********".into());
        }
        Ok(toml::to_string_pretty(&shown)?)
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "locksync", "locksync").map_or_else(
        || {
            let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
            p.push(".config");
            p.push("locksync");
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

// ── Config loading ──────────────────────────────────────────────────

/// Load from the platform config path plus environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` (missing file is fine) plus `LOCKSYNC_` environment
/// variables, e.g. `LOCKSYNC_ACCOUNT__BASE_URL`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    debug!("loading config from {}", path.display());
    let config: Config = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("LOCKSYNC_").split("__"))
        .extract()?;
    config.validate()?;
    Ok(config)
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve the access token: named env var, then plaintext, then keyring.
pub fn resolve_access_token(account: &AccountSection) -> Option<SecretString> {
    if let Some(ref env_name) = account.access_token_env {
        if let Ok(val) = std::env::var(env_name) {
            debug!("access token taken from ${env_name}");
            return Some(SecretString::from(val));
        }
    }

    if let Some(ref token) = account.access_token {
        debug!("access token taken from config file");
        return Some(SecretString::from(token.clone()));
    }

    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, KEYRING_ENTRY) {
        if let Ok(secret) = entry.get_password() {
            debug!("access token taken from keyring");
            return Some(SecretString::from(secret));
        }
    }

    None
}

/// Build the account connection settings. `token` overrides the credential
/// chain when given (CLI flag).
pub fn account_config(config: &Config, token: Option<SecretString>) -> AccountConfig {
    let account = &config.account;
    AccountConfig {
        access_token: token.or_else(|| resolve_access_token(account)),
        base_url: account.base_url.clone(),
        transport: TransportConfig {
            timeout: Duration::from_secs(account.timeout),
            ca_cert: account.ca_cert.clone(),
        },
    }
}
