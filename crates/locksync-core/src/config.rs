// ── Runtime configuration ──
//
// These types describe *what* to synchronize. They carry credential data and
// timing, but never touch disk: `locksync-config` builds them from the TOML
// file and hands them in. Replacing a `DeviceConfig` is always wholesale.

use std::time::Duration;

use secrecy::SecretString;

use locksync_api::{DEFAULT_BASE_URL, TransportConfig};

/// Configuration for the shared account connection.
#[derive(Debug, Clone)]
pub struct AccountConfig {
    /// Web API access token. `None` leaves the connection not configured.
    pub access_token: Option<SecretString>,
    /// API root, normally `https://api.nuki.io`.
    pub base_url: String,
    pub transport: TransportConfig,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            base_url: DEFAULT_BASE_URL.to_owned(),
            transport: TransportConfig::default(),
        }
    }
}

/// Per-device synchronization settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Remote device identifier. Without it the device stays offline with a
    /// configuration error.
    pub smartlock_id: Option<String>,
    /// Seconds between polls while online. `None` or 0 disables polling.
    pub poll_interval: Option<u64>,
    /// Seconds to wait after a successful command before re-reading the
    /// device. `None` or 0 disables the follow-up check.
    pub refresh_delay: Option<u64>,
}

impl DeviceConfig {
    pub fn new(smartlock_id: impl Into<String>) -> Self {
        Self {
            smartlock_id: Some(smartlock_id.into()),
            ..Self::default()
        }
    }

    pub fn with_poll_interval(mut self, secs: u64) -> Self {
        self.poll_interval = Some(secs);
        self
    }

    pub fn with_refresh_delay(mut self, secs: u64) -> Self {
        self.refresh_delay = Some(secs);
        self
    }

    /// Poll period, if polling is enabled.
    pub fn poll_period(&self) -> Option<Duration> {
        positive_secs(self.poll_interval)
    }

    /// Follow-up delay after a command, if enabled.
    pub fn refresh_period(&self) -> Option<Duration> {
        positive_secs(self.refresh_delay)
    }
}

fn positive_secs(secs: Option<u64>) -> Option<Duration> {
    secs.filter(|s| *s > 0).map(Duration::from_secs)
}
