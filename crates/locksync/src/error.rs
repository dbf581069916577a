//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with help text.

use miette::Diagnostic;
use thiserror::Error;

use locksync_config::ConfigError;
use locksync_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Authentication ───────────────────────────────────────────────
    #[error("No access token configured")]
    #[diagnostic(
        code(locksync::no_credentials),
        help(
            "Pass --access-token, set LOCKSYNC_ACCESS_TOKEN, run `locksync config set-token`,\n\
             or set account.access_token in {path}"
        )
    )]
    NoCredentials { path: String },

    #[error("Access token rejected: {message}")]
    #[diagnostic(
        code(locksync::auth_failed),
        help("Generate a new API token in Nuki Web and store it with `locksync config set-token`.")
    )]
    AuthFailed { message: String },

    // ── Connection ───────────────────────────────────────────────────
    #[error("Nuki Web API request failed: {message}")]
    #[diagnostic(code(locksync::communication))]
    Communication { message: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("{source}")]
    #[diagnostic(code(locksync::config), help("Check {path}"))]
    Config {
        #[source]
        source: ConfigError,
        path: String,
    },

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(locksync::validation))]
    Validation { field: String, reason: String },

    #[error("Keyring error: {message}")]
    #[diagnostic(code(locksync::keyring))]
    Keyring { message: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render JSON: {0}")]
    #[diagnostic(code(locksync::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NoCredentials { .. } | Self::AuthFailed { .. } => exit_code::AUTH,
            Self::Communication { .. } => exit_code::CONNECTION,
            Self::Config { .. } | Self::Validation { .. } => exit_code::USAGE,
            Self::Keyring { .. } | Self::Io(_) | Self::Json(_) => exit_code::GENERAL,
        }
    }
}

// ── Library error mapping ────────────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Unauthorized { message } => Self::AuthFailed { message },
            CoreError::Communication { message } => Self::Communication { message },
            CoreError::Config { message } => Self::Validation {
                field: "config".into(),
                reason: message,
            },
            CoreError::NotConnected => Self::Communication {
                message: "account connection is not available".into(),
            },
        }
    }
}

impl From<locksync_api::Error> for CliError {
    fn from(err: locksync_api::Error) -> Self {
        CoreError::from(err).into()
    }
}

impl From<keyring::Error> for CliError {
    fn from(err: keyring::Error) -> Self {
        Self::Keyring {
            message: err.to_string(),
        }
    }
}
