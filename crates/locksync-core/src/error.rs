// ── Core error types ──
//
// The engine itself never surfaces these from a status check: every path
// there ends in a state transition. They are returned by the setup calls
// (initialize, one-shot helpers) and carried by the CLI.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A required setting is missing or invalid. Fatal until reconfigured.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// The credential was rejected by the remote service.
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    /// Network, transport, HTTP >= 300, or malformed payload.
    #[error("Communication error: {message}")]
    Communication { message: String },

    /// The account connection has no usable client (not initialized or
    /// already disposed).
    #[error("Account connection is not available")]
    NotConnected,
}

impl CoreError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<locksync_api::Error> for CoreError {
    fn from(err: locksync_api::Error) -> Self {
        match err {
            locksync_api::Error::Unauthorized { message } => Self::Unauthorized { message },
            locksync_api::Error::Communication { message } => Self::Communication { message },
        }
    }
}
