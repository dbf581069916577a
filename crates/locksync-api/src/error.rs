use std::error::Error as StdError;

use thiserror::Error;

/// Every failed call against the Nuki Web API resolves to exactly one of
/// these two variants.
///
/// Parse failures and transport failures both land in
/// [`Communication`](Self::Communication); callers cannot (and should not)
/// tell them apart. `locksync-core` decides retry policy from the variant
/// alone.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// HTTP 401 or 403, whatever the body says.
    #[error("{message}")]
    Unauthorized { message: String },

    /// Any other HTTP status >= 300, a transport failure, or a body that
    /// does not match the expected shape.
    #[error("{message}")]
    Communication { message: String },
}

impl Error {
    /// The classified, human-readable message.
    pub fn message(&self) -> &str {
        match self {
            Self::Unauthorized { message } | Self::Communication { message } => message,
        }
    }

    /// Returns `true` if the credential was rejected.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    pub(crate) fn communication(message: impl Into<String>) -> Self {
        Self::Communication {
            message: message.into(),
        }
    }

    /// Wrap a failure that happened before a response was received
    /// (connect refused, DNS, timeout, TLS, truncated body).
    pub(crate) fn transport(err: &reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            "timeout"
        } else if err.is_connect() {
            "connect"
        } else if err.is_body() || err.is_decode() {
            "body"
        } else {
            "request"
        };
        Self::communication(format!(
            "Exception when sending request - {kind}: {}",
            describe_chain(err)
        ))
    }
}

/// Flatten an error and its `source()` chain into one line.
fn describe_chain(err: &dyn StdError) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !out.contains(&text) {
            out.push_str(": ");
            out.push_str(&text);
        }
        source = cause.source();
    }
    out
}
