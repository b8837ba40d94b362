//! Dispatch failure taxonomy.

use thiserror::Error;

/// Why a buffer could not be delivered to the collector.
///
/// Every variant renders to the message written to the log; callers that
/// only log never need to match on the kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("{0}")]
    Configuration(String),

    #[error("Request timed out.")]
    Timeout,

    #[error("Server responded with {status} status.")]
    Server { status: u16 },

    #[error("Unexpected response code {status}.")]
    UnexpectedStatus { status: u16 },

    #[error("Network error occurred ({0}).")]
    Network(String),
}

/// Coarse classification of a [`DispatchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchErrorKind {
    Configuration,
    Timeout,
    Server,
    UnexpectedStatus,
    Network,
}

impl DispatchError {
    /// The token is not configured; raised before any network call.
    pub fn missing_token() -> Self {
        DispatchError::Configuration(
            "The HIREFIRE_TOKEN environment variable is not set. Unable to submit \
             Request Queue Time metric data. The HIREFIRE_TOKEN can be found in \
             the HireFire Web UI in the web dyno manager settings."
                .to_string(),
        )
    }

    /// Classify a non-200 status.
    pub fn from_status(status: u16) -> Self {
        if status >= 500 {
            DispatchError::Server { status }
        } else {
            DispatchError::UnexpectedStatus { status }
        }
    }

    pub fn kind(&self) -> DispatchErrorKind {
        match self {
            DispatchError::Configuration(_) => DispatchErrorKind::Configuration,
            DispatchError::Timeout => DispatchErrorKind::Timeout,
            DispatchError::Server { .. } => DispatchErrorKind::Server,
            DispatchError::UnexpectedStatus { .. } => DispatchErrorKind::UnexpectedStatus,
            DispatchError::Network(_) => DispatchErrorKind::Network,
        }
    }
}
