use thiserror::Error;

/// Failure taxonomy of a single resolve attempt.
///
/// Cloneable so a failed binding can keep the error next to its last good value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The descriptor is incomplete; no request was attempted.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The request never produced a response (connect failure, timeout, reset).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The remote answered, but with a failure status or an unparsable body.
    #[error("Upstream error: {message}")]
    Upstream {
        status: Option<u16>,
        message: String,
    },
}

impl FetchError {
    /// Whether the next scheduled tick can be expected to succeed where this one failed.
    pub fn is_transient(&self) -> bool {
        !matches!(self, FetchError::Configuration(_))
    }

    /// HTTP status reported by the upstream, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Upstream { status, .. } => *status,
            _ => None,
        }
    }
}

pub type FetchResult<T> = Result<T, FetchError>;
