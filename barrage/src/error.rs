//! Error types for barrage
//!
//! Only set-up can fail. Per-attempt transport errors are not errors of the run,
//! they are counted as failures by the [`crate::Aggregator`] (see
//! [`crate::transport::TransportError`]).

use thiserror::Error;

/// Errors raised while preparing or finishing a run.
#[derive(Error, Debug)]
pub enum Error {
    /// A target URL could not be parsed or is not usable as an HTTP target.
    #[error("invalid target '{url}': {reason}")]
    InvalidTarget { url: String, reason: String },

    /// A header name or value given to the request template is invalid.
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// Inconsistent run configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// The HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn invalid_target(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidTarget {
            url: url.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
