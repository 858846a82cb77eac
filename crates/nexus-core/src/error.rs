//! Error types for the Nexus AI pipeline.

use thiserror::Error;

use crate::models::Capability;

/// Result type alias using the pipeline's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for generation, retrieval, and storage operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Non-2xx response or network failure talking to a provider.
    /// `status` is `None` when no HTTP response was received.
    #[error("Transport error{}: {body}", status_suffix(.status))]
    Transport { status: Option<u16>, body: String },

    /// 2xx response that is missing an expected field or has the wrong shape.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Image reference is neither an inline data URL nor a fetchable URL.
    #[error("Unsupported payload: {0}")]
    UnsupportedPayload(String),

    /// Downloading a remote artifact failed.
    #[error("Download failed: {0}")]
    DownloadFailed(String),

    /// Local helper executable or script is absent.
    #[error("Helper not found: {0}")]
    HelperNotFound(String),

    /// Local helper ran and reported a failure.
    #[error("Helper error: {0}")]
    HelperError(String),

    /// Every entry in a fallback chain failed. `last` is the representative cause.
    #[error("All {attempts} {capability} provider(s) failed; last error: {last}")]
    AggregateFailure {
        capability: Capability,
        attempts: usize,
        last: Box<Error>,
    },

    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Blob or document store failure not covered by `Database`
    #[error("Storage error: {0}")]
    Storage(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a transport error, truncating the body so provider error pages
    /// cannot blow up log lines.
    pub fn transport(status: Option<u16>, body: impl AsRef<str>) -> Self {
        Error::Transport {
            status,
            body: truncate_chars(body.as_ref(), crate::defaults::ERROR_BODY_MAX_CHARS),
        }
    }

    /// The underlying cause for aggregate failures, `self` otherwise.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::AggregateFailure { last, .. } => last.root_cause(),
            other => other,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        // Request URLs may carry credentials; keep them out of messages.
        Error::transport(e.status().map(|s| s.as_u16()), e.without_url().to_string())
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({})", s)).unwrap_or_default()
}

/// Truncate `s` to at most `max` characters, never splitting a code point.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
