use std::error::Error;
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use thiserror::Error;

/// A failure of the transport that performs a fetch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The server answered with a non-success status code.
    #[error("bad server response: {0}")]
    Status(u16),
    /// The fetch did not finish within the configured timeout.
    #[error("download timed out after {0:?}")]
    Timeout(Duration),
    /// The connection could not be established or broke down, including DNS resolution,
    /// TLS handshakes and errors while reading the body.
    ///
    /// The attached string contains the innermost error message.
    #[error("download failed: {0}")]
    Connection(String),
}

/// The error side of an [`Outcome`].
///
/// This is cloned verbatim to every caller that awaits the same load.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// The fetch port reported a failure.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The load was cancelled explicitly via [`Loader::cancel`](crate::Loader::cancel).
    #[error("cancelled")]
    Cancelled,
    /// The fetch task went away without settling its load, for example because the
    /// fetcher panicked.
    #[error("internal error")]
    Internal,
}

impl LoadError {
    /// Whether this is a [`LoadError::Cancelled`].
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl TransportError {
    fn connection_error(mut error: &dyn Error) -> Self {
        while let Some(src) = error.source() {
            error = src;
        }

        let mut error_string = error.to_string();

        // Special-case a few error strings
        if error_string.contains("certificate verify failed") {
            error_string = "certificate verify failed".to_string();
        }

        if error_string.contains("SSL routines") {
            error_string = "SSL error".to_string();
        }

        Self::Connection(error_string)
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        if let Some(status) = error.status() {
            return Self::Status(status.as_u16());
        }
        Self::connection_error(&error)
    }
}

/// The result of one load, as delivered to every caller awaiting it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The payload bytes, either from the cache or a successful fetch.
    Payload(Bytes),
    /// The transport succeeded but produced no usable payload.
    Empty,
    /// The load failed or was cancelled.
    Failed(LoadError),
}

impl Outcome {
    /// Converts this into a `Result`, mapping [`Outcome::Empty`] to `Ok(None)`.
    pub fn into_result(self) -> Result<Option<Bytes>, LoadError> {
        match self {
            Self::Payload(bytes) => Ok(Some(bytes)),
            Self::Empty => Ok(None),
            Self::Failed(err) => Err(err),
        }
    }

    /// A short status string, used to tag metrics.
    pub fn status(&self) -> &'static str {
        match self {
            Self::Payload(_) => "payload",
            Self::Empty => "empty",
            Self::Failed(LoadError::Cancelled) => "cancelled",
            Self::Failed(_) => "failed",
        }
    }
}

/// Response metadata stored next to a cached payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseMetadata {
    /// The status code the payload was served with.
    pub status: u16,
    /// The value of the `Content-Type` header, if present.
    pub content_type: Option<String>,
    /// The length of the payload in bytes.
    pub content_length: u64,
    /// When the payload was fetched.
    pub fetched_at: SystemTime,
}

impl ResponseMetadata {
    /// Metadata for a payload that was not fetched over HTTP.
    pub fn for_payload(payload: &Bytes) -> Self {
        Self {
            status: 200,
            content_type: None,
            content_length: payload.len() as u64,
            fetched_at: SystemTime::now(),
        }
    }
}
