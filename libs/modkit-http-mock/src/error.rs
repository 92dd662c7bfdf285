use thiserror::Error;

use crate::expectation::ExpectationFailure;

/// Classification of URL validation failures.
///
/// Provides programmatic matching for different failure modes without
/// relying on unstable error message strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum InvalidUriKind {
    /// URL could not be parsed (malformed syntax)
    ParseError,
    /// URL is relative and the client has no base URL to resolve it against
    MissingAuthority,
}

/// Errors surfaced by the mocked HTTP client.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum HttpError {
    /// Request building failed
    #[error("Failed to build request: {0}")]
    RequestBuild(#[from] http::Error),

    /// Invalid header name
    #[error("Invalid header name: {0}")]
    InvalidHeaderName(#[from] http::header::InvalidHeaderName),

    /// Invalid header value
    #[error("Invalid header value: {0}")]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

    /// Request timed out (queued timeout failure, or a delayed response that
    /// outlived the request timeout)
    #[error("Request timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Transport error (queued connection failure and the like)
    #[error("Transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A request reached the mock handler while the response queue was empty
    #[error("Mock queue is empty: no response queued for {method} {uri}")]
    QueueExhausted {
        /// Method of the rejected request
        method: http::Method,
        /// URI of the rejected request
        uri: String,
    },

    /// Response body exceeded size limit
    #[error("Response body too large: limit {limit} bytes, got {actual} bytes")]
    BodyTooLarge { limit: usize, actual: usize },

    /// HTTP non-2xx status
    #[error("HTTP {status}: {body_preview}")]
    HttpStatus {
        status: http::StatusCode,
        body_preview: String,
        content_type: Option<String>,
    },

    /// JSON (de)serialization error
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Form URL encoding error
    #[error("Form encoding failed: {0}")]
    FormEncode(#[from] serde_urlencoded::ser::Error),

    /// Invalid URL
    ///
    /// Use the `kind` field for programmatic matching; `reason` is for logging only.
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUri {
        /// The URL that failed to parse
        url: String,
        /// Structured failure classification for programmatic matching
        kind: InvalidUriKind,
        /// Diagnostic message (unstable format, for logging only)
        reason: String,
    },

    /// URL scheme other than http/https
    #[error("URL scheme '{scheme}' not allowed: {reason}")]
    InvalidScheme {
        /// The URL scheme that was rejected
        scheme: String,
        /// Reason the scheme was rejected
        reason: String,
    },
}

impl HttpError {
    /// Returns `true` when the request was rejected because no response was queued.
    #[must_use]
    pub fn is_queue_exhausted(&self) -> bool {
        matches!(self, Self::QueueExhausted { .. })
    }
}

/// Error raised by a queued [`MockFailure::Transport`](crate::MockFailure::Transport).
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct SimulatedTransportError {
    pub(crate) message: String,
}

impl SimulatedTransportError {
    /// The message the failure was queued with.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors from inspecting a [`MockSession`](crate::MockSession).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MockError {
    /// History index beyond the recorded transactions
    #[error("History index {index} out of range: {len} transaction(s) recorded")]
    OutOfRange { index: usize, len: usize },
}

/// One or more expectations were not satisfied by the recorded history.
#[derive(Error, Debug, Clone)]
#[error("{} expectation(s) failed:\n{}", .failures.len(), render_failures(.failures))]
pub struct VerificationError {
    /// Failed expectations in registration order
    pub failures: Vec<ExpectationFailure>,
}

fn render_failures(failures: &[ExpectationFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}
