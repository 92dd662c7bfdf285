//! Canned responses and the FIFO queue they are dispensed from.

use bytes::Bytes;
use http::{HeaderName, HeaderValue, StatusCode, Version};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{HttpError, SimulatedTransportError};
use crate::history::RecordedRequest;

/// A canned HTTP response.
///
/// ```ignore
/// let ok = MockResponse::new(200).json(&json!({ "id": 1 }))?;
/// let slow = MockResponse::new(204).delay(Duration::from_millis(50));
/// ```
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub(crate) status: StatusCode,
    pub(crate) version: Version,
    pub(crate) headers: Vec<(HeaderName, HeaderValue)>,
    pub(crate) body: Bytes,
    pub(crate) delay: Option<Duration>,
}

impl MockResponse {
    /// Response with the given status and an empty body.
    ///
    /// Invalid status codes fall back to `500 Internal Server Error`.
    #[must_use]
    pub fn new(status: u16) -> Self {
        Self::with_status(StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR))
    }

    #[must_use]
    pub fn with_status(status: StatusCode) -> Self {
        Self {
            status,
            version: Version::HTTP_11,
            headers: Vec::new(),
            body: Bytes::new(),
            delay: None,
        }
    }

    /// `200 OK` with an empty body
    #[must_use]
    pub fn ok() -> Self {
        Self::with_status(StatusCode::OK)
    }

    /// Add a header; repeated names are kept as multiple values
    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.push((name, value));
        self
    }

    /// Add a header from strings.
    ///
    /// # Errors
    /// Returns `HttpError::InvalidHeaderName`/`InvalidHeaderValue` for malformed input.
    pub fn try_header(self, name: &str, value: &str) -> Result<Self, HttpError> {
        let name = HeaderName::try_from(name)?;
        let value = HeaderValue::try_from(value)?;
        Ok(self.header(name, value))
    }

    /// Set a raw body
    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Set a JSON body and `content-type: application/json`.
    ///
    /// # Errors
    /// Returns `HttpError::Json` if serialization fails.
    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self, HttpError> {
        self.body = Bytes::from(serde_json::to_vec(body)?);
        Ok(self.header(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        ))
    }

    #[must_use]
    pub fn version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    /// Hold the response back for `delay` before returning it
    #[must_use]
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn into_http(self) -> Result<http::Response<Bytes>, HttpError> {
        let mut builder = http::Response::builder()
            .status(self.status)
            .version(self.version);
        for (name, value) in self.headers {
            builder = builder.header(name, value);
        }
        Ok(builder.body(self.body)?)
    }
}

impl From<StatusCode> for MockResponse {
    fn from(status: StatusCode) -> Self {
        Self::with_status(status)
    }
}

/// An error to raise instead of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MockFailure {
    /// Surfaces as `HttpError::Transport`
    Transport(String),
    /// Surfaces as `HttpError::Timeout`
    Timeout(Duration),
}

impl MockFailure {
    /// Shorthand for a transport failure
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    pub(crate) fn into_error(self) -> HttpError {
        match self {
            Self::Transport(message) => {
                HttpError::Transport(Box::new(SimulatedTransportError { message }))
            }
            Self::Timeout(after) => HttpError::Timeout(after),
        }
    }
}

type ResponderFn = dyn Fn(&RecordedRequest) -> Result<MockResponse, MockFailure> + Send + Sync;

/// A closure computing the response from the request it answers.
#[derive(Clone)]
pub struct Responder(Arc<ResponderFn>);

impl Responder {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&RecordedRequest) -> Result<MockResponse, MockFailure> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub(crate) fn respond(&self, request: &RecordedRequest) -> Result<MockResponse, MockFailure> {
        (self.0)(request)
    }
}

impl fmt::Debug for Responder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Responder(..)")
    }
}

/// A single queue entry.
#[derive(Debug, Clone)]
pub enum QueuedResponse {
    Response(MockResponse),
    Failure(MockFailure),
    Callback(Responder),
}

impl QueuedResponse {
    /// Queue entry that computes its response from the request
    pub fn callback<F>(f: F) -> Self
    where
        F: Fn(&RecordedRequest) -> Result<MockResponse, MockFailure> + Send + Sync + 'static,
    {
        Self::Callback(Responder::new(f))
    }
}

impl From<MockResponse> for QueuedResponse {
    fn from(response: MockResponse) -> Self {
        Self::Response(response)
    }
}

impl From<MockFailure> for QueuedResponse {
    fn from(failure: MockFailure) -> Self {
        Self::Failure(failure)
    }
}

impl From<StatusCode> for QueuedResponse {
    fn from(status: StatusCode) -> Self {
        Self::Response(MockResponse::with_status(status))
    }
}

/// Shared FIFO of queued responses.
#[derive(Debug, Clone, Default)]
pub struct ResponseQueue {
    entries: Arc<Mutex<VecDeque<QueuedResponse>>>,
}

impl ResponseQueue {
    pub fn push(&self, entry: QueuedResponse) {
        self.entries.lock().push_back(entry);
    }

    pub fn extend<I>(&self, entries: I)
    where
        I: IntoIterator<Item = QueuedResponse>,
    {
        self.entries.lock().extend(entries);
    }

    /// Remove and return the oldest entry
    pub fn pop(&self) -> Option<QueuedResponse> {
        self.entries.lock().pop_front()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
