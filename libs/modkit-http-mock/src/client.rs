use crate::request::RequestBuilder;
use bytes::Bytes;
use http::{Method, Request, Response};
use http_body_util::Full;
use std::time::Duration;
use tower::util::BoxCloneSyncService;

use crate::error::HttpError;

/// Type-erased interception pipeline every client request goes through
pub type MockService = BoxCloneSyncService<Request<Full<Bytes>>, Response<Full<Bytes>>, HttpError>;

/// HTTP client whose transport is a [`MockSession`](crate::MockSession)'s
/// handler stack
///
/// `HttpClient` is `Clone + Send + Sync`; cloning is cheap and every clone
/// dispatches into the same response queue and history.
///
/// Obtain one from [`MockSession::client`](crate::MockSession::client),
/// [`MockSession::new_client`](crate::MockSession::new_client) or
/// [`MockSession::client_builder`](crate::MockSession::client_builder).
///
/// # Example
///
/// ```ignore
/// let session = MockSession::new();
/// session.queue_response([MockResponse::ok().json(&json!({"id": 1}))?]);
///
/// let client = session.new_client(ClientOptions {
///     base_url: Some("https://api.example.com/".to_owned()),
///     ..Default::default()
/// })?;
/// let user: User = client.get("/users/1").send().await?.json().await?;
/// ```
#[derive(Clone)]
pub struct HttpClient {
    pub(crate) service: MockService,
    pub(crate) base_url: Option<url::Url>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) max_body_size: usize,
    pub(crate) http_errors: bool,
}

impl HttpClient {
    /// Create a request builder for an arbitrary method
    ///
    /// `url` may be absolute or, when the client has a base URL, relative to it.
    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        RequestBuilder::new(self.clone(), method, url.to_owned())
    }

    /// Create a GET request builder
    ///
    /// ```ignore
    /// let resp = client.get("/users?page=2").send().await?;
    /// ```
    pub fn get(&self, url: &str) -> RequestBuilder {
        self.request(Method::GET, url)
    }

    /// Create a POST request builder
    ///
    /// Use `.json()`, `.form()` or `.body_bytes()` to set the body.
    pub fn post(&self, url: &str) -> RequestBuilder {
        self.request(Method::POST, url)
    }

    /// Create a PUT request builder
    pub fn put(&self, url: &str) -> RequestBuilder {
        self.request(Method::PUT, url)
    }

    /// Create a PATCH request builder
    pub fn patch(&self, url: &str) -> RequestBuilder {
        self.request(Method::PATCH, url)
    }

    /// Create a DELETE request builder
    pub fn delete(&self, url: &str) -> RequestBuilder {
        self.request(Method::DELETE, url)
    }

    /// Create a HEAD request builder
    pub fn head(&self, url: &str) -> RequestBuilder {
        self.request(Method::HEAD, url)
    }

    /// Base URL relative request URLs are resolved against
    #[must_use]
    pub fn base_url(&self) -> Option<&url::Url> {
        self.base_url.as_ref()
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.base_url.as_ref().map(url::Url::as_str))
            .field("timeout", &self.timeout)
            .field("max_body_size", &self.max_body_size)
            .field("http_errors", &self.http_errors)
            .finish_non_exhaustive()
    }
}
