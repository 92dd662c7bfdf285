use crate::client::HttpClient;
use crate::config::TransferOptions;
use crate::error::{HttpError, InvalidUriKind};
use crate::response::{HttpResponse, status_error};
use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use http::{Method, Request, Version};
use http_body_util::Full;
use serde::Serialize;
use std::time::Duration;
use tower::ServiceExt;

/// Body type for the request builder
#[derive(Clone, Debug)]
enum BodyKind {
    Empty,
    Bytes(Bytes),
    /// JSON-serialized body (stored as bytes after serialization)
    Json(Bytes),
    /// Form URL-encoded body (stored as bytes after serialization)
    Form(Bytes),
}

/// HTTP request builder with fluent API
///
/// Created by [`HttpClient::get`], [`HttpClient::post`], etc.
/// Header errors are captured and reported by [`send()`](RequestBuilder::send).
///
/// ```ignore
/// let resp = client
///     .post("/users")
///     .header("x-request-id", "123")
///     .json(&NewUser { name: "Alice" })?
///     .timeout(Duration::from_millis(100))
///     .send()
///     .await?;
/// ```
#[must_use = "RequestBuilder does nothing until .send() is called"]
pub struct RequestBuilder {
    client: HttpClient,
    method: Method,
    url: String,
    headers: Vec<(HeaderName, HeaderValue)>,
    query: Vec<(String, String)>,
    body: BodyKind,
    timeout: Option<Duration>,
    version: Option<Version>,
    /// Error captured during building (deferred to `send()`)
    error: Option<HttpError>,
}

impl RequestBuilder {
    pub(crate) fn new(client: HttpClient, method: Method, url: String) -> Self {
        Self {
            client,
            method,
            url,
            headers: Vec::new(),
            query: Vec::new(),
            body: BodyKind::Empty,
            timeout: None,
            version: None,
            error: None,
        }
    }

    /// Add a single header to the request
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if self.error.is_some() {
            return self;
        }

        match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            (Ok(name), Ok(value)) => {
                self.headers.push((name, value));
            }
            (Err(e), _) => {
                self.error = Some(HttpError::InvalidHeaderName(e));
            }
            (_, Err(e)) => {
                self.error = Some(HttpError::InvalidHeaderValue(e));
            }
        }
        self
    }

    /// Add multiple headers to the request
    pub fn headers(mut self, headers: Vec<(String, String)>) -> Self {
        for (name, value) in headers {
            self = self.header(&name, &value);
        }
        self
    }

    /// Append query-string pairs to the URL
    pub fn query(mut self, pairs: &[(&str, &str)]) -> Self {
        self.query.extend(
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned())),
        );
        self
    }

    /// Set request body as JSON
    ///
    /// Sets Content-Type to application/json unless one was already provided.
    ///
    /// # Errors
    ///
    /// Returns `Err(HttpError::Json)` if serialization fails.
    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self, HttpError> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }

        self.body = BodyKind::Json(Bytes::from(serde_json::to_vec(body)?));
        Ok(self)
    }

    /// Set request body as form URL-encoded
    ///
    /// Sets Content-Type to application/x-www-form-urlencoded unless one was already provided.
    ///
    /// # Errors
    ///
    /// Returns `Err(HttpError::FormEncode)` if encoding fails.
    pub fn form(mut self, fields: &[(&str, &str)]) -> Result<Self, HttpError> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }

        self.body = BodyKind::Form(Bytes::from(serde_urlencoded::to_string(fields)?));
        Ok(self)
    }

    pub fn body_bytes(mut self, body: Bytes) -> Self {
        self.body = BodyKind::Bytes(body);
        self
    }

    pub fn body_string(mut self, body: String) -> Self {
        self.body = BodyKind::Bytes(Bytes::from(body));
        self
    }

    /// Override the client's default timeout for this request
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn version(mut self, version: Version) -> Self {
        self.version = Some(version);
        self
    }

    /// Resolve the URL against the client's base URL and validate it.
    fn resolve_url(&self) -> Result<http::Uri, HttpError> {
        let invalid = |kind: InvalidUriKind, reason: String| HttpError::InvalidUri {
            url: self.url.clone(),
            kind,
            reason,
        };

        let mut url = match url::Url::parse(&self.url) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => match &self.client.base_url {
                Some(base) => base
                    .join(&self.url)
                    .map_err(|e| invalid(InvalidUriKind::ParseError, e.to_string()))?,
                None => {
                    return Err(invalid(
                        InvalidUriKind::MissingAuthority,
                        "relative URL and no base URL configured".to_owned(),
                    ));
                }
            },
            Err(e) => return Err(invalid(InvalidUriKind::ParseError, e.to_string())),
        };

        match url.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(HttpError::InvalidScheme {
                    scheme: scheme.to_owned(),
                    reason: "only http:// and https:// schemes are supported".to_owned(),
                });
            }
        }

        if !self.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&self.query);
        }

        url.as_str()
            .parse()
            .map_err(|e: http::uri::InvalidUri| invalid(InvalidUriKind::ParseError, e.to_string()))
    }

    /// Send the request through the client's handler stack
    ///
    /// # Errors
    ///
    /// Returns builder errors (invalid header, URL or scheme), errors raised by
    /// the mock handler (`QueueExhausted`, queued `Transport`/`Timeout`
    /// failures), and `HttpStatus` for non-2xx responses when the client was
    /// built with `http_errors` enabled.
    pub async fn send(mut self) -> Result<HttpResponse, HttpError> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }

        let uri = self.resolve_url()?;

        let mut builder = Request::builder().method(self.method).uri(uri);
        if let Some(version) = self.version {
            builder = builder.version(version);
        }

        let has_content_type = self.headers.iter().any(|(name, _)| name == CONTENT_TYPE);
        for (name, value) in self.headers {
            builder = builder.header(name, value);
        }

        let body = match self.body {
            BodyKind::Empty => Bytes::new(),
            BodyKind::Bytes(bytes) => bytes,
            BodyKind::Json(bytes) => {
                if !has_content_type {
                    builder = builder.header(CONTENT_TYPE, "application/json");
                }
                bytes
            }
            BodyKind::Form(bytes) => {
                if !has_content_type {
                    builder = builder.header(CONTENT_TYPE, "application/x-www-form-urlencoded");
                }
                bytes
            }
        };

        let mut request = builder.body(Full::new(body))?;
        request.extensions_mut().insert(TransferOptions {
            timeout: self.timeout.or(self.client.timeout),
        });

        let response = self.client.service.clone().oneshot(request).await?;

        if self.client.http_errors && !response.status().is_success() {
            return Err(status_error(response, self.client.max_body_size).await);
        }

        Ok(HttpResponse {
            inner: response,
            max_body_size: self.client.max_body_size,
        })
    }
}
