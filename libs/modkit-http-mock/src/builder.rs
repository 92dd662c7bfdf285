use crate::client::{HttpClient, MockService};
use crate::config::ClientOptions;
use crate::error::{HttpError, InvalidUriKind};
use crate::layers::DefaultHeadersLayer;
use std::time::Duration;
use tower::Layer;
use tower::util::BoxCloneSyncService;

type Middleware = Box<dyn FnOnce(MockService) -> MockService + Send>;

/// Builder for an [`HttpClient`] bound to a session's interception pipeline.
///
/// Caller options are layered on top of the pipeline; none of them can
/// replace it. Obtain one from [`MockSession::client_builder`](crate::MockSession::client_builder).
#[must_use]
pub struct HttpClientBuilder {
    options: ClientOptions,
    pipeline: MockService,
    middleware: Vec<Middleware>,
}

impl HttpClientBuilder {
    pub(crate) fn new(pipeline: MockService) -> Self {
        Self {
            options: ClientOptions::default(),
            pipeline,
            middleware: Vec::new(),
        }
    }

    /// Replace all options at once
    pub fn options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.options.base_url = Some(base_url.into());
        self
    }

    /// Add a default header, sent unless a request sets the same header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.headers.insert(name.into(), value.into());
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.options.user_agent = user_agent.into();
        self
    }

    /// Set the default per-request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = Some(timeout);
        self
    }

    pub fn max_body_size(mut self, size: usize) -> Self {
        self.options.max_body_size = size;
        self
    }

    /// Return `HttpError::HttpStatus` from `send()` for non-2xx responses
    pub fn http_errors(mut self, enabled: bool) -> Self {
        self.options.http_errors = enabled;
        self
    }

    /// Insert caller middleware above the history layer.
    ///
    /// Stack position: `DefaultHeaders → **wrapped layers** → History → MockHandler`
    ///
    /// Layers run in the order they were added, outermost last. The history
    /// records requests as they leave the last wrapped layer.
    pub fn wrap(mut self, wrap: impl FnOnce(MockService) -> MockService + Send + 'static) -> Self {
        self.middleware.push(Box::new(wrap));
        self
    }

    /// Build the client
    ///
    /// # Errors
    /// Returns `HttpError::InvalidUri` for an unparsable base URL and
    /// `HttpError::InvalidHeaderName`/`InvalidHeaderValue` for malformed default headers.
    pub fn build(self) -> Result<HttpClient, HttpError> {
        let base_url = self
            .options
            .base_url
            .as_deref()
            .map(|raw| {
                url::Url::parse(raw).map_err(|e| HttpError::InvalidUri {
                    url: raw.to_owned(),
                    kind: InvalidUriKind::ParseError,
                    reason: e.to_string(),
                })
            })
            .transpose()?;

        let headers_layer =
            DefaultHeadersLayer::try_new(&self.options.user_agent, &self.options.headers)?;

        Ok(self.assemble(base_url, headers_layer))
    }

    /// Stack the caller middleware and `headers_layer` over the pipeline.
    ///
    /// Options must already be validated; `base_url` is their parsed form.
    pub(crate) fn assemble(
        self,
        base_url: Option<url::Url>,
        headers_layer: DefaultHeadersLayer,
    ) -> HttpClient {
        let mut service = self.pipeline;
        for wrap in self.middleware {
            service = wrap(service);
        }
        let service = BoxCloneSyncService::new(headers_layer.layer(service));

        tracing::debug!(
            base_url = ?base_url.as_ref().map(url::Url::as_str),
            timeout = ?self.options.timeout,
            http_errors = self.options.http_errors,
            "built mock HTTP client"
        );

        HttpClient {
            service,
            base_url,
            timeout: self.options.timeout,
            max_body_size: self.options.max_body_size,
            http_errors: self.options.http_errors,
        }
    }
}
