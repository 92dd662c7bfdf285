use crate::error::HttpError;
use http::{HeaderMap, HeaderName, HeaderValue, Request, Response};
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Tower layer that adds the client's default headers (User-Agent included)
/// to every request that does not already carry them
#[derive(Clone, Debug)]
pub struct DefaultHeadersLayer {
    headers: HeaderMap,
}

impl DefaultHeadersLayer {
    /// Layer that only sets the User-Agent
    #[must_use]
    pub fn new(user_agent: HeaderValue) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(http::header::USER_AGENT, user_agent);
        Self { headers }
    }

    /// Build the layer from a user agent and additional header pairs
    ///
    /// # Errors
    /// Returns `HttpError::InvalidHeaderName`/`InvalidHeaderValue` for malformed input
    pub fn try_new<'a, I>(user_agent: &str, headers: I) -> Result<Self, HttpError>
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        let mut map = HeaderMap::new();
        map.insert(http::header::USER_AGENT, HeaderValue::from_str(user_agent)?);
        for (name, value) in headers {
            map.insert(
                HeaderName::try_from(name.as_str())?,
                HeaderValue::from_str(value)?,
            );
        }
        Ok(Self { headers: map })
    }
}

impl<S> Layer<S> for DefaultHeadersLayer {
    type Service = DefaultHeadersService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        DefaultHeadersService {
            inner,
            headers: self.headers.clone(),
        }
    }
}

/// Service that adds default headers to requests
#[derive(Clone, Debug)]
pub struct DefaultHeadersService<S> {
    inner: S,
    headers: HeaderMap,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for DefaultHeadersService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        for (name, value) in &self.headers {
            if !req.headers().contains_key(name) {
                req.headers_mut().insert(name.clone(), value.clone());
            }
        }
        self.inner.call(req)
    }
}
