use bytes::Bytes;
use http::{Request, Response};
use http_body_util::{BodyExt, Full};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tower::{Layer, Service};

use crate::config::TransferOptions;
use crate::error::HttpError;
use crate::history::{History, RecordedRequest, RecordedResponse, Transaction};

/// Tower layer that appends every request/response pair to a [`History`].
///
/// Requests rejected with [`HttpError::QueueExhausted`] are not recorded:
/// they never produced a transaction.
#[derive(Clone, Debug)]
pub struct HistoryLayer {
    history: History,
}

impl HistoryLayer {
    #[must_use]
    pub fn new(history: History) -> Self {
        Self { history }
    }
}

impl<S> Layer<S> for HistoryLayer {
    type Service = HistoryService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        HistoryService {
            inner,
            history: self.history.clone(),
        }
    }
}

/// Service produced by [`HistoryLayer`]
#[derive(Clone, Debug)]
pub struct HistoryService<S> {
    inner: S,
    history: History,
}

impl<S> Service<Request<Full<Bytes>>> for HistoryService<S>
where
    S: Service<Request<Full<Bytes>>, Response = Response<Full<Bytes>>, Error = HttpError>
        + Clone
        + Send
        + 'static,
    S::Future: Send,
{
    type Response = Response<Full<Bytes>>;
    type Error = HttpError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Full<Bytes>>) -> Self::Future {
        // Swap so we consume the instance that was poll_ready'd,
        // leaving a fresh clone for the next poll_ready cycle.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let history = self.history.clone();

        Box::pin(async move {
            let (parts, body) = req.into_parts();
            let body = collect(body).await;
            let request = RecordedRequest::from_parts(&parts, body.clone());
            let options = parts
                .extensions
                .get::<TransferOptions>()
                .cloned()
                .unwrap_or_default();

            match inner.call(Request::from_parts(parts, Full::new(body))).await {
                Ok(response) => {
                    let (parts, body) = response.into_parts();
                    let body = collect(body).await;
                    history.record(Transaction {
                        request,
                        response: Some(RecordedResponse::from_parts(&parts, body.clone())),
                        error: None,
                        options,
                    });
                    Ok(Response::from_parts(parts, Full::new(body)))
                }
                Err(err) if err.is_queue_exhausted() => Err(err),
                Err(err) => {
                    history.record(Transaction {
                        request,
                        response: None,
                        error: Some(err.to_string()),
                        options,
                    });
                    Err(err)
                }
            }
        })
    }
}

async fn collect(body: Full<Bytes>) -> Bytes {
    match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(never) => match never {},
    }
}
