use bytes::Bytes;
use http::{Request, Response};
use http_body_util::{BodyExt, Full};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tower::Service;

use crate::config::TransferOptions;
use crate::error::HttpError;
use crate::history::RecordedRequest;
use crate::queue::{MockFailure, MockResponse, QueuedResponse, ResponseQueue};

/// Innermost service of the handler stack: answers every request with the
/// next entry of a [`ResponseQueue`].
///
/// An empty queue fails the request with [`HttpError::QueueExhausted`].
#[derive(Clone, Debug)]
pub struct MockHandler {
    queue: ResponseQueue,
}

impl MockHandler {
    #[must_use]
    pub fn new(queue: ResponseQueue) -> Self {
        Self { queue }
    }
}

impl Service<Request<Full<Bytes>>> for MockHandler {
    type Response = Response<Full<Bytes>>;
    type Error = HttpError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Full<Bytes>>) -> Self::Future {
        let entry = self.queue.pop();
        let remaining = self.queue.len();

        Box::pin(async move {
            let (parts, body) = req.into_parts();

            let Some(entry) = entry else {
                tracing::warn!(
                    method = %parts.method,
                    uri = %parts.uri,
                    "mock queue is empty"
                );
                return Err(HttpError::QueueExhausted {
                    method: parts.method,
                    uri: parts.uri.to_string(),
                });
            };

            tracing::debug!(
                method = %parts.method,
                uri = %parts.uri,
                remaining,
                "dispensing queued mock response"
            );

            let timeout = parts
                .extensions
                .get::<TransferOptions>()
                .and_then(|options| options.timeout);

            let response = match entry {
                QueuedResponse::Response(response) => response,
                QueuedResponse::Failure(failure) => return Err(failure.into_error()),
                QueuedResponse::Callback(responder) => {
                    let body = match body.collect().await {
                        Ok(collected) => collected.to_bytes(),
                        Err(never) => match never {},
                    };
                    let request = RecordedRequest::from_parts(&parts, body);
                    responder
                        .respond(&request)
                        .map_err(MockFailure::into_error)?
                }
            };

            dispense(response, timeout).await
        })
    }
}

async fn dispense(
    response: MockResponse,
    timeout: Option<Duration>,
) -> Result<Response<Full<Bytes>>, HttpError> {
    if let Some(delay) = response.delay {
        if let Some(timeout) = timeout
            && delay > timeout
        {
            tokio::time::sleep(timeout).await;
            return Err(HttpError::Timeout(timeout));
        }
        tokio::time::sleep(delay).await;
    }

    Ok(response.into_http()?.map(Full::new))
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use http::{Method, StatusCode};
    use tower::ServiceExt;

    fn request(uri: &str) -> Request<Full<Bytes>> {
        Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_dispenses_in_queue_order() {
        let queue = ResponseQueue::default();
        queue.push(MockResponse::new(200).body("first").into());
        queue.push(MockResponse::new(404).body("second").into());
        let handler = MockHandler::new(queue.clone());

        let first = handler.clone().oneshot(request("http://x/a")).await.unwrap();
        let second = handler.clone().oneshot(request("http://x/b")).await.unwrap();

        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(second.status(), StatusCode::NOT_FOUND);
        let body = second.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"second");
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_empty_queue_fails() {
        let handler = MockHandler::new(ResponseQueue::default());
        let err = handler.oneshot(request("http://x/none")).await.unwrap_err();
        match err {
            HttpError::QueueExhausted { method, uri } => {
                assert_eq!(method, Method::GET);
                assert_eq!(uri, "http://x/none");
            }
            other => panic!("expected QueueExhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_queued_failure_is_raised() {
        let queue = ResponseQueue::default();
        queue.push(MockFailure::transport("connection reset").into());
        let err = MockHandler::new(queue)
            .oneshot(request("http://x/"))
            .await
            .unwrap_err();
        assert!(matches!(err, HttpError::Transport(_)));
        assert_eq!(err.to_string(), "Transport error: connection reset");
    }

    #[tokio::test]
    async fn test_callback_sees_request() {
        let queue = ResponseQueue::default();
        queue.push(QueuedResponse::callback(|req| {
            Ok(MockResponse::ok().body(format!("echo {}", req.path())))
        }));
        let response = MockHandler::new(queue)
            .oneshot(request("http://x/ping"))
            .await
            .unwrap();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"echo /ping");
    }

    #[tokio::test]
    async fn test_delay_beyond_timeout_fails() {
        let queue = ResponseQueue::default();
        queue.push(MockResponse::ok().delay(Duration::from_millis(200)).into());

        let mut req = request("http://x/slow");
        req.extensions_mut().insert(TransferOptions {
            timeout: Some(Duration::from_millis(5)),
        });

        let err = MockHandler::new(queue).oneshot(req).await.unwrap_err();
        assert!(matches!(err, HttpError::Timeout(d) if d == Duration::from_millis(5)));
    }
}
