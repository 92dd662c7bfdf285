#![allow(clippy::unwrap_used, clippy::expect_used)]

//! End-to-end tests: clients obtained from a `MockSession` dispatching into
//! its queue, history and expectations

use bytes::Bytes;
use http::{Method, Request, StatusCode};
use http_body_util::Full;
use modkit_http_mock::{
    AssertionCounter, ClientOptions, HistoryField, HistoryValue, HttpError, InvalidUriKind,
    MockError, MockFailure, MockResponse, MockService, MockSession, QueuedResponse, Times,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use tower::util::BoxCloneSyncService;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct User {
    id: u32,
    name: String,
}

#[tokio::test]
async fn test_responses_dispensed_in_fifo_order() {
    init_tracing();
    let session = MockSession::new();
    session.queue_response([
        MockResponse::new(200).body("first"),
        MockResponse::new(201).body("second"),
        MockResponse::new(204),
    ]);

    let client = session.client();
    let r1 = client.get("http://api.local/a").send().await.unwrap();
    let r2 = client.post("http://api.local/b").send().await.unwrap();
    let r3 = client.delete("http://api.local/c").send().await.unwrap();

    assert_eq!(r1.status(), StatusCode::OK);
    assert_eq!(r1.text().await.unwrap(), "first");
    assert_eq!(r2.status(), StatusCode::CREATED);
    assert_eq!(r2.text().await.unwrap(), "second");
    assert_eq!(r3.status(), StatusCode::NO_CONTENT);

    assert_eq!(session.history_count(), 3);
    assert_eq!(session.queue_count(), 0);
    session.verify().unwrap();
}

#[tokio::test]
async fn test_history_entry_beyond_recorded_is_out_of_range() {
    let session = MockSession::new();
    session.queue_many(MockResponse::ok(), 2);

    let client = session.client();
    client.get("http://api.local/one").send().await.unwrap();
    client.get("http://api.local/two").send().await.unwrap();

    assert_eq!(session.history_entry(1).unwrap().request.path(), "/two");
    assert_eq!(
        session.history_entry(2).unwrap_err(),
        MockError::OutOfRange { index: 2, len: 2 }
    );
}

#[tokio::test]
async fn test_queue_many_then_exhausted() {
    let session = MockSession::new();
    session.queue_many(MockResponse::ok(), 3);

    let client = session.client();
    for _ in 0..3 {
        let resp = client.get("http://api.local/poll").send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let err = client.get("http://api.local/poll").send().await.unwrap_err();
    assert!(err.is_queue_exhausted());
    assert!(matches!(err, HttpError::QueueExhausted { ref method, .. } if *method == Method::GET));

    // rejected requests never reach the history
    assert_eq!(session.history_count(), 3);
}

#[tokio::test]
async fn test_expectation_on_path_passes() {
    let session = MockSession::new();
    session
        .expects(Times::once())
        .get("/users")
        .will(MockResponse::ok().json(&json!([{"id": 1, "name": "alice"}])).unwrap());

    let client = session
        .client_builder()
        .base_url("https://api.local/")
        .build()
        .unwrap();
    let users: Vec<User> = client.get("/users").send().await.unwrap().json().await.unwrap();

    assert_eq!(
        users,
        vec![User {
            id: 1,
            name: "alice".to_owned()
        }]
    );
    session.verify().unwrap();
}

#[tokio::test]
async fn test_assertions_counted_before_any_request() {
    let reporter = Arc::new(AssertionCounter::new());
    let session = MockSession::with_reporter(reporter.clone());

    session.expects(Times::any()).get("/a");
    session.expects(Times::never()).delete("/a");
    session.expects(Times::at_most(5)).with_header("x-unused", "1");

    assert_eq!(reporter.assertions(), 3);
    assert_eq!(session.assertion_count(), 3);
    assert_eq!(session.history_count(), 0);
    session.verify().unwrap();
    assert_eq!(reporter.failures(), 0);
}

#[tokio::test]
async fn test_failed_expectation_reported_by_verify() {
    let reporter = Arc::new(AssertionCounter::new());
    let session = MockSession::with_reporter(reporter.clone());
    session.queue_response([StatusCode::OK]);
    session
        .expects(Times::once())
        .post("/users")
        .with_json(&json!({"name": "alice"}));

    let client = session.client();
    client
        .post("http://api.local/users")
        .json(&json!({"name": "bob"}))
        .unwrap()
        .send()
        .await
        .unwrap();

    let err = session.verify().unwrap_err();
    assert_eq!(err.failures.len(), 1);
    let failure = &err.failures[0];
    assert_eq!(failure.matched, 0);
    assert_eq!(failure.total, 1);

    let rendered = err.to_string();
    assert!(rendered.contains("1 expectation(s) failed"));
    assert!(rendered.contains("method is POST: matched 1 request(s)"));
    assert!(rendered.contains("URI is /users: matched 1 request(s)"));
    assert_eq!(reporter.failures(), 1);
}

#[tokio::test]
#[should_panic(expected = "mock session dropped with failed expectations")]
async fn test_unverified_failure_panics_on_drop() {
    let session = MockSession::new();
    session.expects(Times::exactly(2)).get("/twice");
    session.queue_response([StatusCode::OK]);
    session
        .client()
        .get("http://api.local/twice")
        .send()
        .await
        .unwrap();
}

#[tokio::test]
async fn test_default_headers_and_request_overrides() {
    let session = MockSession::new();
    session.queue_many(StatusCode::OK, 2);

    let client = session
        .new_client(ClientOptions {
            base_url: Some("https://api.local/v1/".to_owned()),
            user_agent: "svc/2.0".to_owned(),
            headers: [("x-tenant".to_owned(), "acme".to_owned())].into(),
            ..Default::default()
        })
        .unwrap();

    client.get("items").send().await.unwrap();
    client
        .get("items")
        .header("x-tenant", "other")
        .query(&[("page", "2")])
        .send()
        .await
        .unwrap();

    let first = session.history_entry(0).unwrap().request;
    assert_eq!(first.uri.to_string(), "https://api.local/v1/items");
    assert_eq!(first.header("user-agent"), Some("svc/2.0"));
    assert_eq!(first.header("x-tenant"), Some("acme"));

    let second = session.history_entry(1).unwrap().request;
    assert_eq!(second.header("x-tenant"), Some("other"));
    assert_eq!(second.query_pairs(), vec![("page".to_owned(), "2".to_owned())]);

    session.expects(Times::once()).with_uri("/v1/items?page=2");
    session.expects(Times::exactly(2)).with_header("User-Agent", "svc/2.0");
    session.verify().unwrap();
}

#[tokio::test]
async fn test_relative_url_without_base_is_rejected() {
    let session = MockSession::new();
    session.queue_response([StatusCode::OK]);

    let err = session.client().get("/users").send().await.unwrap_err();
    assert!(matches!(
        err,
        HttpError::InvalidUri {
            kind: InvalidUriKind::MissingAuthority,
            ..
        }
    ));

    let err = session.client().get("ftp://api.local/x").send().await.unwrap_err();
    assert!(matches!(err, HttpError::InvalidScheme { .. }));

    // nothing was dispatched
    assert_eq!(session.history_count(), 0);
    assert_eq!(session.queue_count(), 1);
}

#[tokio::test]
async fn test_http_errors_option_turns_status_into_error() {
    let session = MockSession::new();
    session.queue_many(MockResponse::new(404).body("no such user"), 2);

    let lenient = session.client();
    let resp = lenient.get("http://api.local/users/9").send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let strict = session.client_builder().http_errors(true).build().unwrap();
    let err = strict.get("http://api.local/users/9").send().await.unwrap_err();
    match err {
        HttpError::HttpStatus {
            status,
            body_preview,
            ..
        } => {
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert_eq!(body_preview, "no such user");
        }
        other => panic!("expected HttpStatus, got {other:?}"),
    }

    // both transactions carry the 404 response
    let last = session.last_transaction().unwrap();
    assert_eq!(last.response.unwrap().status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delayed_response_times_out() {
    let session = MockSession::new();
    session.queue_response([MockResponse::ok().delay(Duration::from_secs(5))]);

    let client = session
        .client_builder()
        .timeout(Duration::from_millis(20))
        .build()
        .unwrap();
    let err = client.get("http://api.local/slow").send().await.unwrap_err();
    assert!(matches!(err, HttpError::Timeout(d) if d == Duration::from_millis(20)));

    match session.history_field(0, HistoryField::Options).unwrap() {
        HistoryValue::Options(options) => {
            assert_eq!(options.timeout, Some(Duration::from_millis(20)));
        }
        other => panic!("expected options, got {other:?}"),
    }
    match session.history_field(0, HistoryField::Error).unwrap() {
        HistoryValue::Error(Some(message)) => assert!(message.contains("timed out")),
        other => panic!("expected recorded error, got {other:?}"),
    }

    session
        .expects(Times::once())
        .with_timeout(Duration::from_millis(20));
    session.verify().unwrap();
}

#[tokio::test]
async fn test_queued_failures_and_callbacks() {
    let session = MockSession::new();
    session.queue_response([
        QueuedResponse::from(MockFailure::transport("connection refused")),
        QueuedResponse::callback(|req| {
            Ok(MockResponse::ok().body(format!("echo {}", req.body_text())))
        }),
    ]);

    let client = session.client();
    let err = client.get("http://api.local/x").send().await.unwrap_err();
    assert!(matches!(err, HttpError::Transport(_)));
    assert!(err.to_string().contains("connection refused"));

    let resp = client
        .put("http://api.local/x")
        .body_string("ping".to_owned())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.text().await.unwrap(), "echo ping");

    let first = session.history_entry(0).unwrap();
    assert!(first.response.is_none());
    assert!(first.error.unwrap().contains("connection refused"));

    session.expects(Times::once()).at_index(1).put("/x").with_body("ping");
    session.verify().unwrap();
}

#[tokio::test]
async fn test_form_and_query_predicates() {
    let session = MockSession::new();
    session.queue_response([MockResponse::ok().json(&json!({"access_token": "t"})).unwrap()]);

    session
        .client()
        .post("http://auth.local/token")
        .query(&[("realm", "test")])
        .form(&[("grant_type", "client_credentials"), ("scope", "read")])
        .unwrap()
        .send()
        .await
        .unwrap();

    let request = session.last_transaction().unwrap().request;
    assert_eq!(
        request.header("content-type"),
        Some("application/x-www-form-urlencoded")
    );

    session
        .expects(Times::once())
        .post("/token")
        .with_query("realm", "test")
        .with_form([("grant_type", "client_credentials")])
        .with_body_containing("scope=read");
    session.verify().unwrap();
}

#[tokio::test]
async fn test_wrapped_middleware_runs_before_history() {
    let session = MockSession::new();
    session.queue_response([StatusCode::OK]);

    let client = session
        .client_builder()
        .wrap(|inner: MockService| {
            BoxCloneSyncService::new(inner.map_request(|mut req: Request<Full<Bytes>>| {
                req.headers_mut()
                    .insert("x-signed", http::HeaderValue::from_static("yes"));
                req
            }))
        })
        .build()
        .unwrap();
    client.get("http://api.local/signed").send().await.unwrap();

    session
        .expects(Times::once())
        .with_callback("request is signed", |tx| {
            tx.request.header("x-signed") == Some("yes")
        });
    session.verify().unwrap();
}

#[tokio::test]
async fn test_bare_service_records_history() {
    let session = MockSession::new();
    session.queue_response([StatusCode::ACCEPTED]);

    let request = Request::builder()
        .method(Method::PATCH)
        .uri("http://api.local/direct")
        .body(Full::new(Bytes::from_static(b"{}")))
        .unwrap();
    let response = session.service().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(session.history_count(), 1);
    session.expects(Times::once()).patch("http://api.local/direct");
    session.verify().unwrap();
}

#[tokio::test]
async fn test_verify_reports_failures_in_registration_order() {
    let session = MockSession::new();
    session.queue_many(StatusCode::OK, 2);

    session.expects(Times::once()).delete("/users/1");
    session.expects(Times::exactly(2)).get("/users");
    session.expects(Times::at_least_once()).with_header("authorization", "Bearer x");

    let client = session.client();
    client.get("http://api.local/users").send().await.unwrap();
    client.get("http://api.local/users").send().await.unwrap();

    let err = session.verify().unwrap_err();
    assert_eq!(err.failures.len(), 2);
    assert_eq!(err.failures[0].position, 0);
    assert_eq!(err.failures[1].position, 2);
    assert!(err.to_string().starts_with("2 expectation(s) failed"));
}

#[tokio::test]
async fn test_uri_expectation_ignores_other_paths() {
    let session = MockSession::new();
    session.queue_many(StatusCode::OK, 2);

    let client = session.client();
    client.get("http://api.local/users").send().await.unwrap();
    client.get("http://api.local/posts").send().await.unwrap();

    session.expects(Times::once()).with_uri("/users");
    assert!(session.verify().is_ok());
}

#[tokio::test]
async fn test_queue_many_zero_is_a_no_op() {
    let session = MockSession::new();
    session.queue_many(MockResponse::ok(), 0);
    assert_eq!(session.queue_count(), 0);

    let err = session.client().get("http://api.local/x").send().await.unwrap_err();
    assert!(err.is_queue_exhausted());
}

#[tokio::test]
async fn test_default_client_sends_default_user_agent() {
    let session = MockSession::new();
    session.queue_response([StatusCode::OK]);

    session.client().get("http://api.local/ua").send().await.unwrap();

    let request = session.last_transaction().unwrap().request;
    assert_eq!(
        request.header("user-agent"),
        Some(modkit_http_mock::DEFAULT_USER_AGENT)
    );
}

#[tokio::test]
async fn test_immediate_history_assertions() {
    let reporter = Arc::new(AssertionCounter::new());
    let session = MockSession::with_reporter(reporter.clone());
    session.queue_many(StatusCode::OK, 3);

    let client = session
        .client_builder()
        .base_url("https://api.local/")
        .build()
        .unwrap();
    client
        .post("/token")
        .form(&[("grant_type", "client_credentials")])
        .unwrap()
        .send()
        .await
        .unwrap();
    client.get("/users").query(&[("page", "1")]).send().await.unwrap();
    client.get("/users").query(&[("page", "2")]).send().await.unwrap();

    session.assert_history_count(3);
    session.assert_first(|e| e.post("/token").with_form([("grant_type", "client_credentials")]));
    session.assert_last(|e| e.get("/users").with_query("page", "2"));
    session.assert_indexes(&[1, 2], |e| e.get("/users"));
    session.assert_all(|e| e.with_header("user-agent", modkit_http_mock::DEFAULT_USER_AGENT));
    session.assert_none(|e| e.with_method(Method::DELETE));

    assert_eq!(reporter.assertions(), 6);
    assert_eq!(session.expectation_count(), 0);
    session.verify().unwrap();
}

#[tokio::test]
#[should_panic(expected = "history assertion `last` failed: #0 did not match")]
async fn test_immediate_assertion_failure_panics() {
    let session = MockSession::new();
    session.queue_response([StatusCode::OK]);
    session.client().get("http://api.local/a").send().await.unwrap();

    session.assert_last(|e| e.get("/b"));
}
