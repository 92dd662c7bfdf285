#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! Scripted HTTP mocking for `ModKit` tests
//!
//! A [`MockSession`] intercepts every request sent by clients it hands out:
//! - Responses are dispensed from a FIFO queue, one per request
//! - Every dispatched transaction is recorded in an ordered history
//! - Expectations (`expects(Times::once()).get("/users")`) are deferred and
//!   evaluated once, against the complete history, when the session is
//!   verified or dropped
//! - Each registered expectation is announced to an [`AssertionReporter`]
//!   immediately, so test frameworks can count it
//! - Immediate history assertions (`assert_history_count`, `assert_first`,
//!   `assert_last`, `assert_all`, `assert_none`, `assert_indexes`) check the
//!   history as it stands and panic on failure
//!
//! No network I/O ever happens; an empty queue yields
//! [`HttpError::QueueExhausted`].
//!
//! # URI matching
//!
//! [`Expectation::with_uri`] compares the full URI when given an absolute URL,
//! the path when given a `/`-prefixed value, and the path-and-query when that
//! value also contains `?`.
//!
//! # Example
//!
//! ```ignore
//! use modkit_http_mock::{MockResponse, MockSession, Times};
//!
//! let session = MockSession::new();
//! session
//!     .expects(Times::once())
//!     .get("/users")
//!     .will(MockResponse::ok().json(&json!([{"id": 1}]))?);
//!
//! let client = session.client_builder().base_url("https://api.local/").build()?;
//! let users: Vec<User> = client.get("/users").send().await?.json().await?;
//!
//! assert_eq!(session.history_count(), 1);
//! session.verify()?;
//! ```

mod builder;
mod client;
mod config;
mod error;
mod expectation;
mod history;
mod layers;
mod queue;
mod reporter;
mod request;
mod response;
mod session;

pub use builder::HttpClientBuilder;
pub use client::{HttpClient, MockService};
pub use config::{ClientOptions, DEFAULT_MAX_BODY_SIZE, DEFAULT_USER_AGENT, TransferOptions};
pub use error::{HttpError, InvalidUriKind, MockError, SimulatedTransportError, VerificationError};
pub use expectation::{Expectation, ExpectationFailure, PredicateReport, Times};
pub use history::{History, HistoryField, HistoryValue, RecordedRequest, RecordedResponse, Transaction};
pub use layers::{
    DefaultHeadersLayer, DefaultHeadersService, HistoryLayer, HistoryService, MockHandler,
};
pub use queue::{MockFailure, MockResponse, QueuedResponse, Responder, ResponseQueue};
pub use reporter::{AssertionCounter, AssertionReporter};
pub use request::RequestBuilder;
pub use response::HttpResponse;
pub use session::{HistoryAssertionFailure, MockSession};
