//! Deferred assertions on the recorded history.
//!
//! An [`Expectation`] is registered with [`MockSession::expects`](crate::MockSession::expects),
//! configured through its fluent methods, and evaluated exactly once when the
//! session is verified or dropped. Evaluation always sees the complete history.

mod predicate;
mod times;

pub use times::Times;

pub use predicate::{RequestPredicate, TransactionCheck};

use bytes::Bytes;
use http::{Method, Version};
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use crate::history::Transaction;
use crate::queue::QueuedResponse;
use crate::session::SessionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Accumulating,
    Evaluated,
}

/// Registered expectation, owned by the session
#[derive(Debug, Clone)]
pub struct ExpectationState {
    pub(crate) times: Times,
    pub(crate) predicates: Vec<RequestPredicate>,
    pub(crate) phase: Phase,
}

impl ExpectationState {
    pub(crate) fn new(times: Times) -> Self {
        Self {
            times,
            predicates: Vec::new(),
            phase: Phase::Accumulating,
        }
    }

    /// Filter `history` by every predicate and check the count against `times`.
    ///
    /// Moves the expectation into its terminal phase.
    pub(crate) fn evaluate(
        &mut self,
        position: usize,
        history: &[Transaction],
    ) -> Result<(), ExpectationFailure> {
        self.phase = Phase::Evaluated;

        let matched = history
            .iter()
            .enumerate()
            .filter(|(index, tx)| self.predicates.iter().all(|p| p.matches(*index, tx)))
            .count();

        if self.times.matches(matched) {
            return Ok(());
        }

        Err(ExpectationFailure {
            position,
            times: self.times,
            matched,
            total: history.len(),
            predicates: report_predicates(&self.predicates, history.iter().enumerate()),
        })
    }
}

/// Per-predicate match counts over `entries` (history index, transaction)
pub fn report_predicates<'a, I>(predicates: &[RequestPredicate], entries: I) -> Vec<PredicateReport>
where
    I: Iterator<Item = (usize, &'a Transaction)> + Clone,
{
    predicates
        .iter()
        .map(|predicate| PredicateReport {
            description: predicate.to_string(),
            matched: entries
                .clone()
                .filter(|(index, tx)| predicate.matches(*index, tx))
                .count(),
        })
        .collect()
}

/// How many history entries a single predicate matched on its own
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredicateReport {
    pub description: String,
    pub matched: usize,
}

/// An expectation whose filtered history did not satisfy its [`Times`] matcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectationFailure {
    /// Registration index of the expectation within its session
    pub position: usize,
    pub times: Times,
    /// Transactions matching every predicate
    pub matched: usize,
    /// Transactions recorded in total
    pub total: usize,
    pub predicates: Vec<PredicateReport>,
}

impl fmt::Display for ExpectationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "expectation #{} expected a matching request {}, found {} of {} recorded",
            self.position, self.times, self.matched, self.total
        )?;
        for report in &self.predicates {
            write!(
                f,
                "\n  - {}: matched {} request(s)",
                report.description, report.matched
            )?;
        }
        Ok(())
    }
}

/// Handle for configuring a registered expectation.
///
/// Holds a non-owning reference to its session plus its registration index;
/// the history is only read when the session evaluates expectations.
///
/// The immediate history assertions on [`MockSession`](crate::MockSession)
/// hand out detached handles: their predicates are collected locally and
/// never become part of the deferred set.
///
/// ```ignore
/// session
///     .expects(Times::once())
///     .post("/users")
///     .with_header("authorization", "Bearer test")
///     .with_json(&json!({ "name": "alice" }));
/// ```
#[derive(Debug, Clone)]
pub struct Expectation {
    session: Weak<SessionState>,
    slot: Slot,
}

#[derive(Debug, Clone)]
enum Slot {
    Registered(usize),
    Detached(Arc<Mutex<Vec<RequestPredicate>>>),
}

#[allow(clippy::return_self_not_must_use)] // registration already happened; the last handle in a chain is dropped
impl Expectation {
    pub(crate) fn new(session: &Arc<SessionState>, id: usize) -> Self {
        Self {
            session: Arc::downgrade(session),
            slot: Slot::Registered(id),
        }
    }

    pub(crate) fn detached(
        session: &Arc<SessionState>,
        predicates: Arc<Mutex<Vec<RequestPredicate>>>,
    ) -> Self {
        Self {
            session: Arc::downgrade(session),
            slot: Slot::Detached(predicates),
        }
    }

    /// Registration index within the session; `None` for detached handles
    #[must_use]
    pub fn id(&self) -> Option<usize> {
        match self.slot {
            Slot::Registered(id) => Some(id),
            Slot::Detached(_) => None,
        }
    }

    fn with(self, predicate: RequestPredicate) -> Self {
        match &self.slot {
            Slot::Detached(predicates) => predicates.lock().push(predicate),
            Slot::Registered(id) => match self.session.upgrade() {
                Some(session) => session.add_predicate(*id, predicate),
                None => tracing::warn!(
                    expectation = id,
                    %predicate,
                    "mock session already dropped; predicate ignored"
                ),
            },
        }
        self
    }

    /// Match the request method
    pub fn with_method(self, method: Method) -> Self {
        self.with(RequestPredicate::Method(method))
    }

    /// Match the request URI; see the crate docs for the comparison rules
    pub fn with_uri(self, uri: impl Into<String>) -> Self {
        self.with(RequestPredicate::Uri(uri.into()))
    }

    /// Match method and URI together
    pub fn with_endpoint(self, uri: impl Into<String>, method: Method) -> Self {
        self.with_method(method).with_uri(uri)
    }

    /// Shorthand for `with_endpoint(uri, Method::GET)`
    pub fn get(self, uri: impl Into<String>) -> Self {
        self.with_endpoint(uri, Method::GET)
    }

    /// Shorthand for `with_endpoint(uri, Method::POST)`
    pub fn post(self, uri: impl Into<String>) -> Self {
        self.with_endpoint(uri, Method::POST)
    }

    /// Shorthand for `with_endpoint(uri, Method::PUT)`
    pub fn put(self, uri: impl Into<String>) -> Self {
        self.with_endpoint(uri, Method::PUT)
    }

    /// Shorthand for `with_endpoint(uri, Method::PATCH)`
    pub fn patch(self, uri: impl Into<String>) -> Self {
        self.with_endpoint(uri, Method::PATCH)
    }

    /// Shorthand for `with_endpoint(uri, Method::DELETE)`
    pub fn delete(self, uri: impl Into<String>) -> Self {
        self.with_endpoint(uri, Method::DELETE)
    }

    /// Shorthand for `with_endpoint(uri, Method::HEAD)`
    pub fn head(self, uri: impl Into<String>) -> Self {
        self.with_endpoint(uri, Method::HEAD)
    }

    /// Shorthand for `with_endpoint(uri, Method::OPTIONS)`
    pub fn options(self, uri: impl Into<String>) -> Self {
        self.with_endpoint(uri, Method::OPTIONS)
    }

    /// Header names are case-insensitive; any value of a repeated header may match
    pub fn with_header(self, name: &str, value: impl Into<String>) -> Self {
        self.with(RequestPredicate::Header(
            name.to_ascii_lowercase(),
            value.into(),
        ))
    }

    /// Match every header in `headers`
    pub fn with_headers<I, K, V>(self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        headers
            .into_iter()
            .fold(self, |exp, (name, value)| exp.with_header(name.as_ref(), value))
    }

    /// Exact body match
    pub fn with_body(self, body: impl Into<Bytes>) -> Self {
        self.with(RequestPredicate::Body(body.into()))
    }

    /// Body contains `needle` (lossy UTF-8)
    pub fn with_body_containing(self, needle: impl Into<String>) -> Self {
        self.with(RequestPredicate::BodyContains(needle.into()))
    }

    /// Semantic JSON equality (key order and whitespace are ignored)
    ///
    /// A value that fails to serialize can never match.
    pub fn with_json<T: Serialize>(self, body: &T) -> Self {
        match serde_json::to_value(body) {
            Ok(value) => self.with(RequestPredicate::Json(value)),
            Err(err) => {
                tracing::warn!(error = %err, "expected JSON body failed to serialize");
                self.with_callback(format!("JSON body (unserializable: {err})"), |_| false)
            }
        }
    }

    /// Every pair must be present in the url-encoded form body
    pub fn with_form<I, K, V>(self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let pairs = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.with(RequestPredicate::Form(pairs))
    }

    /// Query string contains `key=value`
    pub fn with_query(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.with(RequestPredicate::Query(key.into(), value.into()))
    }

    /// Query string contains every pair
    pub fn with_queries<I, K, V>(self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        pairs
            .into_iter()
            .fold(self, |exp, (key, value)| exp.with_query(key, value))
    }

    /// Match the HTTP protocol version
    pub fn with_version(self, version: Version) -> Self {
        self.with(RequestPredicate::Version(version))
    }

    /// Match the effective per-request timeout the client sent with
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with(RequestPredicate::Timeout(timeout))
    }

    /// Only consider the request at this history index (0-based)
    pub fn at_index(self, index: usize) -> Self {
        self.with(RequestPredicate::Position(index))
    }

    /// Custom check; `description` is shown in failure reports
    pub fn with_callback<F>(self, description: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Transaction) -> bool + Send + Sync + 'static,
    {
        self.with(RequestPredicate::Callback {
            description: description.into(),
            check: TransactionCheck(Arc::new(check)),
        })
    }

    /// Queue a response on the session this expectation belongs to
    pub fn will(self, response: impl Into<QueuedResponse>) -> Self {
        self.will_times(response, 1)
    }

    /// Queue the same response `times` times
    pub fn will_times(self, response: impl Into<QueuedResponse>, times: usize) -> Self {
        match self.session.upgrade() {
            Some(session) => session.queue_many(response.into(), times),
            None => tracing::warn!(
                expectation = ?self.id(),
                "mock session already dropped; response not queued"
            ),
        }
        self
    }
}
