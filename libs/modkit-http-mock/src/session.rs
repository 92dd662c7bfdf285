mod assertions;

pub use assertions::HistoryAssertionFailure;

use http::HeaderValue;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tower::Layer;
use tower::util::BoxCloneSyncService;

use crate::builder::HttpClientBuilder;
use crate::client::{HttpClient, MockService};
use crate::config::{ClientOptions, DEFAULT_USER_AGENT};
use crate::error::{HttpError, MockError, VerificationError};
use crate::expectation::{
    Expectation, ExpectationFailure, ExpectationState, Phase, RequestPredicate, Times,
};
use crate::history::{History, HistoryField, HistoryValue, Transaction};
use crate::layers::{DefaultHeadersLayer, HistoryLayer, MockHandler};
use crate::queue::{QueuedResponse, ResponseQueue};
use crate::reporter::{AssertionCounter, AssertionReporter};

/// State shared between a session, its clients and its expectation handles
pub struct SessionState {
    queue: ResponseQueue,
    history: History,
    expectations: Mutex<Vec<ExpectationState>>,
    reporter: Arc<dyn AssertionReporter>,
    assertions: AtomicUsize,
}

impl SessionState {
    fn new(reporter: Arc<dyn AssertionReporter>) -> Self {
        Self {
            queue: ResponseQueue::default(),
            history: History::default(),
            expectations: Mutex::new(Vec::new()),
            reporter,
            assertions: AtomicUsize::new(0),
        }
    }

    pub(crate) fn add_predicate(&self, id: usize, predicate: RequestPredicate) {
        let mut expectations = self.expectations.lock();
        let Some(state) = expectations.get_mut(id) else {
            tracing::warn!(expectation = id, "unknown expectation; predicate ignored");
            return;
        };
        if state.phase == Phase::Evaluated {
            tracing::warn!(
                expectation = id,
                %predicate,
                "expectation already evaluated; predicate ignored"
            );
            return;
        }
        state.predicates.push(predicate);
    }

    pub(crate) fn queue_many(&self, response: QueuedResponse, times: usize) {
        self.queue.extend(std::iter::repeat_n(response, times));
    }

    /// Evaluate every pending expectation against the full history and report
    /// failures. Expectations already evaluated are skipped.
    ///
    /// Pending states are marked evaluated and copied out first, so predicate
    /// callbacks and the reporter run without the expectation lock held.
    fn evaluate(&self) -> Vec<ExpectationFailure> {
        let pending: Vec<(usize, ExpectationState)> = {
            let mut expectations = self.expectations.lock();
            expectations
                .iter_mut()
                .enumerate()
                .filter(|(_, state)| state.phase == Phase::Accumulating)
                .map(|(position, state)| {
                    let snapshot = state.clone();
                    state.phase = Phase::Evaluated;
                    (position, snapshot)
                })
                .collect()
        };

        let history = self.history.snapshot();
        tracing::debug!(
            expectations = pending.len(),
            transactions = history.len(),
            "evaluating mock expectations"
        );

        let mut failures = Vec::new();
        for (position, mut state) in pending {
            if let Err(failure) = state.evaluate(position, &history) {
                self.reporter.record_failure(&failure);
                failures.push(failure);
            }
        }

        let unused = self.queue.len();
        if unused > 0 {
            tracing::debug!(unused, "mock session ended with queued responses left");
        }
        failures
    }
}

/// A scoped HTTP mocking session.
///
/// Owns a FIFO of queued responses, a history of every transaction, and a set
/// of deferred expectations. Clients obtained from the session dispatch into
/// its pipeline instead of the network.
///
/// Expectations are evaluated once: by [`verify`](Self::verify) or, failing
/// that, when the session is dropped. A drop with failed expectations panics
/// unless the thread is already panicking.
///
/// ```ignore
/// let session = MockSession::new();
/// session.expects(Times::once()).get("/users").will(MockResponse::ok());
///
/// let client = session.client();
/// client.get("http://api.local/users").send().await?;
///
/// session.verify()?;
/// ```
pub struct MockSession {
    shared: Arc<SessionState>,
    verified: bool,
}

impl MockSession {
    /// New session reporting assertions to a private [`AssertionCounter`]
    #[must_use]
    pub fn new() -> Self {
        Self::with_reporter(Arc::new(AssertionCounter::new()))
    }

    /// New session reporting assertions to `reporter`
    #[must_use]
    pub fn with_reporter(reporter: Arc<dyn AssertionReporter>) -> Self {
        tracing::debug!("mock session started");
        Self {
            shared: Arc::new(SessionState::new(reporter)),
            verified: false,
        }
    }

    /// The bare interception pipeline: history recording over the mock handler
    #[must_use]
    pub fn service(&self) -> MockService {
        let handler = MockHandler::new(self.shared.queue.clone());
        BoxCloneSyncService::new(HistoryLayer::new(self.shared.history.clone()).layer(handler))
    }

    /// Builder for a client bound to this session
    pub fn client_builder(&self) -> HttpClientBuilder {
        HttpClientBuilder::new(self.service())
    }

    /// Client bound to this session, configured by `options`.
    ///
    /// # Errors
    /// Returns `HttpError::InvalidUri` for an unparsable base URL and
    /// `HttpError::InvalidHeaderName`/`InvalidHeaderValue` for malformed headers.
    pub fn new_client(&self, options: ClientOptions) -> Result<HttpClient, HttpError> {
        self.client_builder().options(options).build()
    }

    /// Client bound to this session with default options
    #[must_use]
    pub fn client(&self) -> HttpClient {
        let user_agent = const { HeaderValue::from_static(DEFAULT_USER_AGENT) };
        self.client_builder().assemble(None, DefaultHeadersLayer::new(user_agent))
    }

    /// Append responses to the queue, dispensed in order
    pub fn queue_response<I, R>(&self, responses: I)
    where
        I: IntoIterator<Item = R>,
        R: Into<QueuedResponse>,
    {
        self.shared.queue.extend(responses.into_iter().map(Into::into));
    }

    /// Append `times` copies of one response
    pub fn queue_many(&self, response: impl Into<QueuedResponse>, times: usize) {
        self.shared.queue_many(response.into(), times);
    }

    /// Responses still waiting to be dispensed
    #[must_use]
    pub fn queue_count(&self) -> usize {
        self.shared.queue.len()
    }

    /// Copy of every recorded transaction, oldest first
    #[must_use]
    pub fn history(&self) -> Vec<Transaction> {
        self.shared.history.snapshot()
    }

    /// Transaction at `index`
    ///
    /// # Errors
    /// Returns `MockError::OutOfRange` if fewer than `index + 1` transactions were recorded.
    pub fn history_entry(&self, index: usize) -> Result<Transaction, MockError> {
        self.shared.history.get(index)
    }

    /// One field of the transaction at `index`
    ///
    /// # Errors
    /// Returns `MockError::OutOfRange` if fewer than `index + 1` transactions were recorded.
    pub fn history_field(&self, index: usize, field: HistoryField) -> Result<HistoryValue, MockError> {
        self.history_entry(index).map(|tx| tx.field(field))
    }

    #[must_use]
    pub fn last_transaction(&self) -> Option<Transaction> {
        self.shared.history.last()
    }

    #[must_use]
    pub fn history_count(&self) -> usize {
        self.shared.history.len()
    }

    /// Register an expectation; it counts as one assertion immediately.
    #[allow(clippy::must_use_candidate)]
    pub fn expects(&self, times: Times) -> Expectation {
        let id = {
            let mut expectations = self.shared.expectations.lock();
            expectations.push(ExpectationState::new(times));
            expectations.len() - 1
        };
        self.shared.assertions.fetch_add(1, Ordering::SeqCst);
        self.shared.reporter.add_to_assertion_count(1);
        tracing::debug!(expectation = id, %times, "registered mock expectation");
        Expectation::new(&self.shared, id)
    }

    /// Assertions announced by this session
    #[must_use]
    pub fn assertion_count(&self) -> usize {
        self.shared.assertions.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn expectation_count(&self) -> usize {
        self.shared.expectations.lock().len()
    }

    /// Evaluate all expectations and end the session.
    ///
    /// # Errors
    /// Returns `VerificationError` listing every failed expectation.
    pub fn verify(mut self) -> Result<(), VerificationError> {
        self.verified = true;
        let failures = self.shared.evaluate();
        if failures.is_empty() {
            Ok(())
        } else {
            Err(VerificationError { failures })
        }
    }
}

impl Default for MockSession {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSession")
            .field("queued", &self.shared.queue.len())
            .field("history", &self.shared.history.len())
            .field("expectations", &self.shared.expectations.lock().len())
            .field("verified", &self.verified)
            .finish_non_exhaustive()
    }
}

impl Drop for MockSession {
    fn drop(&mut self) {
        if self.verified {
            return;
        }
        let failures = self.shared.evaluate();
        if failures.is_empty() || std::thread::panicking() {
            return;
        }
        let error = VerificationError { failures };
        panic!("mock session dropped with failed expectations: {error}");
    }
}
