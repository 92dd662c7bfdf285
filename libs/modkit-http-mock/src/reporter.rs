use std::sync::atomic::{AtomicUsize, Ordering};

use crate::expectation::ExpectationFailure;
use crate::session::HistoryAssertionFailure;

/// Hook into the surrounding test framework's assertion bookkeeping.
///
/// [`MockSession`](crate::MockSession) calls `add_to_assertion_count(1)` the
/// moment an expectation is registered, and `record_failure` once per failed
/// expectation when the session is verified. Immediate history assertions
/// (`assert_first`, `assert_history_count`, ...) add one assertion per call and
/// report failures through `record_history_failure`.
pub trait AssertionReporter: Send + Sync {
    fn add_to_assertion_count(&self, count: usize);

    fn record_failure(&self, failure: &ExpectationFailure);

    fn record_history_failure(&self, failure: &HistoryAssertionFailure);
}

/// Default reporter: counts assertions and failures, logs each failure.
#[derive(Debug, Default)]
pub struct AssertionCounter {
    assertions: AtomicUsize,
    failures: AtomicUsize,
}

impl AssertionCounter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Assertions announced so far
    #[must_use]
    pub fn assertions(&self) -> usize {
        self.assertions.load(Ordering::SeqCst)
    }

    /// Failures recorded so far
    #[must_use]
    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }
}

impl AssertionReporter for AssertionCounter {
    fn add_to_assertion_count(&self, count: usize) {
        self.assertions.fetch_add(count, Ordering::SeqCst);
    }

    fn record_failure(&self, failure: &ExpectationFailure) {
        self.failures.fetch_add(1, Ordering::SeqCst);
        tracing::error!(
            expectation = failure.position,
            expected = %failure.times,
            matched = failure.matched,
            total = failure.total,
            "mock expectation failed"
        );
    }

    fn record_history_failure(&self, failure: &HistoryAssertionFailure) {
        self.failures.fetch_add(1, Ordering::SeqCst);
        tracing::error!(
            assertion = %failure.assertion,
            reason = %failure.reason,
            "mock history assertion failed"
        );
    }
}
