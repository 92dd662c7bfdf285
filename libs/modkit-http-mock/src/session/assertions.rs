//! Immediate assertions on the recorded history.
//!
//! Unlike [`MockSession::expects`], these run against the history as it is
//! at the call site and fail the test on the spot. Each call counts as one
//! assertion with the session's reporter.

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use super::MockSession;
use crate::expectation::{Expectation, PredicateReport, RequestPredicate, report_predicates};
use crate::history::Transaction;

/// A failed immediate history assertion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryAssertionFailure {
    /// Which assertion failed, e.g. `first` or `indexes [0, 2]`
    pub assertion: String,
    pub reason: String,
    /// How many recorded transactions each predicate matched on its own
    pub predicates: Vec<PredicateReport>,
}

impl fmt::Display for HistoryAssertionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "history assertion `{}` failed: {}",
            self.assertion, self.reason
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

fn render_indexes(indexes: &[usize]) -> String {
    indexes
        .iter()
        .map(|index| format!("#{index}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Predicates collected from a detached [`Expectation`] plus the history they
/// are checked against
struct Check {
    assertion: String,
    predicates: Vec<RequestPredicate>,
    history: Vec<Transaction>,
}

impl Check {
    fn matches(&self, index: usize) -> Option<bool> {
        self.history
            .get(index)
            .map(|tx| self.predicates.iter().all(|p| p.matches(index, tx)))
    }

    fn fail(self, reason: String) -> Result<(), HistoryAssertionFailure> {
        Err(HistoryAssertionFailure {
            predicates: report_predicates(&self.predicates, self.history.iter().enumerate()),
            assertion: self.assertion,
            reason,
        })
    }

    fn at(self, indexes: &[usize]) -> Result<(), HistoryAssertionFailure> {
        let total = self.history.len();
        if let Some(&missing) = indexes.iter().find(|&&index| index >= total) {
            return self.fail(format!(
                "no request at index {missing}: {total} transaction(s) recorded"
            ));
        }
        let mismatched: Vec<usize> = indexes
            .iter()
            .copied()
            .filter(|&index| self.matches(index) == Some(false))
            .collect();
        if mismatched.is_empty() {
            return Ok(());
        }
        self.fail(format!("{} did not match", render_indexes(&mismatched)))
    }
}

impl MockSession {
    fn check<F>(&self, assertion: String, build: F) -> Check
    where
        F: FnOnce(Expectation) -> Expectation,
    {
        let predicates = Arc::new(Mutex::new(Vec::new()));
        drop(build(Expectation::detached(&self.shared, Arc::clone(&predicates))));
        let predicates = std::mem::take(&mut *predicates.lock());

        Check {
            assertion,
            predicates,
            history: self.shared.history.snapshot(),
        }
    }

    #[track_caller]
    fn conclude(&self, outcome: Result<(), HistoryAssertionFailure>) {
        self.shared.assertions.fetch_add(1, Ordering::SeqCst);
        self.shared.reporter.add_to_assertion_count(1);

        if let Err(failure) = outcome {
            self.shared.reporter.record_history_failure(&failure);
            panic!("{failure}");
        }
    }

    /// Assert that exactly `expected` transactions were recorded so far.
    ///
    /// # Panics
    /// Panics if the history length differs.
    #[track_caller]
    pub fn assert_history_count(&self, expected: usize) {
        let actual = self.shared.history.len();
        let outcome = if actual == expected {
            Ok(())
        } else {
            Err(HistoryAssertionFailure {
                assertion: format!("history count {expected}"),
                reason: format!("{actual} transaction(s) recorded"),
                predicates: Vec::new(),
            })
        };
        self.conclude(outcome);
    }

    /// Assert that the first recorded request matches the predicates set by `build`.
    ///
    /// ```ignore
    /// session.assert_first(|e| e.post("/token").with_form([("grant_type", "client_credentials")]));
    /// ```
    ///
    /// # Panics
    /// Panics if the history is empty or the first request does not match.
    #[track_caller]
    pub fn assert_first<F>(&self, build: F)
    where
        F: FnOnce(Expectation) -> Expectation,
    {
        let check = self.check("first".to_owned(), build);
        let outcome = if check.history.is_empty() {
            check.fail("history is empty".to_owned())
        } else {
            check.at(&[0])
        };
        self.conclude(outcome);
    }

    /// Assert that the most recent request matches the predicates set by `build`.
    ///
    /// # Panics
    /// Panics if the history is empty or the last request does not match.
    #[track_caller]
    pub fn assert_last<F>(&self, build: F)
    where
        F: FnOnce(Expectation) -> Expectation,
    {
        let check = self.check("last".to_owned(), build);
        let outcome = match check.history.len().checked_sub(1) {
            Some(last) => check.at(&[last]),
            None => check.fail("history is empty".to_owned()),
        };
        self.conclude(outcome);
    }

    /// Assert that every recorded request matches.
    ///
    /// # Panics
    /// Panics if the history is empty or any request does not match.
    #[track_caller]
    pub fn assert_all<F>(&self, build: F)
    where
        F: FnOnce(Expectation) -> Expectation,
    {
        let check = self.check("all".to_owned(), build);
        let outcome = if check.history.is_empty() {
            check.fail("history is empty".to_owned())
        } else {
            let every: Vec<usize> = (0..check.history.len()).collect();
            check.at(&every)
        };
        self.conclude(outcome);
    }

    /// Assert that no recorded request matches. An empty history passes.
    ///
    /// # Panics
    /// Panics if any request matches.
    #[track_caller]
    pub fn assert_none<F>(&self, build: F)
    where
        F: FnOnce(Expectation) -> Expectation,
    {
        let check = self.check("none".to_owned(), build);
        let matched: Vec<usize> = (0..check.history.len())
            .filter(|&index| check.matches(index) == Some(true))
            .collect();
        let outcome = if matched.is_empty() {
            Ok(())
        } else {
            check.fail(format!("{} matched", render_indexes(&matched)))
        };
        self.conclude(outcome);
    }

    /// Assert that the requests at each of `indexes` (0-based) match.
    ///
    /// # Panics
    /// Panics if an index is beyond the history or its request does not match.
    #[track_caller]
    pub fn assert_indexes<F>(&self, indexes: &[usize], build: F)
    where
        F: FnOnce(Expectation) -> Expectation,
    {
        let rendered: Vec<String> = indexes.iter().map(ToString::to_string).collect();
        let check = self.check(format!("indexes [{}]", rendered.join(", ")), build);
        let outcome = check.at(indexes);
        self.conclude(outcome);
    }
}
