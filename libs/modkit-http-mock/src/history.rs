//! Request/response history captured by the [`HistoryLayer`](crate::HistoryLayer).

use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode, Uri, Version};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::config::TransferOptions;
use crate::error::MockError;

/// A request as it reached the mock handler.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub uri: Uri,
    pub version: Version,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RecordedRequest {
    pub(crate) fn from_parts(parts: &http::request::Parts, body: Bytes) -> Self {
        Self {
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            version: parts.version,
            headers: parts.headers.clone(),
            body,
        }
    }

    /// Request path without the query string
    #[must_use]
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Decoded query-string pairs, in order of appearance
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.uri
            .query()
            .and_then(|q| serde_urlencoded::from_str(q).ok())
            .unwrap_or_default()
    }

    /// First value of a header, if present and valid UTF-8
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Body as UTF-8 text (lossy)
    #[must_use]
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decode the body as JSON.
    ///
    /// # Errors
    /// Returns the `serde_json` error when the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Decoded `application/x-www-form-urlencoded` body pairs
    #[must_use]
    pub fn form_pairs(&self) -> Vec<(String, String)> {
        serde_urlencoded::from_bytes(&self.body).unwrap_or_default()
    }
}

/// The response the mock handler dispensed for a request.
#[derive(Debug, Clone)]
pub struct RecordedResponse {
    pub status: StatusCode,
    pub version: Version,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RecordedResponse {
    pub(crate) fn from_parts(parts: &http::response::Parts, body: Bytes) -> Self {
        Self {
            status: parts.status,
            version: parts.version,
            headers: parts.headers.clone(),
            body,
        }
    }

    /// Body as UTF-8 text (lossy)
    #[must_use]
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// One history entry: a request with its response or error.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub request: RecordedRequest,
    pub response: Option<RecordedResponse>,
    pub error: Option<String>,
    pub options: TransferOptions,
}

/// Selects a single field of a [`Transaction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryField {
    Request,
    Response,
    Error,
    Options,
}

/// Value of a single [`Transaction`] field.
#[derive(Debug, Clone)]
pub enum HistoryValue {
    Request(RecordedRequest),
    Response(Option<RecordedResponse>),
    Error(Option<String>),
    Options(TransferOptions),
}

impl Transaction {
    /// Extract a single field
    #[must_use]
    pub fn field(&self, field: HistoryField) -> HistoryValue {
        match field {
            HistoryField::Request => HistoryValue::Request(self.request.clone()),
            HistoryField::Response => HistoryValue::Response(self.response.clone()),
            HistoryField::Error => HistoryValue::Error(self.error.clone()),
            HistoryField::Options => HistoryValue::Options(self.options.clone()),
        }
    }
}

/// Append-only, shared transaction log.
#[derive(Debug, Clone, Default)]
pub struct History {
    entries: Arc<Mutex<Vec<Transaction>>>,
}

impl History {
    pub(crate) fn record(&self, transaction: Transaction) {
        let mut entries = self.entries.lock();
        tracing::debug!(
            index = entries.len(),
            method = %transaction.request.method,
            uri = %transaction.request.uri,
            status = ?transaction.response.as_ref().map(|r| r.status),
            error = ?transaction.error,
            "recorded mock transaction"
        );
        entries.push(transaction);
    }

    /// Number of recorded transactions
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if nothing has been recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Copy of the full log
    #[must_use]
    pub fn snapshot(&self) -> Vec<Transaction> {
        self.entries.lock().clone()
    }

    /// Transaction at `index`.
    ///
    /// # Errors
    /// Returns `MockError::OutOfRange` if `index` is not below [`len`](Self::len).
    pub fn get(&self, index: usize) -> Result<Transaction, MockError> {
        let entries = self.entries.lock();
        entries
            .get(index)
            .cloned()
            .ok_or(MockError::OutOfRange {
                index,
                len: entries.len(),
            })
    }

    /// Most recent transaction
    #[must_use]
    pub fn last(&self) -> Option<Transaction> {
        self.entries.lock().last().cloned()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn transaction(uri: &str, body: &'static str) -> Transaction {
        let (parts, ()) = http::Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/x-www-form-urlencoded")
            .body(())
            .unwrap()
            .into_parts();
        Transaction {
            request: RecordedRequest::from_parts(&parts, Bytes::from_static(body.as_bytes())),
            response: None,
            error: Some("boom".to_owned()),
            options: TransferOptions::default(),
        }
    }

    #[test]
    fn test_recorded_request_accessors() {
        let tx = transaction("http://localhost/users?page=2&sort=name", "a=1&b=two+words");
        assert_eq!(tx.request.path(), "/users");
        assert_eq!(
            tx.request.query_pairs(),
            vec![
                ("page".to_owned(), "2".to_owned()),
                ("sort".to_owned(), "name".to_owned())
            ]
        );
        assert_eq!(
            tx.request.header("Content-Type"),
            Some("application/x-www-form-urlencoded")
        );
        assert_eq!(
            tx.request.form_pairs(),
            vec![
                ("a".to_owned(), "1".to_owned()),
                ("b".to_owned(), "two words".to_owned())
            ]
        );
    }

    #[test]
    fn test_history_indexing() {
        let history = History::default();
        assert!(history.is_empty());
        assert!(history.last().is_none());

        history.record(transaction("http://localhost/a", ""));
        history.record(transaction("http://localhost/b", ""));

        assert_eq!(history.len(), 2);
        assert_eq!(history.get(1).unwrap().request.path(), "/b");
        assert_eq!(history.last().unwrap().request.path(), "/b");
        assert_eq!(
            history.get(2).unwrap_err(),
            MockError::OutOfRange { index: 2, len: 2 }
        );
    }

    #[test]
    fn test_field_extraction() {
        let tx = transaction("http://localhost/a", "");
        assert!(matches!(
            tx.field(HistoryField::Error),
            HistoryValue::Error(Some(ref msg)) if msg == "boom"
        ));
        assert!(matches!(
            tx.field(HistoryField::Response),
            HistoryValue::Response(None)
        ));
        match tx.field(HistoryField::Request) {
            HistoryValue::Request(req) => assert_eq!(req.method, Method::POST),
            other => panic!("unexpected field value: {other:?}"),
        }
    }
}
