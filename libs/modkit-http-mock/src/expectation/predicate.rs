use bytes::Bytes;
use http::{Method, Version};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::history::{RecordedRequest, Transaction};

type CheckFn = dyn Fn(&Transaction) -> bool + Send + Sync;

/// User-supplied transaction check
#[derive(Clone)]
pub struct TransactionCheck(pub(crate) Arc<CheckFn>);

impl fmt::Debug for TransactionCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TransactionCheck(..)")
    }
}

/// A filter applied to recorded transactions when an expectation is evaluated.
#[derive(Debug, Clone)]
pub enum RequestPredicate {
    Method(Method),
    Uri(String),
    /// Lowercase header name and expected value
    Header(String, String),
    Body(Bytes),
    BodyContains(String),
    Json(serde_json::Value),
    Form(Vec<(String, String)>),
    Query(String, String),
    Version(Version),
    Timeout(Duration),
    /// Only the transaction at this history index
    Position(usize),
    Callback {
        description: String,
        check: TransactionCheck,
    },
}

impl RequestPredicate {
    pub(crate) fn matches(&self, index: usize, tx: &Transaction) -> bool {
        let request = &tx.request;
        match self {
            Self::Method(method) => request.method == *method,
            Self::Uri(expected) => uri_matches(request, expected),
            Self::Header(name, value) => request
                .headers
                .get_all(name.as_str())
                .iter()
                .any(|v| v.to_str().is_ok_and(|v| v == value)),
            Self::Body(expected) => request.body == *expected,
            Self::BodyContains(needle) => request.body_text().contains(needle.as_str()),
            Self::Json(expected) => request
                .json::<serde_json::Value>()
                .is_ok_and(|actual| actual == *expected),
            Self::Form(expected) => {
                let actual = request.form_pairs();
                expected.iter().all(|pair| actual.contains(pair))
            }
            Self::Query(key, value) => request
                .query_pairs()
                .iter()
                .any(|(k, v)| k == key && v == value),
            Self::Version(version) => request.version == *version,
            Self::Timeout(timeout) => tx.options.timeout == Some(*timeout),
            Self::Position(position) => index == *position,
            Self::Callback { check, .. } => (check.0)(tx),
        }
    }
}

/// Absolute expectations compare the full URI; `/`-prefixed ones compare the
/// path, or path-and-query when they carry a `?`.
fn uri_matches(request: &RecordedRequest, expected: &str) -> bool {
    if expected.starts_with('/') {
        if expected.contains('?') {
            return request
                .uri
                .path_and_query()
                .is_some_and(|pq| pq.as_str() == expected);
        }
        return request.uri.path() == expected;
    }
    request.uri.to_string() == expected
}

fn version_name(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_2 => "HTTP/2",
        Version::HTTP_3 => "HTTP/3",
        _ => "HTTP/1.1",
    }
}

impl fmt::Display for RequestPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Method(method) => write!(f, "method is {method}"),
            Self::Uri(uri) => write!(f, "URI is {uri}"),
            Self::Header(name, value) => write!(f, "header {name}: {value}"),
            Self::Body(body) => write!(f, "body is \"{}\"", String::from_utf8_lossy(body)),
            Self::BodyContains(needle) => write!(f, "body contains \"{needle}\""),
            Self::Json(value) => write!(f, "JSON body is {value}"),
            Self::Form(pairs) => {
                f.write_str("form contains ")?;
                let rendered: Vec<String> = pairs.iter().map(|(k, v)| format!("{k}={v}")).collect();
                f.write_str(&rendered.join("&"))
            }
            Self::Query(key, value) => write!(f, "query has {key}={value}"),
            Self::Version(version) => write!(f, "protocol is {}", version_name(*version)),
            Self::Timeout(timeout) => {
                write!(f, "timeout is {}", humantime::format_duration(*timeout))
            }
            Self::Position(position) => write!(f, "request #{position}"),
            Self::Callback { description, .. } => f.write_str(description),
        }
    }
}
