use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::time::Duration;

/// Default User-Agent string for mocked requests
pub const DEFAULT_USER_AGENT: &str = concat!("modkit-http-mock/", env!("CARGO_PKG_VERSION"));

/// Default maximum response body size (10 MiB)
pub const DEFAULT_MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Caller-supplied client options.
///
/// These are merged into every client a [`MockSession`](crate::MockSession)
/// builds. There is no handler field: the interception pipeline
/// is always the session's own.
///
/// Deserializable from configuration, with `humantime` durations:
///
/// ```ignore
/// let options: ClientOptions = serde_json::from_value(json!({
///     "base_url": "https://api.example.com/v1/",
///     "headers": { "authorization": "Bearer test" },
///     "timeout": "250ms",
/// }))?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientOptions {
    /// Base URL relative request URLs are resolved against
    pub base_url: Option<String>,

    /// Headers added to every request unless the request sets them itself
    pub headers: BTreeMap<String, String>,

    /// User-Agent header value (default: [`DEFAULT_USER_AGENT`])
    pub user_agent: String,

    /// Default per-request timeout, checked against queued response delays
    #[serde(deserialize_with = "deserialize_opt_duration")]
    pub timeout: Option<Duration>,

    /// Maximum response body size read by `bytes()`/`json()`/`text()`
    pub max_body_size: usize,

    /// Turn non-2xx responses into `HttpError::HttpStatus` at `send()` time
    pub http_errors: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: None,
            headers: BTreeMap::new(),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            timeout: None,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            http_errors: false,
        }
    }
}

/// Per-request transfer metadata recorded alongside each transaction.
///
/// Travels through the service stack as a request extension.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferOptions {
    /// Effective timeout for this request (request override, else client default)
    pub timeout: Option<Duration>,
}

fn deserialize_opt_duration<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    raw.map(|value| humantime::parse_duration(&value).map_err(serde::de::Error::custom))
        .transpose()
}
