//! Tower layers composing the interception pipeline
//!
//! Request flow (outer → inner):
//!   [`DefaultHeadersLayer`] → caller middleware → [`HistoryLayer`] → [`MockHandler`]
//!
//! The history layer sits directly above the handler so it records requests
//! exactly as they were dispatched, after every caller middleware ran.

mod default_headers;
mod history;
mod mock_handler;

pub use default_headers::{DefaultHeadersLayer, DefaultHeadersService};
pub use history::{HistoryLayer, HistoryService};
pub use mock_handler::MockHandler;
