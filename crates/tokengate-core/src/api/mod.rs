//! Authenticated request layer.
//!
//! Calls flow `ApiClient` → `ReauthInterceptor` → `RequestExecutor` →
//! `Transport`. The executor attaches the in-memory bearer credential; the
//! interceptor turns a 401 into one silent refresh over the cookie channel
//! and a single replay.

pub mod client;
pub mod error;
pub mod executor;
pub mod reauth;
pub mod refresh;
pub mod request;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_support;

pub use client::ApiClient;
pub use error::{RefreshFailure, RequestError};
pub use executor::RequestExecutor;
pub use reauth::{ReauthInterceptor, RefreshStats, REFRESH_PATH};
pub use request::{ApiResponse, PendingRequest};
pub use transport::{HttpTransport, OutboundRequest, RawResponse, Transport};

pub use reqwest::Method;
