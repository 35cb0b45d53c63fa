//! tokengate-core - bearer-token API client with silent refresh.
//!
//! The access credential lives only in process memory ([`auth::TokenMemory`]).
//! Coarse session facts (logged-in flag, profile, role) are persisted through
//! [`auth::SessionStore`]. Requests go through [`api::ReauthInterceptor`],
//! which answers a 401 with one refresh over the cookie channel and a single
//! replay, and invalidates the session when the refresh fails.

pub mod api;
pub mod auth;
pub mod config;
pub mod context;
pub mod models;

pub use api::{ApiClient, ApiResponse, PendingRequest, RequestError};
pub use auth::{FileSessionStorage, SessionStore};
pub use config::Config;
pub use context::{AuthContext, AuthEvent};
