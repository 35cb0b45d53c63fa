//! Retry-once-after-refresh wrapper around the request executor.
//!
//! Per call:
//!
//! ```text
//! EXECUTE --(2xx / any non-401 error)--------------------------> DONE
//! EXECUTE --(401)--> REFRESH --(new credential)--> REPLAY -----> DONE
//!                    REFRESH --(failure)--> INVALIDATE --------> DONE (original 401)
//! ```
//!
//! A replay is never followed by another refresh, so one call costs at most
//! two executor round trips plus one refresh round trip.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::executor::RequestExecutor;
use super::refresh::RefreshGuard;
use super::request::{ApiResponse, PendingRequest};
use super::{RefreshFailure, RequestError};
use crate::auth::Credential;
use crate::context::{AuthContext, AuthEvent};

/// Refresh endpoint, relative to the base URL
pub const REFRESH_PATH: &str = "auth/refresh";

/// Field of the refresh response that carries the new credential
const ACCESS_TOKEN_FIELD: &str = "accessToken";

/// Counts of refresh calls actually put on the wire
#[derive(Debug, Default)]
pub struct RefreshStats {
    attempts: AtomicU64,
    failures: AtomicU64,
}

impl RefreshStats {
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

/// Clone is cheap and clones share the refresh guard, so concurrent calls
/// through any clone coalesce onto one refresh.
#[derive(Clone)]
pub struct ReauthInterceptor {
    executor: RequestExecutor,
    ctx: AuthContext,
    guard: Arc<RefreshGuard>,
    stats: Arc<RefreshStats>,
    refresh_path: String,
}

impl ReauthInterceptor {
    pub fn new(executor: RequestExecutor, ctx: AuthContext) -> Self {
        Self {
            executor,
            ctx,
            guard: Arc::new(RefreshGuard::new()),
            stats: Arc::new(RefreshStats::default()),
            refresh_path: REFRESH_PATH.to_string(),
        }
    }

    /// Use a different refresh endpoint
    pub fn with_refresh_path(mut self, path: impl Into<String>) -> Self {
        self.refresh_path = path.into();
        self
    }

    pub fn context(&self) -> &AuthContext {
        &self.ctx
    }

    pub fn stats(&self) -> &RefreshStats {
        &self.stats
    }

    pub async fn request(&self, request: PendingRequest) -> Result<ApiResponse, RequestError> {
        let original = match self.executor.execute(&request).await {
            Err(e) if e.is_unauthorized() && request.requires_auth => e,
            other => return other,
        };

        debug!(method = %request.method, path = %request.path, "Unauthorized, attempting silent refresh");
        match self.refresh().await {
            Ok(_) => {
                debug!(method = %request.method, path = %request.path, "Replaying after refresh");
                self.executor.execute(&request).await
            }
            Err(_) => Err(original),
        }
    }

    /// Obtain a fresh credential over the cookie channel, joining any refresh
    /// already in flight. On success the credential is in token memory before
    /// this returns; on failure the session has been invalidated.
    pub async fn refresh(&self) -> Result<Credential, RefreshFailure> {
        let executor = self.executor.clone();
        let ctx = self.ctx.clone();
        let stats = Arc::clone(&self.stats);
        let path = self.refresh_path.clone();

        self.guard
            .run(move || refresh_credential(executor, ctx, stats, path))
            .await
    }
}

async fn refresh_credential(
    executor: RequestExecutor,
    ctx: AuthContext,
    stats: Arc<RefreshStats>,
    path: String,
) -> Result<Credential, RefreshFailure> {
    stats.attempts.fetch_add(1, Ordering::Relaxed);

    let request = PendingRequest::post(path).with_credentials().without_reauth();
    let outcome = match executor.execute(&request).await {
        Ok(response) => response
            .string_field(ACCESS_TOKEN_FIELD)
            .map(Credential::new)
            .ok_or(RefreshFailure::MissingCredential),
        Err(e) => Err(RefreshFailure::Rejected(e)),
    };

    match outcome {
        Ok(credential) => {
            ctx.tokens().set(Some(credential.clone()));
            ctx.emit(AuthEvent::TokenRefreshed);
            info!("Access token refreshed");
            Ok(credential)
        }
        Err(failure) => {
            stats.failures.fetch_add(1, Ordering::Relaxed);
            warn!(error = %failure, "Token refresh failed, invalidating session");
            ctx.invalidation().invalidate();
            Err(failure)
        }
    }
}
