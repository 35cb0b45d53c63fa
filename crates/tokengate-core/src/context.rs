//! Explicit auth context shared by the request layer and its callers.
//!
//! Holds the in-memory credential, the durable session store and the event
//! channel. Clone is cheap; every clone sees the same state. Tests build one
//! per case instead of sharing process-wide state.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::info;

use crate::auth::{Credential, SessionInvalidation, SessionStore, TokenMemory};
use crate::models::UserProfile;

/// Capacity of the auth event channel. Slow receivers lag rather than block.
const EVENT_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    LoggedIn,
    LoggedOut,
    TokenRefreshed,
    /// Refresh failed and the session was invalidated
    SessionExpired,
}

#[derive(Clone)]
pub struct AuthContext {
    tokens: Arc<TokenMemory>,
    session: Arc<SessionStore>,
    events: broadcast::Sender<AuthEvent>,
}

impl AuthContext {
    pub fn new(session: SessionStore) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            tokens: Arc::new(TokenMemory::new()),
            session: Arc::new(session),
            events,
        }
    }

    pub fn tokens(&self) -> &Arc<TokenMemory> {
        &self.tokens
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn events(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    pub(crate) fn emit(&self, event: AuthEvent) {
        let _ = self.events.send(event);
    }

    pub fn invalidation(&self) -> SessionInvalidation {
        SessionInvalidation::new(
            Arc::clone(&self.tokens),
            Arc::clone(&self.session),
            self.events.clone(),
        )
    }

    /// Hold `credential` in memory and mark the session as logged in
    pub fn sign_in(&self, credential: Credential, user: UserProfile) {
        self.tokens.set(Some(credential));
        info!(user = %user.display_name(), "Signed in");
        self.session.establish(user);
        self.emit(AuthEvent::LoggedIn);
    }

    /// Deliberate logout: credential first, then the durable session
    pub fn sign_out(&self) {
        self.tokens.clear();
        self.session.clear();
        info!("Signed out");
        self.emit(AuthEvent::LoggedOut);
    }
}
