use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::info;

use super::{Session, SessionStore, TokenMemory};
use crate::context::AuthEvent;

/// Tears the session down after an unrecoverable auth failure.
#[derive(Clone)]
pub struct SessionInvalidation {
    tokens: Arc<TokenMemory>,
    session: Arc<SessionStore>,
    events: broadcast::Sender<AuthEvent>,
}

impl SessionInvalidation {
    pub fn new(
        tokens: Arc<TokenMemory>,
        session: Arc<SessionStore>,
        events: broadcast::Sender<AuthEvent>,
    ) -> Self {
        Self {
            tokens,
            session,
            events,
        }
    }

    /// Clear the credential, then the durable session.
    ///
    /// The credential goes first so it never outlives the logged-out flag.
    /// Repeat calls leave the same state and emit no further event.
    pub fn invalidate(&self) {
        let had_credential = self.tokens.is_present();
        self.tokens.clear();

        let was_active = self.session.snapshot() != Session::default();
        self.session.clear();

        if had_credential || was_active {
            info!("Session invalidated");
            // No subscribers is fine
            let _ = self.events.send(AuthEvent::SessionExpired);
        }
    }
}
