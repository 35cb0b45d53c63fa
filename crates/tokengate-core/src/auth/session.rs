//! Durable record of coarse session facts: logged-in flag, profile, role.
//!
//! The access credential is never part of this record. Only `user`, `role`
//! and `isLoggedIn` are written, under the `auth` namespace at version 1.

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, warn};

use super::storage::SessionStorage;
use crate::models::{ProfileUpdate, UserProfile};

/// Namespace key of the persisted record
const PERSIST_KEY: &str = "auth";

/// Persisted record version. Records with another version are discarded.
const PERSIST_VERSION: u32 = 1;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub is_logged_in: bool,
    pub user: Option<UserProfile>,
    pub role: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedSession {
    key: String,
    version: u32,
    saved_at: DateTime<Utc>,
    state: Session,
}

pub struct SessionStore {
    state: RwLock<Session>,
    /// Held across apply and persist so durable writes land in transition
    /// order while readers only wait on the in-memory update.
    writer: Mutex<()>,
    storage: Box<dyn SessionStorage>,
    notify: watch::Sender<Session>,
}

impl SessionStore {
    /// Open the store and rehydrate the last durable state.
    ///
    /// A missing, unreadable or foreign record leaves the store logged out.
    pub fn open(storage: Box<dyn SessionStorage>) -> Self {
        let initial = Self::rehydrate(storage.as_ref()).unwrap_or_default();
        debug!(is_logged_in = initial.is_logged_in, "Session rehydrated");
        let (notify, _) = watch::channel(initial.clone());
        Self {
            state: RwLock::new(initial),
            writer: Mutex::new(()),
            storage,
            notify,
        }
    }

    fn rehydrate(storage: &dyn SessionStorage) -> Option<Session> {
        let raw = match storage.load() {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Failed to load persisted session");
                return None;
            }
        };
        let record: PersistedSession = match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "Discarding unparseable persisted session");
                return None;
            }
        };
        if record.key != PERSIST_KEY || record.version != PERSIST_VERSION {
            warn!(
                key = %record.key,
                version = record.version,
                "Discarding persisted session from another namespace or version"
            );
            return None;
        }
        Some(record.state)
    }

    /// Current state as a detached snapshot
    pub fn snapshot(&self) -> Session {
        self.state.read().clone()
    }

    pub fn is_logged_in(&self) -> bool {
        self.state.read().is_logged_in
    }

    /// Receive every state transition as it happens
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.notify.subscribe()
    }

    /// Mark the session as logged in for `user`
    pub fn establish(&self, user: UserProfile) {
        self.transition(|state| {
            state.is_logged_in = true;
            state.role = user.role.clone();
            state.user = Some(user);
        });
    }

    /// Reset to logged-out defaults
    pub fn clear(&self) {
        self.transition(|state| *state = Session::default());
    }

    /// Merge `update` into the profile.
    ///
    /// Not guarded on `is_logged_in`: on a logged-out session this creates a
    /// profile holding just the update. `role` is left untouched.
    pub fn update_profile(&self, update: ProfileUpdate) {
        self.transition(|state| {
            state.user.get_or_insert_with(UserProfile::default).merge(update);
        });
    }

    /// Apply in memory, then persist and publish outside the state lock.
    fn transition(&self, apply: impl FnOnce(&mut Session)) {
        let _writer = self.writer.lock();
        let snapshot = {
            let mut state = self.state.write();
            apply(&mut *state);
            state.clone()
        };
        self.persist(&snapshot);
        self.notify.send_replace(snapshot);
    }

    /// Durable write. Failures are logged; the in-memory transition stands.
    fn persist(&self, state: &Session) {
        let record = PersistedSession {
            key: PERSIST_KEY.to_string(),
            version: PERSIST_VERSION,
            saved_at: Utc::now(),
            state: state.clone(),
        };
        let result = serde_json::to_string_pretty(&record)
            .map_err(anyhow::Error::from)
            .and_then(|contents| self.storage.save(&contents));
        if let Err(e) = result {
            warn!(error = %e, "Failed to persist session");
        }
    }
}
