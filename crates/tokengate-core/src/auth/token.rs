use std::fmt;

use parking_lot::RwLock;

/// Short-lived bearer credential.
///
/// Deliberately not `Serialize`: it must never reach durable storage.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Raw token text, for building the Authorization header
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Process-wide, non-persisted holder of the current access credential.
/// Empty on start; last writer wins.
#[derive(Debug, Default)]
pub struct TokenMemory {
    current: RwLock<Option<Credential>>,
}

impl TokenMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<Credential> {
        self.current.read().clone()
    }

    pub fn set(&self, credential: Option<Credential>) {
        *self.current.write() = credential;
    }

    pub fn clear(&self) {
        self.set(None);
    }

    pub fn is_present(&self) -> bool {
        self.current.read().is_some()
    }
}
