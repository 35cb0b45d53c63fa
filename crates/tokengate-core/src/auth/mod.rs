//! Authentication state for the request layer.
//!
//! This module provides:
//! - `TokenMemory`: the in-memory access credential, never persisted
//! - `SessionStore`: durable logged-in flag, profile and role
//! - `SessionStorage`: the key-value backend the session is written to
//! - `SessionInvalidation`: teardown after an unrecoverable auth failure

pub mod invalidation;
pub mod session;
pub mod storage;
pub mod token;

pub use invalidation::SessionInvalidation;
pub use session::{Session, SessionStore};
pub use storage::{FileSessionStorage, MemorySessionStorage, SessionStorage};
pub use token::{Credential, TokenMemory};
