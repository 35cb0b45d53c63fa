//! Durable key-value backends for the session record.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::Mutex;

/// Session file name in the session directory
const SESSION_FILE: &str = "persist-auth.json";

/// Opaque persistence collaborator. Stores one serialized session record.
pub trait SessionStorage: Send + Sync {
    /// Last saved record, or `None` if nothing has been written yet
    fn load(&self) -> Result<Option<String>>;

    fn save(&self, record: &str) -> Result<()>;
}

/// Stores the record as a JSON file on disk.
pub struct FileSessionStorage {
    dir: PathBuf,
}

impl FileSessionStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(SESSION_FILE)
    }
}

impl SessionStorage for FileSessionStorage {
    fn load(&self) -> Result<Option<String>> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read session file {}", path.display()))?;
        Ok(Some(contents))
    }

    fn save(&self, record: &str) -> Result<()> {
        let path = self.path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create session directory {}", parent.display()))?;
        }
        write_atomic(&path, record)
    }
}

/// Write via a sibling temp file so a crash never leaves half a record.
fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, contents)
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to move session file into place at {}", path.display()))?;
    Ok(())
}

/// In-process storage. Clones share the same buffer, so a test can keep a
/// handle and inspect exactly what was written.
#[derive(Clone, Default)]
pub struct MemorySessionStorage {
    record: Arc<Mutex<Option<String>>>,
}

impl MemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw record as last saved
    pub fn contents(&self) -> Option<String> {
        self.record.lock().clone()
    }
}

impl SessionStorage for MemorySessionStorage {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.contents())
    }

    fn save(&self, record: &str) -> Result<()> {
        *self.record.lock() = Some(record.to_string());
        Ok(())
    }
}
