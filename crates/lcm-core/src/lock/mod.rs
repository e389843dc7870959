// # Named Process Lock
//
// Machine-wide mutual exclusion between independent processes, keyed by a
// short name ("Evaluation", "Welcome", ...).
//
// ## Primitive
//
// Each name maps to `<lock_dir>/<name>.lock`, locked with an exclusive
// whole-file lock through `File::lock` (`flock(2)` on Unix, `LockFileEx` on
// Windows). The operating system releases the lock when the holding process
// exits for any reason, so a crashed holder never leaves the name unusable.
//
// ## Scope
//
// `ProcessLocks::acquire` returns a `NamedLockGuard`; the lock is held until
// the guard is dropped. Early returns, `?` and panics all drop the guard.
// There is no timeout. Callers that need one wrap `acquire` in
// `tokio::time::timeout`.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Lock serializing evaluation license activation
pub const EVALUATION_LOCK: &str = "Evaluation";

/// Lock serializing the first-start flow
pub const WELCOME_LOCK: &str = "Welcome";

/// Factory for machine-wide named locks
#[derive(Debug, Clone)]
pub struct ProcessLocks {
    lock_dir: PathBuf,
}

impl ProcessLocks {
    /// Create a lock factory storing its lock files in `lock_dir`
    pub fn new(lock_dir: impl Into<PathBuf>) -> Self {
        Self {
            lock_dir: lock_dir.into(),
        }
    }

    /// Directory holding the lock files
    pub fn lock_dir(&self) -> &Path {
        &self.lock_dir
    }

    /// Path of the lock file backing `name`
    ///
    /// Names are restricted to ASCII alphanumerics, `-`, `_` and `.` so they
    /// map to a single file name on every platform.
    pub fn lock_path(&self, name: &str) -> Result<PathBuf> {
        let valid = !name.is_empty()
            && name != "."
            && name != ".."
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

        if !valid {
            return Err(Error::invalid_input(format!(
                "Invalid lock name '{}'. Valid: ASCII alphanumeric, '-', '_' and '.'",
                name
            )));
        }

        Ok(self.lock_dir.join(format!("{}.lock", name)))
    }

    /// Acquire the named lock, waiting as long as necessary
    ///
    /// # Returns
    ///
    /// - `Ok(NamedLockGuard)`: The lock is held until the guard is dropped
    /// - `Err(Error::InvalidInput)`: `name` is not a valid lock name
    /// - `Err(Error::Lock)`: The lock file could not be created or locked
    pub async fn acquire(&self, name: &str) -> Result<NamedLockGuard> {
        let path = self.lock_path(name)?;

        debug!(lock = name, "Waiting for named lock");

        let file = tokio::task::spawn_blocking(move || lock_file(&path))
            .await
            .map_err(|e| Error::lock(format!("Lock task for '{}' failed: {}", name, e)))??;

        debug!(lock = name, "Named lock acquired");

        Ok(NamedLockGuard {
            name: name.to_string(),
            file: Some(file),
        })
    }
}

/// Holds a named lock until dropped
#[derive(Debug)]
pub struct NamedLockGuard {
    name: String,
    file: Option<File>,
}

impl NamedLockGuard {
    /// Name of the held lock
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for NamedLockGuard {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            if let Err(e) = file.unlock() {
                warn!(lock = %self.name, "Failed to unlock named lock: {}", e);
            }
            debug!(lock = %self.name, "Named lock released");
        }
    }
}

/// Open (creating if needed) and exclusively lock the file at `path`
fn lock_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            Error::lock(format!(
                "Failed to create lock directory {}: {}",
                parent.display(),
                e
            ))
        })?;
    }

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|e| {
            Error::lock(format!(
                "Failed to open lock file {}: {}",
                path.display(),
                e
            ))
        })?;

    file.lock()
        .map_err(|e| Error::lock(format!("Failed to lock {}: {}", path.display(), e)))?;

    Ok(file)
}
