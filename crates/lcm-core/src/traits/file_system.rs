// # File System Trait
//
// Defines the file operations the configuration store needs.
//
// ## Implementations
//
// - `OsFileSystem` (`store::file_system`): tokio::fs with write-then-rename
// - Tests: doubles that inject transient sharing violations
//
// ## Error Contract
//
// Implementations return the raw `std::io::Error`. The store decides which
// errors are transient (retried) and which are final, so implementations
// must not retry on their own.

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// A file found by [`FileSystem::list_files`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Full path of the file
    pub path: PathBuf,
    /// Last modification time
    pub modified: SystemTime,
}

/// File access used by the configuration store
///
/// All methods must be safe to call concurrently from multiple tasks.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Whether a file exists at `path`
    ///
    /// `Ok(false)` means the path is definitely absent. A lookup that fails
    /// for any other reason (permissions, a file where a directory should
    /// be) is an error.
    async fn exists(&self, path: &Path) -> io::Result<bool>;

    /// Read a whole file as UTF-8
    async fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Replace the contents of `path`
    ///
    /// Readers must never observe a partially written file.
    async fn write(&self, path: &Path, contents: &str) -> io::Result<()>;

    /// Create a directory and all of its parents
    async fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// List the regular files directly inside `dir`
    async fn list_files(&self, dir: &Path) -> io::Result<Vec<FileEntry>>;

    /// Delete a file
    async fn remove_file(&self, path: &Path) -> io::Result<()>;
}
