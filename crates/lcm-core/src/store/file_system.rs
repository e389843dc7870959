// # OS File System
//
// `FileSystem` implementation on top of tokio::fs.
//
// ## Crash Safety
//
// Writes go to a temporary sibling named `<file>.<pid>.<id>.tmp` and are
// then renamed over the target. Every write gets its own temporary file, so
// concurrent writers of one record (in this process or another) only race
// on the rename: the last rename wins and the record is always one writer's
// complete JSON.
//
// A failed write removes its temporary file. A crash mid-write leaves the
// previous record intact plus a stale temporary file, which
// `ConfigurationStore::remove_stale_temp_files` sweeps later.

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::traits::file_system::{FileEntry, FileSystem};

/// Extension of temporary files produced by [`OsFileSystem::write`]
pub const TEMP_EXTENSION: &str = "tmp";

/// File system backed by the operating system
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFileSystem;

impl OsFileSystem {
    /// Create a new OS file system
    pub fn new() -> Self {
        Self
    }

    /// Get a fresh path for the temporary file of one write to `path`
    fn temp_path(path: &Path) -> PathBuf {
        let mut name = path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(format!(
            ".{}.{}.{}",
            std::process::id(),
            Uuid::new_v4().simple(),
            TEMP_EXTENSION
        ));
        path.with_file_name(name)
    }

    async fn write_and_replace(temp_path: &Path, path: &Path, contents: &str) -> io::Result<()> {
        {
            let mut file = fs::File::create(temp_path).await?;
            file.write_all(contents.as_bytes()).await?;
            file.flush().await?;
            file.sync_all().await?;
        }

        // Atomic rename (temp -> actual)
        fs::rename(temp_path, path).await
    }
}

#[async_trait]
impl FileSystem for OsFileSystem {
    async fn exists(&self, path: &Path) -> io::Result<bool> {
        fs::try_exists(path).await
    }

    async fn read_to_string(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path).await
    }

    async fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        let temp_path = Self::temp_path(path);

        if let Err(e) = Self::write_and_replace(&temp_path, path, contents).await {
            match fs::remove_file(&temp_path).await {
                Ok(()) => {}
                Err(cleanup_err) if cleanup_err.kind() == io::ErrorKind::NotFound => {}
                Err(cleanup_err) => tracing::debug!(
                    "Failed to remove temp file {}: {}",
                    temp_path.display(),
                    cleanup_err
                ),
            }
            return Err(e);
        }

        tracing::trace!("Wrote {}", path.display());
        Ok(())
    }

    async fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path).await
    }

    async fn list_files(&self, dir: &Path) -> io::Result<Vec<FileEntry>> {
        let mut entries = Vec::new();
        let mut read_dir = fs::read_dir(dir).await?;

        while let Some(entry) = read_dir.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            entries.push(FileEntry {
                path: entry.path(),
                modified: metadata.modified()?,
            });
        }

        Ok(entries)
    }

    async fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path).await
    }
}
