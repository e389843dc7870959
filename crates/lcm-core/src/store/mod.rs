// # Configuration Store
//
// Loads, mutates, and persists typed JSON records shared by every process of
// the current user.
//
// ## Purpose
//
// Each record type lives in its own indented JSON file under the data
// directory. The file on disk is the authoritative copy; in-memory values
// are snapshots.
//
// ## Failure Behavior
//
// - Missing file: `get` returns the record's default (nothing is written)
// - Corrupt or unreachable file: treated as missing, with a warning
// - Transient sharing errors: retried per `RetryPolicy`
// - Write failure after retries: logged and dropped, `update` returns false
// - Data directory cannot be created: the only error `update` surfaces
//
// ## Concurrency
//
// `update` is a plain read-modify-write. Two processes updating the same
// record without a named lock can lose an update (last writer wins). Callers
// that need atomicity hold a `ProcessLocks` guard around the whole sequence.

pub mod file_system;
mod retry;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, error, info, warn};

use crate::config::{CoreConfig, RetryPolicy};
use crate::error::{Error, Result};
use crate::traits::{ConfigurationFile, FileSystem};

pub use file_system::OsFileSystem;

/// Typed JSON record store rooted at the application data directory
///
/// # Example
///
/// ```rust,no_run
/// use lcm_core::licensing::LicensingConfiguration;
/// use lcm_core::{ConfigurationStore, CoreConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = ConfigurationStore::from_config(&CoreConfig::default());
///
///     // Missing file yields the default value
///     let licensing = store.get::<LicensingConfiguration>().await;
///     println!("{} stored license(s)", licensing.licenses.len());
///
///     // Returning None leaves the file untouched
///     let written = store
///         .update::<LicensingConfiguration, _>(|_| None)
///         .await?;
///     assert!(!written);
///
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct ConfigurationStore {
    data_dir: PathBuf,
    file_system: Arc<dyn FileSystem>,
    retry: RetryPolicy,
}

impl std::fmt::Debug for ConfigurationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigurationStore")
            .field("data_dir", &self.data_dir)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl ConfigurationStore {
    /// Create a store
    ///
    /// # Parameters
    ///
    /// - `data_dir`: Directory holding the record files (created on first write)
    /// - `file_system`: File access implementation
    /// - `retry`: Retry policy for transient sharing errors
    pub fn new(
        data_dir: impl Into<PathBuf>,
        file_system: Arc<dyn FileSystem>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            data_dir: data_dir.into(),
            file_system,
            retry,
        }
    }

    /// Create a store on the real file system from configuration
    pub fn from_config(config: &CoreConfig) -> Self {
        Self::new(
            config.data_dir.clone(),
            Arc::new(OsFileSystem::new()),
            config.retry,
        )
    }

    /// Directory holding the record files
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// File name of record type `T`
    pub fn file_name<T: ConfigurationFile>() -> &'static str {
        T::FILE_NAME
    }

    /// Full path of the file holding record type `T`
    pub fn file_path<T: ConfigurationFile>(&self) -> PathBuf {
        self.data_dir.join(Self::file_name::<T>())
    }

    /// Load the current value of record `T`
    ///
    /// Never fails: a missing, unreadable, or unparsable file yields
    /// `T::default()`.
    pub async fn get<T: ConfigurationFile>(&self) -> T {
        let path = self.file_path::<T>();

        match self.file_system.exists(&path).await {
            Ok(true) => {}
            Ok(false) => {
                debug!("Configuration file does not exist: {}", path.display());
                return T::default();
            }
            Err(e) => {
                warn!(
                    "Cannot access configuration file {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                return T::default();
            }
        }

        let file_system = self.file_system.as_ref();
        let read_path = path.as_path();
        let content = match retry::with_retry(&self.retry, "read", &path, move || {
            file_system.read_to_string(read_path)
        })
        .await
        {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Configuration file disappeared: {}", path.display());
                return T::default();
            }
            Err(e) => {
                warn!(
                    "Failed to read configuration file {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                return T::default();
            }
        };

        match serde_json::from_str::<T>(&content) {
            Ok(mut value) => {
                value.set_file_path(path);
                value
            }
            Err(e) => {
                warn!(
                    "Configuration file {} appears corrupted: {}. Using defaults.",
                    path.display(),
                    e
                );
                T::default()
            }
        }
    }

    /// Read record `T`, apply `mutate`, and persist the result
    ///
    /// `mutate` returns `None` to signal "unchanged", in which case nothing is
    /// written.
    ///
    /// # Returns
    ///
    /// - `Ok(true)`: The new value was written
    /// - `Ok(false)`: `mutate` made no change, or the write was abandoned
    ///   after retries (logged)
    /// - `Err(Error)`: The data directory could not be created
    pub async fn update<T, F>(&self, mutate: F) -> Result<bool>
    where
        T: ConfigurationFile,
        F: FnOnce(&T) -> Option<T>,
    {
        let current = self.get::<T>().await;

        let Some(updated) = mutate(&current) else {
            debug!("{} unchanged, skipping write", T::FILE_NAME);
            return Ok(false);
        };

        let path = self.file_path::<T>();
        self.ensure_data_dir().await?;

        let json = serde_json::to_string_pretty(&updated)?;

        let file_system = self.file_system.as_ref();
        let write_path = path.as_path();
        let contents = json.as_str();
        match retry::with_retry(&self.retry, "write", &path, move || {
            file_system.write(write_path, contents)
        })
        .await
        {
            Ok(()) => {
                debug!("Configuration written to {}", path.display());
                Ok(true)
            }
            Err(e) => {
                error!(
                    "Failed to write configuration file {}: {}. The change was not saved.",
                    path.display(),
                    e
                );
                Ok(false)
            }
        }
    }

    /// Delete temporary files left behind by writers that crashed
    ///
    /// Only files older than `max_age` are removed, so writes in flight in
    /// other processes are left alone.
    ///
    /// # Returns
    ///
    /// The number of files removed.
    pub async fn remove_stale_temp_files(&self, max_age: Duration) -> Result<usize> {
        if !self.file_system.exists(&self.data_dir).await? {
            return Ok(0);
        }

        let now = SystemTime::now();
        let mut removed = 0;

        for entry in self.file_system.list_files(&self.data_dir).await? {
            let is_temp = entry
                .path
                .extension()
                .is_some_and(|ext| ext == file_system::TEMP_EXTENSION);
            if !is_temp {
                continue;
            }

            let age = now.duration_since(entry.modified).unwrap_or_default();
            if age < max_age {
                continue;
            }

            match self.file_system.remove_file(&entry.path).await {
                Ok(()) => {
                    removed += 1;
                    debug!("Removed stale temp file {}", entry.path.display());
                }
                Err(e) => warn!(
                    "Failed to remove stale temp file {}: {}",
                    entry.path.display(),
                    e
                ),
            }
        }

        if removed > 0 {
            info!("Removed {} stale temp file(s)", removed);
        }
        Ok(removed)
    }

    /// Create the data directory if needed
    async fn ensure_data_dir(&self) -> Result<()> {
        // A failed lookup falls through to creation, which reports the real error
        if self.file_system.exists(&self.data_dir).await.unwrap_or(false) {
            return Ok(());
        }

        let file_system = self.file_system.as_ref();
        let data_dir = self.data_dir.as_path();
        retry::with_retry(&self.retry, "directory creation", data_dir, move || {
            file_system.create_dir_all(data_dir)
        })
        .await
        .map_err(|e| {
            error!(
                "Failed to create data directory {}: {}",
                data_dir.display(),
                e
            );
            Error::Io(e)
        })
    }
}
