//! Test doubles and common utilities for contract tests
//!
//! A "process" in these tests is a fresh engine/store/lock set pointing at
//! the same data directory. Nothing is shared between two simulated
//! processes except the files on disk and, where noted, the clock.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use lcm_core::licensing::UnsignedKeyParser;
use lcm_core::traits::FileEntry;
use lcm_core::{
    Clock, ConfigurationStore, CoreConfig, FileSystem, LicenseRegistrationEngine, OsFileSystem,
    ProcessLocks, RetryPolicy,
};
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Instant of "day 0" in the time-window tests
pub fn day(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 6, 9, 30, 0).unwrap() + Duration::days(n)
}

/// A clock that only moves when told to
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(now),
        })
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// A file system that fails with sharing violations on demand
pub struct FlakyFileSystem {
    inner: OsFileSystem,
    /// Remaining reads that fail with `WouldBlock`
    failing_reads: AtomicUsize,
    /// Remaining writes that fail with `WouldBlock`
    failing_writes: AtomicUsize,
    /// Directory creation fails with `PermissionDenied`
    deny_directory_creation: AtomicBool,
    /// Existence checks fail with `PermissionDenied`
    deny_lookups: AtomicBool,
    read_attempts: AtomicUsize,
    write_attempts: AtomicUsize,
}

impl FlakyFileSystem {
    pub fn new() -> Self {
        Self {
            inner: OsFileSystem::new(),
            failing_reads: AtomicUsize::new(0),
            failing_writes: AtomicUsize::new(0),
            deny_directory_creation: AtomicBool::new(false),
            deny_lookups: AtomicBool::new(false),
            read_attempts: AtomicUsize::new(0),
            write_attempts: AtomicUsize::new(0),
        }
    }

    pub fn with_failing_reads(self, count: usize) -> Self {
        self.failing_reads.store(count, Ordering::SeqCst);
        self
    }

    pub fn with_failing_writes(self, count: usize) -> Self {
        self.failing_writes.store(count, Ordering::SeqCst);
        self
    }

    pub fn denying_directory_creation(self) -> Self {
        self.deny_directory_creation.store(true, Ordering::SeqCst);
        self
    }

    pub fn denying_lookups(self) -> Self {
        self.deny_lookups.store(true, Ordering::SeqCst);
        self
    }

    pub fn read_attempts(&self) -> usize {
        self.read_attempts.load(Ordering::SeqCst)
    }

    pub fn write_attempts(&self) -> usize {
        self.write_attempts.load(Ordering::SeqCst)
    }

    /// Consume one injected failure, if any remain
    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn access_denied() -> io::Error {
        io::Error::new(io::ErrorKind::PermissionDenied, "access denied")
    }

    fn sharing_violation() -> io::Error {
        io::Error::new(io::ErrorKind::WouldBlock, "file is being used by another process")
    }
}

#[async_trait]
impl FileSystem for FlakyFileSystem {
    async fn exists(&self, path: &Path) -> io::Result<bool> {
        if self.deny_lookups.load(Ordering::SeqCst) {
            return Err(Self::access_denied());
        }
        self.inner.exists(path).await
    }

    async fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.read_attempts.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.failing_reads) {
            return Err(Self::sharing_violation());
        }
        self.inner.read_to_string(path).await
    }

    async fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        self.write_attempts.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.failing_writes) {
            return Err(Self::sharing_violation());
        }
        self.inner.write(path, contents).await
    }

    async fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        if self.deny_directory_creation.load(Ordering::SeqCst) {
            return Err(Self::access_denied());
        }
        self.inner.create_dir_all(path).await
    }

    async fn list_files(&self, dir: &Path) -> io::Result<Vec<FileEntry>> {
        self.inner.list_files(dir).await
    }

    async fn remove_file(&self, path: &Path) -> io::Result<()> {
        self.inner.remove_file(path).await
    }
}

/// Fast retry policy for tests
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_retries: 3,
        retry_delay_ms: 1,
    }
}

/// A data directory plus a shared clock, from which "processes" are spawned
pub struct Machine {
    pub dir: TempDir,
    pub clock: Arc<ManualClock>,
}

impl Machine {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            dir: tempfile::tempdir().expect("temp dir"),
            clock: ManualClock::new(now),
        }
    }

    pub fn config(&self) -> CoreConfig {
        let mut config = CoreConfig::with_data_dir(self.dir.path());
        config.retry = fast_retry();
        config
    }

    /// A store as a separate process would open it
    pub fn store(&self) -> ConfigurationStore {
        ConfigurationStore::new(self.dir.path(), Arc::new(OsFileSystem::new()), fast_retry())
    }

    /// An engine as a separate process would build it
    pub fn process(&self) -> Arc<LicenseRegistrationEngine> {
        let config = self.config();
        let engine = LicenseRegistrationEngine::new(
            Arc::new(self.store()),
            Arc::new(ProcessLocks::new(config.lock_dir())),
            self.clock.clone(),
            Arc::new(UnsignedKeyParser),
            &config,
        )
        .expect("engine construction succeeds");
        Arc::new(engine)
    }
}
