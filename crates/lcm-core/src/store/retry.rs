//! Retry of transient file errors
//!
//! Another process briefly holding a file open (antivirus, a sibling writer,
//! an indexer) shows up as a sharing or locking error. Those are retried a
//! fixed number of times; everything else fails on the first attempt.

use std::future::Future;
use std::io::{self, ErrorKind};
use std::path::Path;
use tracing::warn;

use crate::config::RetryPolicy;

/// Whether `err` is a sharing/locking error worth retrying
pub(crate) fn is_transient(err: &io::Error) -> bool {
    if matches!(
        err.kind(),
        ErrorKind::WouldBlock | ErrorKind::Interrupted | ErrorKind::TimedOut | ErrorKind::ResourceBusy
    ) {
        return true;
    }

    // ERROR_SHARING_VIOLATION and ERROR_LOCK_VIOLATION
    #[cfg(windows)]
    {
        matches!(err.raw_os_error(), Some(32) | Some(33))
    }

    #[cfg(not(windows))]
    {
        false
    }
}

/// Run `attempt` until it succeeds, fails permanently, or retries run out
///
/// # Parameters
///
/// - `policy`: number of retries and delay between attempts
/// - `operation`: short description used in log messages
/// - `path`: file the operation touches, for log messages
/// - `attempt`: produces one attempt of the operation
pub(crate) async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    path: &Path,
    mut attempt: F,
) -> io::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<T>>,
{
    let mut retries = 0;
    loop {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(e) if is_transient(&e) && retries < policy.max_retries => {
                retries += 1;
                warn!(
                    "Transient error during {} of {} (retry {}/{}): {}",
                    operation,
                    path.display(),
                    retries,
                    policy.max_retries,
                    e
                );
                tokio::time::sleep(policy.delay()).await;
            }
            Err(e) => return Err(e),
        }
    }
}
