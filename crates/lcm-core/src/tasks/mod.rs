// # Task Tracker
//
// Fire-and-forget background work with a drain barrier.
//
// ## Purpose
//
// Commands that start background work (telemetry upload, cleanup) must not
// exit before that work finishes, but they also must not hold on to task
// handles or be crashed by a failing job.
//
// ## Mechanism
//
// - `enqueue` increments the pending counter before spawning
// - A drop guard inside the spawned task decrements it exactly once, whether
//   the work succeeded, returned an error, or panicked
// - The work runs in its own task, so a panic is caught at the join point
//   and logged
// - `when_no_pending_task` re-checks the counter after every zero
//   notification, so it never misses a wakeup
//
// No `JoinHandle` is retained; memory stays flat under sustained load.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tracing::{error, warn};

use crate::error::{Error, Result};

/// Fire-and-forget task scheduler with a pending-count barrier
///
/// Cloning is cheap; clones share the same counter.
///
/// # Example
///
/// ```rust,no_run
/// use lcm_core::TaskTracker;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let tracker = TaskTracker::current()?;
///
///     tracker.enqueue(async {
///         // upload, cleanup, ...
///         Ok::<(), std::io::Error>(())
///     });
///
///     tracker.when_no_pending_task().await;
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct TaskTracker {
    inner: Arc<Pending>,
    handle: Handle,
}

#[derive(Debug, Default)]
struct Pending {
    count: AtomicUsize,
    drained: Notify,
}

/// Decrements the pending counter when dropped
struct PendingGuard {
    pending: Arc<Pending>,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if self.pending.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.pending.drained.notify_waiters();
        }
    }
}

impl TaskTracker {
    /// Create a tracker spawning work on the given runtime
    pub fn new(handle: Handle) -> Self {
        Self {
            inner: Arc::new(Pending::default()),
            handle,
        }
    }

    /// Create a tracker on the runtime of the calling context
    ///
    /// Fails with [`Error::Task`] outside of a tokio runtime.
    pub fn current() -> Result<Self> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|e| Error::task(format!("No tokio runtime available: {}", e)))
    }

    /// Number of enqueued units of work that have not completed
    pub fn pending_count(&self) -> usize {
        self.inner.count.load(Ordering::Acquire)
    }

    /// Schedule `work` in the background
    ///
    /// Returns immediately. Can be called from any thread, including threads
    /// outside the runtime. Errors and panics of `work` are logged and never
    /// propagate.
    pub fn enqueue<F, E>(&self, work: F)
    where
        F: Future<Output = std::result::Result<(), E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        self.inner.count.fetch_add(1, Ordering::AcqRel);
        let guard = PendingGuard {
            pending: Arc::clone(&self.inner),
        };

        let handle = self.handle.clone();
        self.handle.spawn(async move {
            let _guard = guard;
            match handle.spawn(work).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Background task failed: {}", e),
                Err(e) if e.is_panic() => error!("Background task panicked"),
                Err(e) => warn!("Background task did not complete: {}", e),
            }
        });
    }

    /// Wait until no enqueued work is pending
    ///
    /// Completes once the counter is observed at zero at or after the call.
    /// Work enqueued after that moment is not awaited.
    pub async fn when_no_pending_task(&self) {
        loop {
            let drained = self.inner.drained.notified();
            tokio::pin!(drained);
            drained.as_mut().enable();

            if self.inner.count.load(Ordering::Acquire) == 0 {
                return;
            }

            drained.await;
        }
    }
}
