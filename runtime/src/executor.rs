//! Bounded task executor.
//!
//! Each executor caps how many workers of one role run at once. Tasks past
//! the cap wait for a permit; a task whose cancellation token fires while it
//! waits never runs at all. Shutdown closes the executor, gives in-flight
//! tasks a grace period, and aborts whatever is left.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::{AbortHandle, JoinHandle};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// Result of shutting an executor down.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Every task finished inside the grace period
    pub drained: bool,
    /// Tasks still running when the grace period ran out
    pub aborted: usize,
}

impl ShutdownReport {
    /// Combine reports from several executors
    #[must_use]
    pub const fn merge(self, other: Self) -> Self {
        Self {
            drained: self.drained && other.drained,
            aborted: self.aborted + other.aborted,
        }
    }
}

/// Fixed-width executor for one kind of worker.
pub struct Executor {
    name: &'static str,
    max_concurrent: usize,
    semaphore: Arc<Semaphore>,
    tracker: TaskTracker,
    handles: Mutex<Vec<AbortHandle>>,
}

impl Executor {
    /// Create an executor running at most `max_concurrent` tasks at once
    ///
    /// # Arguments
    ///
    /// * `name` - Name for logging (e.g., "vendors")
    /// * `max_concurrent` - Number of concurrent slots; clamped to at least one
    #[must_use]
    pub fn new(name: &'static str, max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            name,
            max_concurrent,
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            tracker: TaskTracker::new(),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Schedule `task`.
    ///
    /// The returned handle yields `None` if `cancel` fired before a slot
    /// freed up, or if the executor was shut down first.
    pub fn spawn<F>(&self, cancel: CancellationToken, task: F) -> JoinHandle<Option<F::Output>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let semaphore = Arc::clone(&self.semaphore);
        let name = self.name;
        let handle = self.tracker.spawn(async move {
            let permit = tokio::select! {
                biased;
                () = cancel.cancelled() => None,
                permit = semaphore.acquire_owned() => permit.ok(),
            };
            let Some(_permit) = permit else {
                debug!(executor = name, "Task cancelled before it got a slot");
                return None;
            };
            Some(task.await)
        });

        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        handles.retain(|h| !h.is_finished());
        handles.push(handle.abort_handle());
        handle
    }

    /// Tasks scheduled and not yet finished, including those waiting for a slot
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Free slots right now
    #[must_use]
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Configured width
    #[must_use]
    pub const fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Executor name
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Whether [`shutdown`](Self::shutdown) has been called
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tracker.is_closed()
    }

    /// Stop accepting work and wait up to `grace` for in-flight tasks.
    ///
    /// Tasks still running after `grace` are aborted. Callers are expected
    /// to have cancelled the tasks' tokens first.
    pub async fn shutdown(&self, grace: Duration) -> ShutdownReport {
        self.semaphore.close();
        self.tracker.close();

        if tokio::time::timeout(grace, self.tracker.wait()).await.is_ok() {
            info!(executor = self.name, "Executor drained");
            return ShutdownReport {
                drained: true,
                aborted: 0,
            };
        }

        let handles =
            std::mem::take(&mut *self.handles.lock().unwrap_or_else(PoisonError::into_inner));
        let mut aborted = 0;
        for handle in handles.into_iter().filter(|h| !h.is_finished()) {
            handle.abort();
            aborted += 1;
        }
        warn!(
            executor = self.name,
            aborted,
            grace_ms = u64::try_from(grace.as_millis()).unwrap_or(u64::MAX),
            "Executor shutdown timed out, aborting remaining tasks"
        );
        ShutdownReport {
            drained: false,
            aborted,
        }
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("name", &self.name)
            .field("max_concurrent", &self.max_concurrent)
            .field("in_flight", &self.in_flight())
            .finish_non_exhaustive()
    }
}
