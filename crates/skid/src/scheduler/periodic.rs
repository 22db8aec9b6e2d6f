use core::{future::Future, time::Duration};
use std::{panic::AssertUnwindSafe, sync::Arc};

use futures::{FutureExt, future::BoxFuture};
use parking_lot::Mutex;
use portable_atomic::{AtomicBool, Ordering};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use crate::{Error, Result};

/// Error type scheduled actions may fail with.
pub type TaskError = Box<dyn core::error::Error + Send + Sync>;

/// Outcome of one scheduled invocation.
pub type TaskResult = core::result::Result<(), TaskError>;

type Action = dyn Fn() -> BoxFuture<'static, TaskResult> + Send + Sync;
type FailureHandler = dyn Fn(&TaskFailure) + Send + Sync;

/// Why a scheduled invocation did not complete normally.
#[derive(Debug)]
pub enum TaskFailure {
    /// The action returned an error.
    Failed(TaskError),
    /// The action panicked. The panic was contained.
    Panicked,
}

impl core::fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Failed(e) => write!(f, "scheduled action failed: {e}"),
            Self::Panicked => f.write_str("scheduled action panicked"),
        }
    }
}

/// Runs an async action repeatedly, `period` after the previous run finished.
///
/// - At most one invocation is in flight. [`trigger`](Self::trigger) while an
///   invocation runs does nothing and returns `false`.
/// - The delay is measured from the end of a run, so the effective cadence is
///   `period + execution time`.
/// - Errors and panics from the action are reported to the failure handler
///   (and logged) and never stop the schedule.
/// - [`dispose`](Self::dispose) is idempotent, stops all future runs, and does
///   not wait for a run that is already in flight. Dropping the scheduler
///   disposes it.
///
/// The loop runs as a task on the tokio runtime that was current when the
/// scheduler was created.
pub struct PeriodicScheduler {
    inner: Arc<Inner>,
}

struct Inner {
    name: &'static str,
    action: Box<Action>,
    on_failure: Option<Box<FailureHandler>>,
    period: Duration,
    busy: AtomicBool,
    disposed: AtomicBool,
    running: Mutex<Option<CancellationToken>>,
    handle: Handle,
}

impl PeriodicScheduler {
    /// Creates a scheduler for `action`, starting it right away when
    /// `auto_start` is set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RuntimeUnavailable`] when called outside a tokio
    /// runtime.
    pub fn new<F, Fut>(
        name: &'static str,
        action: F,
        period: Duration,
        auto_start: bool,
    ) -> Result<Self>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TaskResult> + Send + 'static,
    {
        Self::build(name, action, period, None, auto_start)
    }

    /// Like [`Self::new`], reporting failed invocations to `on_failure`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RuntimeUnavailable`] when called outside a tokio
    /// runtime.
    pub fn with_failure_handler<F, Fut, H>(
        name: &'static str,
        action: F,
        period: Duration,
        on_failure: H,
        auto_start: bool,
    ) -> Result<Self>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TaskResult> + Send + 'static,
        H: Fn(&TaskFailure) + Send + Sync + 'static,
    {
        Self::build(name, action, period, Some(Box::new(on_failure)), auto_start)
    }

    fn build<F, Fut>(
        name: &'static str,
        action: F,
        period: Duration,
        on_failure: Option<Box<FailureHandler>>,
        auto_start: bool,
    ) -> Result<Self>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TaskResult> + Send + 'static,
    {
        let handle = Handle::try_current().map_err(|_| Error::RuntimeUnavailable)?;
        let scheduler = Self {
            inner: Arc::new(Inner {
                name,
                action: Box::new(move || action().boxed()),
                on_failure,
                period,
                busy: AtomicBool::new(false),
                disposed: AtomicBool::new(false),
                running: Mutex::new(None),
                handle,
            }),
        };
        if auto_start {
            scheduler.start();
        }
        Ok(scheduler)
    }

    /// Starts the periodic loop. Does nothing if it is already running or the
    /// scheduler was disposed.
    pub fn start(&self) {
        if self.inner.disposed.load(Ordering::Acquire) {
            return;
        }
        let mut running = self.inner.running.lock();
        if running.is_some() {
            return;
        }
        let token = CancellationToken::new();
        self.inner
            .handle
            .spawn(Arc::clone(&self.inner).run_loop(token.clone()));
        *running = Some(token);
        tracing::debug!(scheduler = self.inner.name, period = ?self.inner.period, "started");
    }

    /// Stops the loop after the current invocation, if any. The scheduler can
    /// be started again.
    pub fn stop(&self) {
        if let Some(token) = self.inner.running.lock().take() {
            token.cancel();
            tracing::debug!(scheduler = self.inner.name, "stopped");
        }
    }

    /// Permanently stops the scheduler. Safe to call more than once.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.stop();
    }

    /// Runs the action now unless an invocation is already in flight.
    ///
    /// Returns `false` without running anything when busy or disposed.
    pub async fn trigger(&self) -> bool {
        if self.inner.disposed.load(Ordering::Acquire) {
            return false;
        }
        self.inner.run_once().await
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.lock().is_some()
    }

    pub fn is_busy(&self) -> bool {
        self.inner.busy.load(Ordering::Acquire)
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    pub fn period(&self) -> Duration {
        self.inner.period
    }
}

impl Drop for PeriodicScheduler {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl core::fmt::Debug for PeriodicScheduler {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PeriodicScheduler")
            .field("name", &self.inner.name)
            .field("period", &self.inner.period)
            .field("running", &self.is_running())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl Inner {
    async fn run_loop(self: Arc<Self>, token: CancellationToken) {
        loop {
            tokio::select! {
                () = token.cancelled() => break,
                () = tokio::time::sleep(self.period) => {}
            }
            if self.disposed.load(Ordering::Acquire) {
                break;
            }
            self.run_once().await;
        }
    }

    async fn run_once(&self) -> bool {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        // cleared even if the caller drops this future mid-run
        let _busy = BusyGuard(&self.busy);

        let outcome = match std::panic::catch_unwind(AssertUnwindSafe(|| (self.action)())) {
            Ok(fut) => AssertUnwindSafe(fut).catch_unwind().await,
            Err(panic) => Err(panic),
        };
        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(TaskFailure::Failed(e)),
            Err(_) => Some(TaskFailure::Panicked),
        };
        if let Some(failure) = failure {
            tracing::warn!(scheduler = self.name, %failure, "scheduled action did not complete");
            if let Some(on_failure) = &self.on_failure {
                on_failure(&failure);
            }
        }
        true
    }
}

struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
