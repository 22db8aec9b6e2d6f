use core::time::Duration;
use std::sync::{Arc, OnceLock, Weak};

use portable_atomic::{AtomicI64, Ordering};

use crate::{
    HybridClock, PeriodicScheduler, Result, SystemClock, TaskResult, TimeSource, WallClock,
};

/// Samples a [`HybridClock`] in the background and serves the current whole
/// second from an atomic slot.
///
/// ID generation reads the time on every call but only needs one-second
/// resolution, so a background refresh every few milliseconds replaces a
/// clock read per ID with a single atomic load. The slot only ever moves
/// forward.
///
/// Clones share the same slot. The refresh task holds a weak reference and
/// ends when the last clone is dropped.
pub struct TimestampCache<W = SystemClock> {
    inner: Arc<CacheInner<W>>,
}

struct CacheInner<W> {
    clock: HybridClock<W>,
    seconds: AtomicI64,
    refresh_period: Duration,
    refresher: OnceLock<PeriodicScheduler>,
}

impl<W> TimestampCache<W>
where
    W: WallClock + Send + Sync + 'static,
{
    /// Creates a cache holding the clock's current second. Without
    /// [`Self::start`] it only advances when [`Self::refresh`] is called.
    pub fn new(clock: HybridClock<W>, refresh_period: Duration) -> Self {
        let cache = Self {
            inner: Arc::new(CacheInner {
                clock,
                seconds: AtomicI64::new(i64::MIN),
                refresh_period,
                refresher: OnceLock::new(),
            }),
        };
        cache.refresh();
        cache
    }

    /// Creates a cache refreshed every `refresh_period`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RuntimeUnavailable`](crate::Error::RuntimeUnavailable)
    /// outside a tokio runtime.
    pub fn start(clock: HybridClock<W>, refresh_period: Duration) -> Result<Self> {
        let cache = Self::new(clock, refresh_period);
        let weak = Arc::downgrade(&cache.inner);
        let scheduler = PeriodicScheduler::new(
            "timestamp-cache",
            move || refresh_task(weak.clone()),
            refresh_period,
            true,
        )?;
        let _ = cache.inner.refresher.set(scheduler);
        Ok(cache)
    }

    /// Re-samples the clock, truncating to whole seconds.
    pub fn refresh(&self) {
        let seconds = i64::try_from(self.inner.clock.now().as_secs()).unwrap_or(i64::MAX);
        self.inner.seconds.fetch_max(seconds, Ordering::AcqRel);
    }

    /// Whole seconds elapsed since `epoch`. Negative before the epoch.
    pub fn current_timestamp(&self, epoch: Duration) -> i64 {
        let epoch = i64::try_from(epoch.as_secs()).unwrap_or(i64::MAX);
        self.current_seconds().saturating_sub(epoch)
    }

    pub fn refresh_period(&self) -> Duration {
        self.inner.refresh_period
    }

    pub fn clock(&self) -> &HybridClock<W> {
        &self.inner.clock
    }

    /// Stops the background refresh, if one was started.
    pub fn stop(&self) {
        if let Some(scheduler) = self.inner.refresher.get() {
            scheduler.dispose();
        }
    }
}

impl<W> TimeSource for TimestampCache<W>
where
    W: WallClock + Send + Sync + 'static,
{
    fn current_seconds(&self) -> i64 {
        self.inner.seconds.load(Ordering::Acquire)
    }

    fn resample(&self) {
        self.refresh();
    }
}

impl<W> Clone for TimestampCache<W> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<W> core::fmt::Debug for TimestampCache<W> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TimestampCache")
            .field("seconds", &self.inner.seconds.load(Ordering::Relaxed))
            .field("refresh_period", &self.inner.refresh_period)
            .finish_non_exhaustive()
    }
}

async fn refresh_task<W>(weak: Weak<CacheInner<W>>) -> TaskResult
where
    W: WallClock + Send + Sync + 'static,
{
    if let Some(inner) = weak.upgrade() {
        TimestampCache { inner }.refresh();
    }
    Ok(())
}
