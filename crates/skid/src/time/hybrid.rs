use core::time::Duration;
use std::{
    sync::{Arc, OnceLock, Weak},
    time::Instant,
};

use portable_atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::broadcast;

use crate::{ClockConfig, PeriodicScheduler, Result, SystemClock, TaskResult, WallClock};

const DRIFT_EVENT_CAPACITY: usize = 16;

/// Emitted whenever a [`HybridClock`] re-anchors itself to the wall clock.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DriftInfo {
    /// Wall-clock reading the clock was compared against.
    pub system_time: Duration,
    /// What the clock reported at the time of the check.
    pub monotonic_time: Duration,
    /// `system_time - monotonic_time` in nanoseconds. Negative when the
    /// monotonic clock ran ahead of the wall clock.
    pub drift_nanos: i64,
}

/// Outcome of a single [`HybridClock::check_drift`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriftCheck {
    /// Drift was inside the grace band, nothing changed.
    InBand {
        /// Measured drift in nanoseconds.
        drift_nanos: i64,
    },
    /// The clock re-anchored to the wall clock.
    Resynced(DriftInfo),
    /// Drift exceeded the catastrophic threshold. The clock was left alone
    /// and [`HybridClock::shutdown_requested`] now returns `true`.
    Catastrophic(DriftInfo),
}

/// A wall-clock-like time source driven by monotonic ticks.
///
/// `now()` is the wall time captured at the last anchor plus the monotonic
/// time elapsed since, so NTP steps and manual clock changes do not leak into
/// it directly. A periodic drift check (see [`HybridClock::start`]) compares
/// it to the wall clock:
///
/// - drift inside [`ClockConfig::grace`]: nothing happens
/// - drift beyond [`ClockConfig::catastrophic`]: the shutdown flag is raised
///   and stays raised; the host must restart the process
/// - otherwise the clock re-anchors. If it ran ahead of the wall clock it
///   first waits out the difference
///
/// Reported time never goes backward. Clones share the same state.
pub struct HybridClock<W = SystemClock> {
    inner: Arc<ClockInner<W>>,
}

struct ClockInner<W> {
    wall: W,
    config: ClockConfig,
    started: Instant,
    // wall time at `started`, in nanoseconds since the Unix epoch
    anchor_nanos: AtomicU64,
    high_water_nanos: AtomicU64,
    shutdown_requested: AtomicBool,
    drift_tx: broadcast::Sender<DriftInfo>,
    drift_check: OnceLock<PeriodicScheduler>,
}

impl HybridClock<SystemClock> {
    /// A clock on the system wall clock with periodic drift checks running.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RuntimeUnavailable`](crate::Error::RuntimeUnavailable)
    /// outside a tokio runtime.
    pub fn system(config: ClockConfig) -> Result<Self> {
        Self::start(SystemClock, config)
    }
}

impl<W> HybridClock<W>
where
    W: WallClock + Send + Sync + 'static,
{
    /// Creates a clock anchored to `wall` without background drift checks.
    /// Call [`Self::check_drift`] to resynchronise manually.
    pub fn new(wall: W, config: ClockConfig) -> Self {
        let started = Instant::now();
        let anchor = duration_nanos(wall.now());
        let (drift_tx, _) = broadcast::channel(DRIFT_EVENT_CAPACITY);
        Self {
            inner: Arc::new(ClockInner {
                wall,
                config,
                started,
                anchor_nanos: AtomicU64::new(anchor),
                high_water_nanos: AtomicU64::new(anchor),
                shutdown_requested: AtomicBool::new(false),
                drift_tx,
                drift_check: OnceLock::new(),
            }),
        }
    }

    /// Creates a clock and starts checking drift every
    /// [`ClockConfig::drift_check_period`].
    ///
    /// The check task holds only a weak reference; it ends once every clone of
    /// the clock is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RuntimeUnavailable`](crate::Error::RuntimeUnavailable)
    /// outside a tokio runtime.
    pub fn start(wall: W, config: ClockConfig) -> Result<Self> {
        let clock = Self::new(wall, config);
        let weak = Arc::downgrade(&clock.inner);
        let scheduler = PeriodicScheduler::new(
            "hybrid-clock-drift",
            move || drift_task(weak.clone()),
            clock.inner.config.drift_check_period,
            true,
        )?;
        // freshly created, nothing else can have set it
        let _ = clock.inner.drift_check.set(scheduler);
        Ok(clock)
    }

    /// Current time as a [`Duration`] since the Unix epoch.
    pub fn now(&self) -> Duration {
        let inner = &self.inner;
        let elapsed = duration_nanos(inner.started.elapsed());
        let computed = inner.anchor_nanos.load(Ordering::Acquire).saturating_add(elapsed);
        let previous = inner.high_water_nanos.fetch_max(computed, Ordering::AcqRel);
        Duration::from_nanos(previous.max(computed))
    }

    /// Compares the clock with the wall clock once and corrects it.
    ///
    /// May sleep for up to the catastrophic threshold when the clock ran ahead
    /// of the wall clock.
    pub async fn check_drift(&self) -> DriftCheck {
        let inner = &self.inner;
        let mut actual = inner.wall.now();
        let reported = self.now();
        let drift_nanos = signed_diff_nanos(actual, reported);
        let magnitude = Duration::from_nanos(drift_nanos.unsigned_abs());

        if magnitude < inner.config.grace {
            return DriftCheck::InBand { drift_nanos };
        }

        let info = DriftInfo {
            system_time: actual,
            monotonic_time: reported,
            drift_nanos,
        };

        if magnitude > inner.config.catastrophic {
            inner.shutdown_requested.store(true, Ordering::Release);
            tracing::error!(
                drift_nanos,
                system_time = ?actual,
                monotonic_time = ?reported,
                "catastrophic clock drift, shutdown requested"
            );
            return DriftCheck::Catastrophic(info);
        }

        if drift_nanos < 0 {
            // monotonic time must not move backward: wait for the wall clock
            tokio::time::sleep(magnitude).await;
            actual = inner.wall.now();
        }

        self.reanchor(actual);
        tracing::info!(drift_nanos, system_time = ?actual, "hybrid clock re-anchored");
        // no subscribers is fine
        let _ = inner.drift_tx.send(info);
        DriftCheck::Resynced(info)
    }

    /// Subscribes to [`DriftInfo`] events raised on every re-anchor.
    pub fn subscribe(&self) -> broadcast::Receiver<DriftInfo> {
        self.inner.drift_tx.subscribe()
    }

    /// `true` once a catastrophic drift has been observed. Never resets.
    pub fn shutdown_requested(&self) -> bool {
        self.inner.shutdown_requested.load(Ordering::Acquire)
    }

    pub fn config(&self) -> &ClockConfig {
        &self.inner.config
    }

    /// Stops the background drift check, if one was started.
    pub fn stop(&self) {
        if let Some(scheduler) = self.inner.drift_check.get() {
            scheduler.dispose();
        }
    }

    fn reanchor(&self, actual: Duration) {
        let elapsed = duration_nanos(self.inner.started.elapsed());
        self.inner
            .anchor_nanos
            .store(duration_nanos(actual).saturating_sub(elapsed), Ordering::Release);
    }
}

impl<W> Clone for HybridClock<W> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<W> core::fmt::Debug for HybridClock<W> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HybridClock")
            .field("config", &self.inner.config)
            .field("anchor_nanos", &self.inner.anchor_nanos.load(Ordering::Relaxed))
            .field(
                "shutdown_requested",
                &self.inner.shutdown_requested.load(Ordering::Relaxed),
            )
            .finish_non_exhaustive()
    }
}

async fn drift_task<W>(weak: Weak<ClockInner<W>>) -> TaskResult
where
    W: WallClock + Send + Sync + 'static,
{
    if let Some(inner) = weak.upgrade() {
        HybridClock { inner }.check_drift().await;
    }
    Ok(())
}

fn duration_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

fn signed_diff_nanos(a: Duration, b: Duration) -> i64 {
    let diff = a.as_nanos() as i128 - b.as_nanos() as i128;
    i64::try_from(diff).unwrap_or(if diff < 0 { i64::MIN } else { i64::MAX })
}
