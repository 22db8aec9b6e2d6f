use core::time::Duration;
use std::{sync::Arc, time::SystemTime};

/// A source of wall-clock time, as a [`Duration`] since the Unix epoch.
///
/// This is the "actual" time a [`HybridClock`] measures its drift against.
/// Tests plug in a settable clock here.
///
/// [`HybridClock`]: crate::HybridClock
pub trait WallClock {
    fn now(&self) -> Duration;
}

/// The operating system's real-time clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl WallClock for SystemClock {
    /// A system clock set before 1970 reads as the Unix epoch.
    fn now(&self) -> Duration {
        SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
    }
}

impl<W: WallClock + ?Sized> WallClock for Arc<W> {
    fn now(&self) -> Duration {
        (**self).now()
    }
}

/// A trait for time sources that hand out whole seconds.
///
/// This abstraction lets a [`SequenceManager`] run on the cached clock in
/// production and on a mocked time source in tests.
///
/// # Example
///
/// ```
/// use skid::TimeSource;
///
/// struct FixedTime;
/// impl TimeSource for FixedTime {
///     fn current_seconds(&self) -> i64 {
///         1234
///     }
/// }
///
/// let time = FixedTime;
/// assert_eq!(time.current_seconds(), 1234);
/// ```
///
/// [`SequenceManager`]: crate::SequenceManager
pub trait TimeSource {
    /// Returns the current time in whole seconds since the Unix epoch.
    fn current_seconds(&self) -> i64;

    /// Re-reads the underlying clock, for sources that cache it. Called by
    /// waiting callers before they sleep, so progress never depends on a
    /// background refresh getting scheduled.
    fn resample(&self) {}
}

impl<T: TimeSource + ?Sized> TimeSource for Arc<T> {
    fn current_seconds(&self) -> i64 {
        (**self).current_seconds()
    }

    fn resample(&self) {
        (**self).resample();
    }
}
