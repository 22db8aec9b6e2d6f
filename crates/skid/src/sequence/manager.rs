use core::time::Duration;

use portable_atomic::{AtomicU64, Ordering};
#[cfg(feature = "instrument")]
use tracing::instrument;

use crate::{Error, IdGenStatus, Result, TimeScope, TimeScopedId, TimeSource};

/// Hands out strictly increasing sequence numbers within one-second scopes.
///
/// One manager serves one entity type. The live [`TimeScope`] is held in an
/// atomic word: claiming a sequence is a single `fetch_add`, and moving to a
/// newer second is a compare-and-swap that at most one thread wins. Losers
/// retry against whatever scope the winner installed.
///
/// Within a second sequences start at 0 and never repeat. When all
/// [`MAX_SEQUENCE`] + 1 sequences of a second are taken the manager reports
/// [`IdGenStatus::Pending`] until the time source moves on; the blocking and
/// async front-ends wait out the back-off and retry.
///
/// [`MAX_SEQUENCE`]: crate::MAX_SEQUENCE
pub struct SequenceManager<T> {
    #[cfg(feature = "cache-padded")]
    state: crossbeam_utils::CachePadded<AtomicU64>,
    #[cfg(not(feature = "cache-padded"))]
    state: AtomicU64,
    time: T,
    backoff: Duration,
}

impl<T> SequenceManager<T>
where
    T: TimeSource,
{
    /// Creates a manager reading seconds from `time`. `backoff` is how long to
    /// wait after the current second runs out of sequences, normally the
    /// refresh period of the timestamp cache.
    pub fn new(time: T, backoff: Duration) -> Self {
        let initial = TimeScope::EMPTY.to_raw();
        Self {
            #[cfg(feature = "cache-padded")]
            state: crossbeam_utils::CachePadded::new(AtomicU64::new(initial)),
            #[cfg(not(feature = "cache-padded"))]
            state: AtomicU64::new(initial),
            time,
            backoff,
        }
    }

    /// Attempts to claim the next sequence without blocking.
    ///
    /// # Returns
    /// - `Ok(IdGenStatus::Ready { id })`: a unique `(second, sequence)` pair
    /// - `Ok(IdGenStatus::Pending { yield_for })`: retry after `yield_for`. A
    ///   zero duration means another thread won a scope rollover and the call
    ///   can be retried immediately
    ///
    /// # Errors
    ///
    /// Returns [`Error::TimestampOutOfRange`] when the time source reports a
    /// second before 1970 or after 2106.
    #[cfg_attr(feature = "instrument", instrument(level = "trace", skip(self)))]
    pub fn try_time_scoped_id(&self) -> Result<IdGenStatus<TimeScopedId>> {
        let now = self.time.current_seconds();
        let now_scope =
            u32::try_from(now).map_err(|_| Error::TimestampOutOfRange { seconds: now })?;

        let current_raw = self.state.load(Ordering::Acquire);
        let current = TimeScope::from_raw(current_raw);

        if current.timestamp() < now_scope {
            return Ok(self.cold_rollover(current_raw, now_scope));
        }

        // The live scope is for `now` or a later second another thread saw
        // first. Either way it is safe to claim from.
        let claimed = TimeScope::from_raw(self.state.fetch_add(1, Ordering::AcqRel));
        match claimed.sequence() {
            Some(sequence) => Ok(IdGenStatus::Ready {
                id: TimeScopedId {
                    timestamp: i64::from(claimed.timestamp()),
                    sequence,
                },
            }),
            None => Ok(IdGenStatus::Pending {
                yield_for: self.backoff,
            }),
        }
    }

    /// Claims the next sequence, sleeping the calling thread while the current
    /// second is exhausted. The time source is re-sampled after each sleep, so
    /// this returns even when nothing else refreshes it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TimestampOutOfRange`] when the time source is outside
    /// the range a scope can represent.
    pub fn get_time_scoped_id(&self) -> Result<TimeScopedId> {
        loop {
            match self.try_time_scoped_id()? {
                IdGenStatus::Ready { id } => break Ok(id),
                IdGenStatus::Pending { yield_for } if yield_for.is_zero() => {
                    core::hint::spin_loop();
                }
                IdGenStatus::Pending { yield_for } => {
                    tracing::trace!(?yield_for, "sequence exhausted, backing off");
                    std::thread::sleep(yield_for);
                    self.time.resample();
                }
            }
        }
    }

    /// Async version of [`Self::get_time_scoped_id`] that sleeps on the tokio
    /// timer instead of blocking the thread.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TimestampOutOfRange`] when the time source is outside
    /// the range a scope can represent.
    pub async fn time_scoped_id_async(&self) -> Result<TimeScopedId> {
        loop {
            match self.try_time_scoped_id()? {
                IdGenStatus::Ready { id } => break Ok(id),
                IdGenStatus::Pending { yield_for } if yield_for.is_zero() => {
                    tokio::task::yield_now().await;
                }
                IdGenStatus::Pending { yield_for } => {
                    tracing::trace!(?yield_for, "sequence exhausted, backing off");
                    tokio::time::sleep(yield_for).await;
                    self.time.resample();
                }
            }
        }
    }

    /// The live scope, for inspection.
    pub fn current_scope(&self) -> TimeScope {
        TimeScope::from_raw(self.state.load(Ordering::Acquire))
    }

    pub fn time(&self) -> &T {
        &self.time
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    #[cold]
    #[inline(never)]
    fn cold_rollover(&self, current_raw: u64, now: u32) -> IdGenStatus<TimeScopedId> {
        let fresh = TimeScope::claimed(now);
        if self
            .state
            .compare_exchange(current_raw, fresh.to_raw(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            IdGenStatus::Ready {
                id: TimeScopedId {
                    timestamp: i64::from(now),
                    sequence: 0,
                },
            }
        } else {
            // CAS failed - another thread claimed from or replaced the scope.
            // Yield 0 to retry immediately against the new state.
            IdGenStatus::Pending {
                yield_for: Duration::ZERO,
            }
        }
    }
}

impl<T> core::fmt::Debug for SequenceManager<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SequenceManager")
            .field("scope", &TimeScope::from_raw(self.state.load(Ordering::Relaxed)))
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}
