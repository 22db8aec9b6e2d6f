use core::time::Duration;

/// Represents the result of attempting to obtain the next value from a
/// sequence without blocking.
///
/// This type models the outcome of [`SequenceManager::try_time_scoped_id`] and
/// [`SourceKnownIdGenerator::try_generate`]:
///
/// - [`IdGenStatus::Ready`] indicates a new value was produced.
/// - [`IdGenStatus::Pending`] means the current one-second scope is exhausted
///   and the wall second has not advanced yet. Retry after `yield_for`.
///
/// This allows non-blocking generation loops and clean backoff strategies.
///
/// # Example
///
/// ```
/// use skid::{IdGenStatus, SequenceManager, TimeSource};
///
/// struct FixedTime;
/// impl TimeSource for FixedTime {
///     fn current_seconds(&self) -> i64 {
///         1_750_000_000
///     }
/// }
///
/// let manager = SequenceManager::new(FixedTime, core::time::Duration::from_millis(10));
/// match manager.try_time_scoped_id().unwrap() {
///     IdGenStatus::Ready { id } => assert_eq!(id.sequence, 0),
///     IdGenStatus::Pending { yield_for } => println!("Back off for: {yield_for:?}"),
/// }
/// ```
///
/// [`SequenceManager::try_time_scoped_id`]: crate::SequenceManager::try_time_scoped_id
/// [`SourceKnownIdGenerator::try_generate`]: crate::SourceKnownIdGenerator::try_generate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdGenStatus<T> {
    /// A unique value was produced and is ready to use.
    Ready {
        /// The produced value.
        id: T,
    },
    /// No value could be produced because the sequence has been exhausted for
    /// the current second.
    Pending {
        /// How long to wait before trying again.
        yield_for: Duration,
    },
}

impl<T> IdGenStatus<T> {
    /// Maps the ready value, leaving a pending status untouched.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> IdGenStatus<U> {
        match self {
            Self::Ready { id } => IdGenStatus::Ready { id: f(id) },
            Self::Pending { yield_for } => IdGenStatus::Pending { yield_for },
        }
    }
}
