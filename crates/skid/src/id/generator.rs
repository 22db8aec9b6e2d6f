use core::{hash::Hash, time::Duration};

#[cfg(feature = "instrument")]
use tracing::instrument;

use crate::{
    Error, IdGenStatus, MAX_APP_ID, MAX_APP_INSTANCE_ID, MAX_RESIDUE_SECONDS, Result,
    SequenceRegistry, SourceKnownId, TimeScopedId, TimeSource,
};

/// Issues [`SourceKnownId`]s, one independent sequence per entity type.
///
/// The generator remembers a default application id, instance id and epoch
/// for [`next_id`](Self::next_id); [`generate`](Self::generate) takes them per
/// call. IDs must be parsed with the epoch they were generated against.
///
/// # Example
///
/// ```
/// use skid::{DEFAULT_EPOCH, SourceKnownId, SourceKnownIdGenerator, TimeSource};
///
/// #[derive(Clone)]
/// struct FixedTime;
/// impl TimeSource for FixedTime {
///     fn current_seconds(&self) -> i64 {
///         1_748_736_000 // 2025-06-01T00:00:00Z
///     }
/// }
///
/// let generator = SourceKnownIdGenerator::<u16, _>::new(
///     FixedTime,
///     core::time::Duration::from_millis(10),
///     5,
///     12,
///     DEFAULT_EPOCH,
/// )
/// .unwrap();
///
/// let id = generator.next_id(&1).unwrap();
/// let parsed = SourceKnownId::parse(id.id(), DEFAULT_EPOCH).unwrap();
/// assert_eq!(parsed.app_id(), 5);
/// assert_eq!(parsed.app_instance_id(), 12);
/// assert_eq!(parsed.created_at().as_secs(), 1_748_736_000);
/// ```
pub struct SourceKnownIdGenerator<K, T> {
    sequences: SequenceRegistry<K, T>,
    app_id: u8,
    app_instance_id: u8,
    epoch: Duration,
}

impl<K, T> SourceKnownIdGenerator<K, T>
where
    K: Eq + Hash + Clone,
    T: TimeSource + Clone,
{
    /// Creates a generator with default source fields and epoch.
    ///
    /// # Errors
    ///
    /// Fails when `app_id` or `app_instance_id` does not fit its field.
    pub fn new(
        time: T,
        backoff: Duration,
        app_id: u8,
        app_instance_id: u8,
        epoch: Duration,
    ) -> Result<Self> {
        check_source(app_id, app_instance_id)?;
        Ok(Self {
            sequences: SequenceRegistry::new(time, backoff),
            app_id,
            app_instance_id,
            epoch,
        })
    }

    /// Generates an ID for `key` with the given source fields and epoch,
    /// blocking while the current second is exhausted.
    ///
    /// # Errors
    ///
    /// Fails when a source field is out of range or the current time lies
    /// before `epoch` or beyond its 31-bit range.
    pub fn generate(
        &self,
        key: &K,
        app_id: u8,
        app_instance_id: u8,
        epoch: Duration,
    ) -> Result<SourceKnownId> {
        check_source(app_id, app_instance_id)?;
        let scoped = self.sequences.get_time_scoped_id(key)?;
        compose(scoped, app_id, app_instance_id, epoch)
    }

    /// Async version of [`Self::generate`].
    ///
    /// # Errors
    ///
    /// See [`Self::generate`].
    pub async fn generate_async(
        &self,
        key: &K,
        app_id: u8,
        app_instance_id: u8,
        epoch: Duration,
    ) -> Result<SourceKnownId> {
        check_source(app_id, app_instance_id)?;
        let scoped = self.sequences.time_scoped_id_async(key).await?;
        compose(scoped, app_id, app_instance_id, epoch)
    }

    /// Generates an ID for `key` with the configured defaults.
    ///
    /// # Errors
    ///
    /// Fails when the current time cannot be encoded against the configured
    /// epoch.
    pub fn next_id(&self, key: &K) -> Result<SourceKnownId> {
        let scoped = self.sequences.get_time_scoped_id(key)?;
        compose(scoped, self.app_id, self.app_instance_id, self.epoch)
    }

    /// Async version of [`Self::next_id`].
    ///
    /// # Errors
    ///
    /// See [`Self::next_id`].
    pub async fn next_id_async(&self, key: &K) -> Result<SourceKnownId> {
        let scoped = self.sequences.time_scoped_id_async(key).await?;
        compose(scoped, self.app_id, self.app_instance_id, self.epoch)
    }

    /// Non-blocking version of [`Self::next_id`].
    ///
    /// # Errors
    ///
    /// See [`Self::next_id`].
    #[cfg_attr(feature = "instrument", instrument(level = "trace", skip(self, key)))]
    pub fn try_generate(&self, key: &K) -> Result<IdGenStatus<SourceKnownId>> {
        match self.sequences.try_time_scoped_id(key)? {
            IdGenStatus::Ready { id } => Ok(IdGenStatus::Ready {
                id: compose(id, self.app_id, self.app_instance_id, self.epoch)?,
            }),
            IdGenStatus::Pending { yield_for } => Ok(IdGenStatus::Pending { yield_for }),
        }
    }

    /// Decodes an ID generated against the configured epoch.
    ///
    /// # Errors
    ///
    /// See [`SourceKnownId::parse`].
    pub fn parse(&self, id: i64) -> Result<SourceKnownId> {
        SourceKnownId::parse(id, self.epoch)
    }

    pub fn app_id(&self) -> u8 {
        self.app_id
    }

    pub fn app_instance_id(&self) -> u8 {
        self.app_instance_id
    }

    pub fn epoch(&self) -> Duration {
        self.epoch
    }

    pub fn sequences(&self) -> &SequenceRegistry<K, T> {
        &self.sequences
    }
}

impl<K, T> core::fmt::Debug for SourceKnownIdGenerator<K, T>
where
    K: Eq + Hash,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SourceKnownIdGenerator")
            .field("app_id", &self.app_id)
            .field("app_instance_id", &self.app_instance_id)
            .field("epoch", &self.epoch)
            .field("sequences", &self.sequences)
            .finish()
    }
}

fn check_source(app_id: u8, app_instance_id: u8) -> Result<()> {
    if app_id > MAX_APP_ID {
        return Err(Error::InvalidApplicationId(app_id));
    }
    if app_instance_id > MAX_APP_INSTANCE_ID {
        return Err(Error::InvalidApplicationInstanceId(app_instance_id));
    }
    Ok(())
}

fn compose(
    scoped: TimeScopedId,
    app_id: u8,
    app_instance_id: u8,
    epoch: Duration,
) -> Result<SourceKnownId> {
    let epoch_seconds = i64::try_from(epoch.as_secs()).unwrap_or(i64::MAX);
    let offset = scoped.timestamp.saturating_sub(epoch_seconds);
    let residue = u32::try_from(offset)
        .ok()
        .filter(|residue| *residue <= MAX_RESIDUE_SECONDS)
        .ok_or(Error::TimestampOutOfRange { seconds: offset })?;
    SourceKnownId::from_components(residue, app_id, app_instance_id, scoped.sequence, epoch)
}
