use core::time::Duration;

use crate::{
    DEFAULT_EPOCH, Error, MAX_APP_ID, MAX_APP_INSTANCE_ID, MAX_RESIDUE_SECONDS, MIN_KEY_LEN,
    Result, SystemClock, WallClock,
};

/// Tuning for [`HybridClock`](crate::HybridClock) drift correction.
#[cfg_attr(feature = "serde", derive(serde::Deserialize), serde(default))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClockConfig {
    /// Delay between the end of one drift check and the start of the next.
    pub drift_check_period: Duration,
    /// Drift below this is ignored.
    pub grace: Duration,
    /// Drift above this raises the shutdown flag instead of re-anchoring.
    pub catastrophic: Duration,
}

impl ClockConfig {
    pub const DEFAULT_DRIFT_CHECK_PERIOD: Duration = Duration::from_secs(10);
    pub const DEFAULT_GRACE: Duration = Duration::from_millis(5);
    pub const DEFAULT_CATASTROPHIC: Duration = Duration::from_secs(60);
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            drift_check_period: Self::DEFAULT_DRIFT_CHECK_PERIOD,
            grace: Self::DEFAULT_GRACE,
            catastrophic: Self::DEFAULT_CATASTROPHIC,
        }
    }
}

/// Secret key material for the Entity ID hash.
///
/// Only the key flagged `is_default` is used; the others are accepted so a
/// configuration listing several keys still loads.
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[derive(Clone, PartialEq, Eq)]
pub struct MacKey {
    pub material: Vec<u8>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub is_default: bool,
}

impl MacKey {
    pub fn new(material: impl Into<Vec<u8>>, is_default: bool) -> Self {
        Self {
            material: material.into(),
            is_default,
        }
    }
}

impl core::fmt::Debug for MacKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MacKey")
            .field("material", &format_args!("<{} bytes>", self.material.len()))
            .field("is_default", &self.is_default)
            .finish()
    }
}

/// Everything the identifier core consumes from its host.
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdConfig {
    /// 6-bit application id embedded in every ID.
    pub application_id: u8,
    /// 5-bit application instance id embedded in every ID.
    pub application_instance_id: u8,
    /// Origin of the residue timestamp, as a [`Duration`] since 1970-01-01
    /// UTC.
    #[cfg_attr(feature = "serde", serde(default = "default_epoch"))]
    pub epoch: Duration,
    /// Entity ID hash keys. Exactly one should be flagged default.
    pub keys: Vec<MacKey>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub clock: ClockConfig,
    /// How often the timestamp cache re-samples the clock. Also the back-off
    /// when a second's sequence budget is exhausted.
    #[cfg_attr(feature = "serde", serde(default = "default_cache_refresh"))]
    pub cache_refresh: Duration,
}

#[cfg(feature = "serde")]
fn default_epoch() -> Duration {
    DEFAULT_EPOCH
}

#[cfg(feature = "serde")]
fn default_cache_refresh() -> Duration {
    IdConfig::DEFAULT_CACHE_REFRESH
}

impl IdConfig {
    pub const DEFAULT_CACHE_REFRESH: Duration = Duration::from_millis(10);

    /// A configuration with the default epoch, clock tuning and refresh
    /// period.
    pub fn new(application_id: u8, application_instance_id: u8, keys: Vec<MacKey>) -> Self {
        Self {
            application_id,
            application_instance_id,
            epoch: DEFAULT_EPOCH,
            keys,
            clock: ClockConfig::default(),
            cache_refresh: Self::DEFAULT_CACHE_REFRESH,
        }
    }

    #[must_use]
    pub fn with_epoch(mut self, epoch: Duration) -> Self {
        self.epoch = epoch;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: ClockConfig) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_cache_refresh(mut self, cache_refresh: Duration) -> Self {
        self.cache_refresh = cache_refresh;
        self
    }

    /// The key flagged as default.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingDefaultKey`] when no key is flagged.
    pub fn default_key(&self) -> Result<&MacKey> {
        self.keys
            .iter()
            .find(|key| key.is_default)
            .ok_or(Error::MissingDefaultKey)
    }

    /// Checks the configuration against the current system time.
    ///
    /// # Errors
    ///
    /// Fails on an out-of-range application or instance id, on a missing or
    /// short key, and on an epoch that is in the future or so far in the past
    /// that the current time no longer fits the residue field.
    pub fn validate(&self) -> Result<()> {
        self.validate_at(SystemClock.now())
    }

    pub(crate) fn validate_at(&self, now: Duration) -> Result<()> {
        if self.application_id > MAX_APP_ID {
            return Err(Error::InvalidApplicationId(self.application_id));
        }
        if self.application_instance_id > MAX_APP_INSTANCE_ID {
            return Err(Error::InvalidApplicationInstanceId(
                self.application_instance_id,
            ));
        }
        if let Some(short) = self.keys.iter().find(|k| k.material.len() < MIN_KEY_LEN) {
            return Err(Error::KeyTooShort {
                len: short.material.len(),
            });
        }
        self.default_key()?;

        let elapsed = now
            .checked_sub(self.epoch)
            .ok_or(Error::EpochInFuture {
                epoch_seconds: self.epoch.as_secs(),
            })?
            .as_secs();
        if elapsed > u64::from(MAX_RESIDUE_SECONDS) {
            return Err(Error::TimestampOutOfRange {
                seconds: i64::try_from(elapsed).unwrap_or(i64::MAX),
            });
        }
        Ok(())
    }
}
