use crate::BitFieldError;

/// A result type defaulting to this crate's [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All errors this crate can produce.
///
/// Everything here is a configuration problem or a malformed input. Sequence
/// exhaustion is never an error (it is retried, see [`IdGenStatus`]) and an
/// Entity ID that fails validation is reported through
/// [`SourceKnownEntityId::valid`], not through this type.
///
/// [`IdGenStatus`]: crate::IdGenStatus
/// [`SourceKnownEntityId::valid`]: crate::SourceKnownEntityId::valid
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The application id does not fit its 6-bit field.
    #[error("application id {0} exceeds the maximum of {max}", max = crate::MAX_APP_ID)]
    InvalidApplicationId(u8),

    /// The application instance id does not fit its 5-bit field.
    #[error(
        "application instance id {0} exceeds the maximum of {max}",
        max = crate::MAX_APP_INSTANCE_ID
    )]
    InvalidApplicationInstanceId(u8),

    /// A timestamp cannot be represented in the residue field or in a time
    /// scope.
    #[error("timestamp {seconds}s is outside the representable range")]
    TimestampOutOfRange {
        /// The offending timestamp, in seconds.
        seconds: i64,
    },

    /// The configured epoch lies after the current wall-clock time.
    #[error("epoch {epoch_seconds}s is later than the current time")]
    EpochInFuture {
        /// The configured epoch, in seconds since the Unix epoch.
        epoch_seconds: u64,
    },

    /// No MAC key was flagged as the default key.
    #[error("no default MAC key configured")]
    MissingDefaultKey,

    /// A MAC key is shorter than [`MIN_KEY_LEN`](crate::MIN_KEY_LEN).
    #[error("MAC key is {len} bytes, at least {min} required", min = crate::MIN_KEY_LEN)]
    KeyTooShort {
        /// Length of the rejected key material.
        len: usize,
    },

    /// A bit-field layout did not fit.
    #[error(transparent)]
    BitField(#[from] BitFieldError),

    /// Background maintenance needs a tokio runtime and none was running.
    #[error("no tokio runtime available to run background tasks")]
    RuntimeUnavailable,

    /// A 64-bit value is not a source-known ID this crate can decode.
    #[error("{0} is not a valid source-known id")]
    InvalidId(i64),
}
