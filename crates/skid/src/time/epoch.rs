use core::time::Duration;

/// Default epoch: Wednesday, January 1, 2025 00:00:00 UTC
///
/// The 31-bit residue of a [`SourceKnownId`] counts whole seconds from here,
/// which covers roughly 68 years.
///
/// [`SourceKnownId`]: crate::SourceKnownId
pub const DEFAULT_EPOCH: Duration = Duration::from_secs(1_735_689_600);

/// Unix epoch: Thursday, January 1, 1970 00:00:00 UTC
pub const UNIX_EPOCH: Duration = Duration::ZERO;
