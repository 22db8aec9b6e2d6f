use core::{cmp::Ordering, fmt, hash::Hash, time::Duration};

use crate::{
    BitFieldBuilder, BitFieldParser, Error, MAX_SEQUENCE, ResidueWidth, Result, SEQUENCE_BITS,
    Sign,
};

/// Residue layout used by [`SourceKnownId`].
pub const RESIDUE_WIDTH: ResidueWidth = ResidueWidth::UInt;

/// Largest representable offset from the epoch, in seconds (about 68 years).
pub const MAX_RESIDUE_SECONDS: u32 = RESIDUE_WIDTH.max_residue();

/// Width of the application id field.
pub const APP_ID_BITS: u32 = 6;

/// Width of the application instance id field.
pub const APP_INSTANCE_ID_BITS: u32 = 5;

pub const MAX_APP_ID: u8 = (1 << APP_ID_BITS) - 1;

pub const MAX_APP_INSTANCE_ID: u8 = (1 << APP_INSTANCE_ID_BITS) - 1;

/// A 64-bit identifier that records when and where it was issued.
///
/// ```text
///  Bit Index:  63       63 62             32 31         26 25           21 20             0
///              +----------+-----------------+-------------+---------------+---------------+
///  Field:      | sign (1) | seconds (31)    | app id (6)  | instance (5)  | sequence (21) |
///              +----------+-----------------+-------------+---------------+---------------+
///              |<----------------------- MSB ---------- 64 bits --------- LSB ------------>|
/// ```
///
/// - the sign bit is always set, so every issued ID is negative
/// - seconds are counted from a caller-chosen epoch (see [`DEFAULT_EPOCH`])
///
/// Because the timestamp sits right below the constant sign bit, IDs from a
/// later second compare greater whatever their other fields. Within a second
/// and a single source, a later sequence compares greater.
///
/// Equality, ordering and hashing use the raw value only.
///
/// [`DEFAULT_EPOCH`]: crate::DEFAULT_EPOCH
#[derive(Clone, Copy)]
pub struct SourceKnownId {
    id: i64,
    app_id: u8,
    app_instance_id: u8,
    sequence: u32,
    residue: u32,
    created_at: Duration,
}

impl SourceKnownId {
    /// Packs the components of an ID.
    ///
    /// `residue` is the number of whole seconds between `epoch` and the
    /// creation time.
    ///
    /// # Errors
    ///
    /// Fails when a component does not fit its field, or with
    /// [`Error::TimestampOutOfRange`] when `epoch + residue` overflows.
    pub fn from_components(
        residue: u32,
        app_id: u8,
        app_instance_id: u8,
        sequence: u32,
        epoch: Duration,
    ) -> Result<Self> {
        if app_id > MAX_APP_ID {
            return Err(Error::InvalidApplicationId(app_id));
        }
        if app_instance_id > MAX_APP_INSTANCE_ID {
            return Err(Error::InvalidApplicationInstanceId(app_instance_id));
        }
        debug_assert!(sequence <= MAX_SEQUENCE, "sequence overflow");

        let mut builder = BitFieldBuilder::new(RESIDUE_WIDTH, Sign::Negative);
        builder
            .set_residue(residue)?
            .add_field(u64::from(app_id), APP_ID_BITS)?
            .add_field(u64::from(app_instance_id), APP_INSTANCE_ID_BITS)?
            .add_field(u64::from(sequence), SEQUENCE_BITS)?;

        Ok(Self {
            id: builder.value(),
            app_id,
            app_instance_id,
            sequence,
            residue,
            created_at: created_at(epoch, residue)?,
        })
    }

    /// Decodes a raw ID issued against `epoch`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidId`] when the sign bit is clear. Positive
    /// values are reserved for a future epoch extension and never issued.
    /// Returns [`Error::TimestampOutOfRange`] when `epoch + residue`
    /// overflows.
    pub fn parse(id: i64, epoch: Duration) -> Result<Self> {
        let mut parser = BitFieldParser::new(id, RESIDUE_WIDTH);
        if parser.sign() != Sign::Negative {
            return Err(Error::InvalidId(id));
        }
        let residue = parser.residue();
        let app_id = parser.read_field(APP_ID_BITS)? as u8;
        let app_instance_id = parser.read_field(APP_INSTANCE_ID_BITS)? as u8;
        let sequence = parser.read_field(SEQUENCE_BITS)? as u32;

        Ok(Self {
            id,
            app_id,
            app_instance_id,
            sequence,
            residue,
            created_at: created_at(epoch, residue)?,
        })
    }

    /// The raw 64-bit value.
    pub const fn id(&self) -> i64 {
        self.id
    }

    pub const fn app_id(&self) -> u8 {
        self.app_id
    }

    pub const fn app_instance_id(&self) -> u8 {
        self.app_instance_id
    }

    /// Position within the second it was issued in.
    pub const fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Whole seconds between the epoch and the creation time.
    pub const fn residue_seconds(&self) -> u32 {
        self.residue
    }

    /// Creation time as a [`Duration`] since the Unix epoch, truncated to the
    /// second.
    pub const fn created_at(&self) -> Duration {
        self.created_at
    }

    /// Returns the ID as a zero-padded, sign-prefixed 20-digit string.
    pub fn to_padded_string(&self) -> String {
        format!("{:+020}", self.id)
    }
}

impl PartialEq for SourceKnownId {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for SourceKnownId {}

impl PartialOrd for SourceKnownId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SourceKnownId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl Hash for SourceKnownId {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl From<SourceKnownId> for i64 {
    fn from(id: SourceKnownId) -> Self {
        id.id
    }
}

impl fmt::Display for SourceKnownId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl fmt::Debug for SourceKnownId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceKnownId")
            .field("id", &self.id)
            .field("app_id", &self.app_id)
            .field("app_instance_id", &self.app_instance_id)
            .field("sequence", &self.sequence)
            .field("created_at", &self.created_at.as_secs())
            .finish()
    }
}

fn created_at(epoch: Duration, residue: u32) -> Result<Duration> {
    epoch
        .checked_add(Duration::from_secs(u64::from(residue)))
        .ok_or(Error::TimestampOutOfRange {
            seconds: i64::from(residue),
        })
}
