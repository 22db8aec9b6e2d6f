use core::{cmp::Ordering, fmt, time::Duration};

use uuid::Uuid;

use crate::{Blake3KeyedHasher, EntityHasher, IdConfig, Result, SourceKnownId, TAG_LEN};

/// Marker stored at byte 6 of every Entity ID.
pub const ENTITY_MARKER: u8 = 0x5C;

/// Marker stored at byte 7 of every Entity ID. Its high nibble becomes the
/// UUID version, so Entity IDs read as version 4 UUIDs.
///
/// Only the version is fixed. The variant bits come from the low byte of the
/// embedded ID, so Entity IDs are not RFC 4122 UUIDs and
/// [`Uuid::get_variant`] varies from one ID to the next.
pub const ENTITY_VERSION_MARKER: u8 = 0x4B;

const ENTITY_ID_LEN: usize = 16;
const TYPE_OFFSET: usize = TAG_LEN;
const MARKER_OFFSET: usize = TYPE_OFFSET + 2;
const ID_OFFSET: usize = MARKER_OFFSET + 2;

/// A decoded (or rejected) Entity ID.
///
/// An Entity ID that fails validation is still a value: [`valid`] is `false`
/// and the embedded fields are unavailable. Callers should treat it as a
/// foreign or tampered identifier.
///
/// Entity IDs of the same entity type order like their embedded
/// [`SourceKnownId`]s. Entity IDs of different types, or invalid ones, are not
/// comparable and `partial_cmp` returns `None`.
///
/// [`valid`]: Self::valid
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceKnownEntityId {
    entity_id: Uuid,
    decoded: Option<(SourceKnownId, u16)>,
}

impl SourceKnownEntityId {
    const fn invalid(entity_id: Uuid) -> Self {
        Self {
            entity_id,
            decoded: None,
        }
    }

    /// The 128-bit value as a UUID.
    pub const fn entity_id(&self) -> Uuid {
        self.entity_id
    }

    /// Whether the markers and the keyed hash matched.
    pub const fn valid(&self) -> bool {
        self.decoded.is_some()
    }

    pub fn source_id(&self) -> Option<SourceKnownId> {
        self.decoded.map(|(id, _)| id)
    }

    pub fn entity_type_id(&self) -> Option<u16> {
        self.decoded.map(|(_, entity_type_id)| entity_type_id)
    }
}

impl PartialOrd for SourceKnownEntityId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self == other {
            return Some(Ordering::Equal);
        }
        let (a, a_type) = self.decoded?;
        let (b, b_type) = other.decoded?;
        if a_type != b_type {
            return None;
        }
        Some(a.cmp(&b).then_with(|| self.entity_id.cmp(&other.entity_id)))
    }
}

impl From<SourceKnownEntityId> for Uuid {
    fn from(id: SourceKnownEntityId) -> Self {
        id.entity_id
    }
}

impl fmt::Display for SourceKnownEntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.entity_id, f)
    }
}

impl fmt::Debug for SourceKnownEntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("SourceKnownEntityId");
        s.field("entity_id", &self.entity_id);
        match self.decoded {
            Some((source_id, entity_type_id)) => s
                .field("source_id", &source_id)
                .field("entity_type_id", &entity_type_id),
            None => s.field("valid", &false),
        };
        s.finish()
    }
}

/// Wraps [`SourceKnownId`]s and an entity-type tag into tamper-evident
/// 128-bit values.
///
/// ```text
///  Byte:   0        4         6        7         8                       16
///          +--------+---------+--------+---------+------------------------+
///  Field:  | tag    | type    | marker | version | source-known id (i64)  |
///          | (4)    | (u16 LE)| 0x5C   | 0x4B    | (LE)                   |
///          +--------+---------+--------+---------+------------------------+
/// ```
///
/// The tag is the keyed hash of bytes `4..16` truncated to [`TAG_LEN`] bytes.
/// The buffer is turned into a [`Uuid`] with [`Uuid::from_bytes_le`].
///
/// # Example
///
/// ```
/// use skid::{Blake3KeyedHasher, DEFAULT_EPOCH, EntityIdCodec, SourceKnownId};
///
/// let codec = EntityIdCodec::new(Blake3KeyedHasher::new(&[7u8; 32]).unwrap(), DEFAULT_EPOCH);
/// let source = SourceKnownId::from_components(3_600, 5, 12, 0, DEFAULT_EPOCH).unwrap();
///
/// let entity = codec.generate(source, 42);
/// let parsed = codec.parse_str(&entity.to_string()).unwrap();
/// assert!(parsed.valid());
/// assert_eq!(parsed.source_id(), Some(source));
/// assert_eq!(parsed.entity_type_id(), Some(42));
/// ```
#[derive(Clone, Debug)]
pub struct EntityIdCodec<H = Blake3KeyedHasher> {
    hasher: H,
    epoch: Duration,
}

impl EntityIdCodec<Blake3KeyedHasher> {
    /// A BLAKE3 codec keyed with the configuration's default key.
    ///
    /// # Errors
    ///
    /// Fails when no default key is configured or it is too short.
    pub fn from_config(config: &IdConfig) -> Result<Self> {
        let hasher = Blake3KeyedHasher::from_key(config.default_key()?)?;
        Ok(Self::new(hasher, config.epoch))
    }
}

impl<H> EntityIdCodec<H>
where
    H: EntityHasher,
{
    /// `epoch` is used to decode the embedded [`SourceKnownId`].
    pub const fn new(hasher: H, epoch: Duration) -> Self {
        Self { hasher, epoch }
    }

    /// Wraps `source_id`.
    pub fn generate(&self, source_id: SourceKnownId, entity_type_id: u16) -> SourceKnownEntityId {
        SourceKnownEntityId {
            entity_id: self.encode(source_id.id(), entity_type_id),
            decoded: Some((source_id, entity_type_id)),
        }
    }

    /// Builds the 128-bit value for a raw 64-bit ID. Nothing checks that `id`
    /// is a valid [`SourceKnownId`]; if it is not, [`Self::parse`] rejects the
    /// result.
    pub fn encode(&self, id: i64, entity_type_id: u16) -> Uuid {
        let mut bytes = [0u8; ENTITY_ID_LEN];
        bytes[TYPE_OFFSET..MARKER_OFFSET].copy_from_slice(&entity_type_id.to_le_bytes());
        bytes[MARKER_OFFSET] = ENTITY_MARKER;
        bytes[MARKER_OFFSET + 1] = ENTITY_VERSION_MARKER;
        bytes[ID_OFFSET..].copy_from_slice(&id.to_le_bytes());
        let tag = self.hasher.tag(&bytes[TAG_LEN..]);
        bytes[..TAG_LEN].copy_from_slice(&tag);
        Uuid::from_bytes_le(bytes)
    }

    /// Validates and decodes an Entity ID.
    ///
    /// The markers are checked before the hash is computed. Any mismatch, or
    /// an embedded value that is not a [`SourceKnownId`], yields an invalid
    /// result.
    pub fn parse(&self, entity_id: Uuid) -> SourceKnownEntityId {
        let bytes = entity_id.to_bytes_le();
        if bytes[MARKER_OFFSET] != ENTITY_MARKER
            || bytes[MARKER_OFFSET + 1] != ENTITY_VERSION_MARKER
        {
            tracing::trace!(%entity_id, "entity id markers do not match");
            return SourceKnownEntityId::invalid(entity_id);
        }
        if self.hasher.tag(&bytes[TAG_LEN..]) != bytes[..TAG_LEN] {
            tracing::debug!(%entity_id, "entity id tag does not match");
            return SourceKnownEntityId::invalid(entity_id);
        }

        let entity_type_id = u16::from_le_bytes([bytes[TYPE_OFFSET], bytes[TYPE_OFFSET + 1]]);
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&bytes[ID_OFFSET..]);
        match SourceKnownId::parse(i64::from_le_bytes(raw), self.epoch) {
            Ok(source_id) => SourceKnownEntityId {
                entity_id,
                decoded: Some((source_id, entity_type_id)),
            },
            Err(_) => SourceKnownEntityId::invalid(entity_id),
        }
    }

    /// Parses the textual UUID forms accepted by [`Uuid::parse_str`]. Text
    /// that is not a UUID yields `None`.
    pub fn parse_str(&self, text: &str) -> Option<SourceKnownEntityId> {
        Uuid::parse_str(text).ok().map(|entity_id| self.parse(entity_id))
    }

    pub const fn epoch(&self) -> Duration {
        self.epoch
    }

    pub const fn hasher(&self) -> &H {
        &self.hasher
    }
}
