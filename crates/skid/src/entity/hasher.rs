use crate::{Error, MacKey, Result};

/// Shortest accepted key material, in bytes.
pub const MIN_KEY_LEN: usize = 32;

/// Bytes of keyed hash stored in an Entity ID.
pub const TAG_LEN: usize = 4;

const KEY_CONTEXT: &str = "skid 2025-01-01 source-known entity id tag";

/// Keyed hash guarding the payload of a [`SourceKnownEntityId`].
///
/// Any keyed MAC whose output can be truncated to [`TAG_LEN`] bytes fits here.
/// The choice changes how hard forging a tag is, not the Entity ID layout.
///
/// [`SourceKnownEntityId`]: crate::SourceKnownEntityId
pub trait EntityHasher {
    /// Computes the truncated tag over `payload`.
    fn tag(&self, payload: &[u8]) -> [u8; TAG_LEN];
}

/// BLAKE3 in keyed mode.
///
/// The key material is first reduced to a 32-byte key with
/// [`blake3::derive_key`], so material longer than 32 bytes contributes in
/// full.
#[derive(Clone)]
pub struct Blake3KeyedHasher {
    key: [u8; blake3::KEY_LEN],
}

impl Blake3KeyedHasher {
    /// # Errors
    ///
    /// Returns [`Error::KeyTooShort`] for material shorter than
    /// [`MIN_KEY_LEN`].
    pub fn new(material: &[u8]) -> Result<Self> {
        if material.len() < MIN_KEY_LEN {
            return Err(Error::KeyTooShort {
                len: material.len(),
            });
        }
        Ok(Self {
            key: blake3::derive_key(KEY_CONTEXT, material),
        })
    }

    /// # Errors
    ///
    /// See [`Self::new`].
    pub fn from_key(key: &MacKey) -> Result<Self> {
        Self::new(&key.material)
    }
}

impl EntityHasher for Blake3KeyedHasher {
    fn tag(&self, payload: &[u8]) -> [u8; TAG_LEN] {
        let hash = blake3::keyed_hash(&self.key, payload);
        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&hash.as_bytes()[..TAG_LEN]);
        tag
    }
}

impl core::fmt::Debug for Blake3KeyedHasher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Blake3KeyedHasher").finish_non_exhaustive()
    }
}
