use crate::bits::{BitFieldError, ResidueWidth, Sign, field_mask};

/// Reads back the fields written by a [`BitFieldBuilder`].
///
/// Fields must be read in the order they were appended, with the same widths.
///
/// [`BitFieldBuilder`]: crate::BitFieldBuilder
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BitFieldParser {
    raw: u64,
    residue_width: ResidueWidth,
    remaining: u32,
}

impl BitFieldParser {
    pub const fn new(value: i64, residue_width: ResidueWidth) -> Self {
        Self {
            raw: value as u64,
            residue_width,
            remaining: residue_width.field_bits(),
        }
    }

    pub const fn sign(&self) -> Sign {
        Sign::from_raw(self.raw)
    }

    pub const fn residue(&self) -> u32 {
        let width = self.residue_width;
        ((self.raw & width.residue_mask()) >> width.residue_shift()) as u32
    }

    /// Reads the next `width`-bit field.
    ///
    /// # Errors
    ///
    /// Fails on a zero width or when fewer than `width` unread bits remain.
    pub fn read_field(&mut self, width: u32) -> Result<u64, BitFieldError> {
        if width == 0 {
            return Err(BitFieldError::ZeroWidth);
        }
        if width > self.remaining {
            return Err(BitFieldError::Capacity {
                requested: width,
                remaining: self.remaining,
            });
        }
        self.remaining -= width;
        Ok((self.raw >> self.remaining) & field_mask(width))
    }

    /// Reads the next 4-bit field.
    ///
    /// # Errors
    ///
    /// Fails when fewer than 4 unread bits remain.
    pub fn read_nibble(&mut self) -> Result<u8, BitFieldError> {
        self.read_field(4).map(|v| v as u8)
    }

    /// Reads the next 8-bit field.
    ///
    /// # Errors
    ///
    /// Fails when fewer than 8 unread bits remain.
    pub fn read_byte(&mut self) -> Result<u8, BitFieldError> {
        self.read_field(8).map(|v| v as u8)
    }

    /// Reads the next 16-bit field.
    ///
    /// # Errors
    ///
    /// Fails when fewer than 16 unread bits remain.
    pub fn read_u16(&mut self) -> Result<u16, BitFieldError> {
        self.read_field(16).map(|v| v as u16)
    }

    pub const fn remaining(&self) -> u32 {
        self.remaining
    }
}
