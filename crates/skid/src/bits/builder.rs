use crate::bits::{BitFieldError, ResidueWidth, Sign, field_mask};

/// Packs fixed-width unsigned fields into a single `i64`.
///
/// The top bit is the reserved sign bit, followed by the residue field (see
/// [`ResidueWidth`]); every other field is appended from the most significant
/// free bit downwards in the order [`add_field`] is called. The first appended
/// field therefore dominates ordering among values sharing a residue, and the
/// residue dominates everything below it.
///
/// A field that does not fit, either because too few bits remain or because
/// the value is wider than declared, is rejected and the builder is left
/// untouched. Use [`add_field_masked`] to truncate on purpose.
///
/// # Example
///
/// ```
/// use skid::{BitFieldBuilder, BitFieldParser, ResidueWidth, Sign};
///
/// let mut builder = BitFieldBuilder::new(ResidueWidth::UInt, Sign::Negative);
/// builder.set_residue(42).unwrap();
/// builder.add_field(5, 6).unwrap();
/// builder.add_field(12, 5).unwrap();
///
/// let mut parser = BitFieldParser::new(builder.value(), ResidueWidth::UInt);
/// assert_eq!(parser.residue(), 42);
/// assert_eq!(parser.read_field(6).unwrap(), 5);
/// assert_eq!(parser.read_field(5).unwrap(), 12);
/// ```
///
/// [`add_field`]: BitFieldBuilder::add_field
/// [`add_field_masked`]: BitFieldBuilder::add_field_masked
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BitFieldBuilder {
    raw: u64,
    residue_width: ResidueWidth,
    remaining: u32,
    sign: Sign,
}

impl BitFieldBuilder {
    /// Creates an empty builder. The sign is explicit so that flipping it is
    /// never an accident of default state.
    pub const fn new(residue_width: ResidueWidth, sign: Sign) -> Self {
        Self {
            raw: 0,
            residue_width,
            remaining: residue_width.field_bits(),
            sign,
        }
    }

    /// Writes the residue field, replacing any earlier residue.
    ///
    /// # Errors
    ///
    /// Returns [`BitFieldError::ResidueOverflow`] when `residue` is wider than
    /// the residue field.
    pub fn set_residue(&mut self, residue: u32) -> Result<&mut Self, BitFieldError> {
        let width = self.residue_width;
        if residue > width.max_residue() {
            return Err(BitFieldError::ResidueOverflow {
                value: residue,
                width: width.bits(),
            });
        }
        let shifted = u64::from(residue) << width.residue_shift();
        self.raw = (self.raw & !width.residue_mask()) | shifted;
        Ok(self)
    }

    /// Appends a `width`-bit field right after the previously appended ones.
    ///
    /// # Errors
    ///
    /// - [`BitFieldError::ZeroWidth`] for a zero width
    /// - [`BitFieldError::Capacity`] when fewer than `width` bits remain
    /// - [`BitFieldError::ValueOverflow`] when `value` needs more than `width`
    ///   bits
    pub fn add_field(&mut self, value: u64, width: u32) -> Result<&mut Self, BitFieldError> {
        self.check_width(width)?;
        if value & !field_mask(width) != 0 {
            return Err(BitFieldError::ValueOverflow { value, width });
        }
        Ok(self.push(value, width))
    }

    /// Appends a field, keeping only the low `width` bits of `value`.
    ///
    /// # Errors
    ///
    /// Fails on a zero width or when fewer than `width` bits remain.
    pub fn add_field_masked(&mut self, value: u64, width: u32) -> Result<&mut Self, BitFieldError> {
        self.check_width(width)?;
        Ok(self.push(value & field_mask(width), width))
    }

    /// Appends a 4-bit field.
    ///
    /// # Errors
    ///
    /// See [`Self::add_field`].
    pub fn add_nibble(&mut self, value: u8) -> Result<&mut Self, BitFieldError> {
        self.add_field(u64::from(value), 4)
    }

    /// Appends an 8-bit field.
    ///
    /// # Errors
    ///
    /// Fails when fewer than 8 bits remain.
    pub fn add_byte(&mut self, value: u8) -> Result<&mut Self, BitFieldError> {
        self.add_field(u64::from(value), 8)
    }

    /// Appends a 16-bit field.
    ///
    /// # Errors
    ///
    /// Fails when fewer than 16 bits remain.
    pub fn add_u16(&mut self, value: u16) -> Result<&mut Self, BitFieldError> {
        self.add_field(u64::from(value), 16)
    }

    /// Sets the reserved sign bit (the default for issued IDs).
    pub fn make_negative(&mut self) -> &mut Self {
        self.sign = Sign::Negative;
        self
    }

    /// Clears the reserved sign bit.
    pub fn make_positive(&mut self) -> &mut Self {
        self.sign = Sign::Positive;
        self
    }

    /// Bits still available for fields.
    pub const fn remaining(&self) -> u32 {
        self.remaining
    }

    pub const fn residue_width(&self) -> ResidueWidth {
        self.residue_width
    }

    pub const fn sign(&self) -> Sign {
        self.sign
    }

    /// The packed value built so far.
    pub const fn value(&self) -> i64 {
        (self.raw | self.sign.mask()) as i64
    }

    fn check_width(&self, width: u32) -> Result<(), BitFieldError> {
        if width == 0 {
            return Err(BitFieldError::ZeroWidth);
        }
        if width > self.remaining {
            return Err(BitFieldError::Capacity {
                requested: width,
                remaining: self.remaining,
            });
        }
        Ok(())
    }

    fn push(&mut self, value: u64, width: u32) -> &mut Self {
        self.remaining -= width;
        self.raw |= value << self.remaining;
        self
    }
}
