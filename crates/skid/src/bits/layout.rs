/// Total width of a packed value.
pub const TOTAL_BITS: u32 = 64;

/// Bit index of the reserved sign bit.
pub const SIGN_BIT: u32 = TOTAL_BITS - 1;

/// Width of the residue field that sits directly below the sign bit.
///
/// Each choice is named after the unsigned type whose top bit became the sign
/// bit: a `Nibble` residue spans the 3 bits left in the top nibble, a `UInt`
/// residue the 31 bits left in the top 32-bit word.
///
/// ```text
///  Bit Index:  63        63 62                  63-R 62-R                 0
///              +-----------+-----------------------+-----------------------+
///  Field:      | sign (1)  | residue (R)           | fields (63 - R)       |
///              +-----------+-----------------------+-----------------------+
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResidueWidth {
    /// 3-bit residue, 60 bits of fields.
    Nibble,
    /// 7-bit residue, 56 bits of fields.
    Byte,
    /// 15-bit residue, 48 bits of fields.
    UShort,
    /// 31-bit residue, 32 bits of fields.
    UInt,
}

impl ResidueWidth {
    /// Number of bits in the residue field.
    pub const fn bits(self) -> u32 {
        match self {
            Self::Nibble => 3,
            Self::Byte => 7,
            Self::UShort => 15,
            Self::UInt => 31,
        }
    }

    /// Largest residue the field can hold.
    pub const fn max_residue(self) -> u32 {
        (1 << self.bits()) - 1
    }

    /// Number of bits left for appended fields.
    pub const fn field_bits(self) -> u32 {
        SIGN_BIT - self.bits()
    }

    pub(crate) const fn residue_shift(self) -> u32 {
        self.field_bits()
    }

    pub(crate) const fn residue_mask(self) -> u64 {
        (self.max_residue() as u64) << self.residue_shift()
    }
}

/// State of the reserved sign bit.
///
/// Every ID issued today is [`Sign::Negative`]. [`Sign::Positive`] is kept as
/// a switch for a second epoch range once the residue runs out, and has no
/// other meaning yet.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Sign {
    /// Sign bit set.
    #[default]
    Negative,
    /// Sign bit clear.
    Positive,
}

impl Sign {
    pub(crate) const fn mask(self) -> u64 {
        match self {
            Self::Negative => 1 << SIGN_BIT,
            Self::Positive => 0,
        }
    }

    pub(crate) const fn from_raw(raw: u64) -> Self {
        if raw >> SIGN_BIT == 1 {
            Self::Negative
        } else {
            Self::Positive
        }
    }
}

pub(crate) const fn field_mask(width: u32) -> u64 {
    if width >= TOTAL_BITS {
        u64::MAX
    } else {
        (1 << width) - 1
    }
}
