/// Errors raised by [`BitFieldBuilder`] and [`BitFieldParser`].
///
/// None of these leave the builder or parser modified: a rejected call can be
/// retried with a smaller width or a masked value.
///
/// [`BitFieldBuilder`]: crate::BitFieldBuilder
/// [`BitFieldParser`]: crate::BitFieldParser
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum BitFieldError {
    /// The requested width does not fit in the bits that remain.
    #[error("field of {requested} bits does not fit, {remaining} bits remain")]
    Capacity {
        /// Width of the rejected field.
        requested: u32,
        /// Bits still available after the previously appended fields.
        remaining: u32,
    },

    /// The value needs more bits than the declared width.
    #[error("value {value} does not fit in {width} bits")]
    ValueOverflow {
        /// The rejected value.
        value: u64,
        /// The declared width.
        width: u32,
    },

    /// The residue value needs more bits than the residue field has.
    #[error("residue {value} does not fit in the {width}-bit residue field")]
    ResidueOverflow {
        /// The rejected residue.
        value: u32,
        /// Width of the residue field.
        width: u32,
    },

    /// Fields must be at least one bit wide.
    #[error("field width must be non-zero")]
    ZeroWidth,
}
