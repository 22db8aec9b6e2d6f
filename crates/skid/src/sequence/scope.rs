/// Width of the per-second sequence field.
pub const SEQUENCE_BITS: u32 = 21;

/// Largest sequence handed out within one second: 2,097,151.
pub const MAX_SEQUENCE: u32 = (1 << SEQUENCE_BITS) - 1;

/// A second and the position within it, as handed out by a
/// [`SequenceManager`].
///
/// [`SequenceManager`]: crate::SequenceManager
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeScopedId {
    /// Whole seconds since the Unix epoch.
    pub timestamp: i64,
    /// Position within that second, `0..=MAX_SEQUENCE`.
    pub sequence: u32,
}

/// Snapshot of one second's sequence window.
///
/// The live scope of a [`SequenceManager`] is stored packed in a single
/// `u64` so that claiming a sequence is one `fetch_add` and rolling to a new
/// second is one compare-and-swap. A scope is never rewound: rolling over
/// replaces it with a fresh scope for a later second.
///
/// ```text
///  Bit Index:  63                   32 31                    0
///              +-----------------------+-----------------------+
///  Field:      | second (32)           | issued (32)           |
///              +-----------------------+-----------------------+
/// ```
///
/// `issued` counts sequences claimed so far, so the next claim receives
/// `issued` as its sequence. Claims past [`MAX_SEQUENCE`] keep counting but
/// are refused. The counter cannot reach the second field: that would take
/// four billion refused claims within one second, and callers back off after
/// each refusal.
///
/// [`SequenceManager`]: crate::SequenceManager
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeScope {
    timestamp: u32,
    issued: u32,
}

impl TimeScope {
    const TIMESTAMP_SHIFT: u64 = 32;
    const ISSUED_MASK: u64 = (1 << 32) - 1;

    /// Placeholder scope every manager starts from. Any real second replaces
    /// it.
    pub const EMPTY: Self = Self {
        timestamp: 0,
        issued: 0,
    };

    /// A fresh scope for `timestamp` with sequence 0 already claimed by the
    /// caller that installs it.
    pub const fn claimed(timestamp: u32) -> Self {
        Self {
            timestamp,
            issued: 1,
        }
    }

    pub const fn from_raw(raw: u64) -> Self {
        Self {
            timestamp: (raw >> Self::TIMESTAMP_SHIFT) as u32,
            issued: (raw & Self::ISSUED_MASK) as u32,
        }
    }

    pub const fn to_raw(self) -> u64 {
        ((self.timestamp as u64) << Self::TIMESTAMP_SHIFT) | self.issued as u64
    }

    /// Whole seconds since the Unix epoch.
    pub const fn timestamp(self) -> u32 {
        self.timestamp
    }

    /// Number of claims made against this scope, refused ones included.
    pub const fn issued(self) -> u32 {
        self.issued
    }

    /// The sequence this snapshot hands to whoever claimed it, if the window
    /// still had room.
    pub const fn sequence(self) -> Option<u32> {
        if self.issued <= MAX_SEQUENCE {
            Some(self.issued)
        } else {
            None
        }
    }

    /// `true` once every sequence of this second is taken.
    pub const fn is_exhausted(self) -> bool {
        self.issued > MAX_SEQUENCE
    }
}
