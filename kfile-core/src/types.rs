//! Strongly-typed log coordinates.
//!
//! Following `TigerStyle`: explicit types prevent bugs from mixing up a
//! partition number with an offset. Widths match the log protocol: partitions
//! are 32-bit signed, offsets 64-bit signed.

use std::fmt;

/// Macro to generate strongly-typed coordinate wrappers.
///
/// Each wrapper provides:
/// - Type safety (can't mix `Partition` with `Offset`)
/// - Debug/Display formatting
/// - Zero-cost abstraction (same as the raw integer)
macro_rules! define_coordinate {
    ($name:ident, $raw:ty, $prefix:expr, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        #[repr(transparent)]
        pub struct $name($raw);

        impl $name {
            /// Creates a new value from the raw integer.
            #[inline]
            #[must_use]
            pub const fn new(value: $raw) -> Self {
                Self(value)
            }

            /// Returns the raw integer.
            #[inline]
            #[must_use]
            pub const fn get(self) -> $raw {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", $prefix, self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$raw> for $name {
            fn from(value: $raw) -> Self {
                Self::new(value)
            }
        }

        impl From<$name> for $raw {
            fn from(value: $name) -> Self {
                value.get()
            }
        }
    };
}

define_coordinate!(Partition, i32, "partition", "One shard of a topic; the unit of offset addressing.");
define_coordinate!(Offset, i64, "offset", "Partition-local position of a record.");

/// Inclusive range of offsets occupied by a file's records.
///
/// A range is only ever built from at least one acknowledged offset, so there
/// is no "unset" value to confuse with offset zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetRange {
    start: Offset,
    end: Offset,
}

impl OffsetRange {
    /// Creates a range covering exactly one offset.
    #[must_use]
    pub const fn single(offset: Offset) -> Self {
        Self {
            start: offset,
            end: offset,
        }
    }

    /// Widens the range to include `offset`.
    pub fn include(&mut self, offset: Offset) {
        self.start = self.start.min(offset);
        self.end = self.end.max(offset);

        // TigerStyle: Assert postcondition.
        debug_assert!(self.start <= self.end, "range must stay ordered");
    }

    /// First offset of the range.
    #[must_use]
    pub const fn start(self) -> Offset {
        self.start
    }

    /// Last offset of the range (inclusive).
    #[must_use]
    pub const fn end(self) -> Offset {
        self.end
    }
}
