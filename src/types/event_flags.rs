//! EventFlags type for the shared event-flag word

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign, Not};

use serde::{Deserialize, Serialize};

/// A 32-bit event-flag word.
///
/// Bits are partitioned into per-task groups (see [`super::flag_groups`]).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct EventFlags(pub u32);

impl EventFlags {
    /// No bits set.
    pub const EMPTY: EventFlags = EventFlags(0);

    /// Create a new EventFlags from a u32 value.
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Get the raw u32 value.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// True if no bit is set.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True if every bit of `other` is set in `self`.
    pub const fn contains(self, other: EventFlags) -> bool {
        other.0 != 0 && (self.0 & other.0) == other.0
    }

    /// True if any bit of `other` is set in `self`.
    pub const fn intersects(self, other: EventFlags) -> bool {
        (self.0 & other.0) != 0
    }

    /// Bits of `self` restricted to `mask`.
    pub const fn masked(self, mask: EventFlags) -> EventFlags {
        EventFlags(self.0 & mask.0)
    }

    /// `self` with the bits of `other` cleared.
    pub const fn without(self, other: EventFlags) -> EventFlags {
        EventFlags(self.0 & !other.0)
    }
}

impl BitOr for EventFlags {
    type Output = EventFlags;

    fn bitor(self, rhs: EventFlags) -> EventFlags {
        EventFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for EventFlags {
    fn bitor_assign(&mut self, rhs: EventFlags) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for EventFlags {
    type Output = EventFlags;

    fn bitand(self, rhs: EventFlags) -> EventFlags {
        EventFlags(self.0 & rhs.0)
    }
}

impl Not for EventFlags {
    type Output = EventFlags;

    fn not(self) -> EventFlags {
        EventFlags(!self.0)
    }
}

impl fmt::Debug for EventFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventFlags({:#06x})", self.0)
    }
}
