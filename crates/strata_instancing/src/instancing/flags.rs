//! Entity state flags.

use std::ops::{BitOr, BitOrAssign};

/// Boolean state of an entity, packed into one word.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct EntityFlags(pub u32);

impl EntityFlags {
    /// No flags set.
    pub const EMPTY: Self = Self(0);
    /// Drawn at all.
    pub const VISIBLE: Self = Self(1 << 0);
    /// Removed by view culling.
    pub const CULLED: Self = Self(1 << 1);
    /// Takes part in picking.
    pub const PICKABLE: Self = Self(1 << 2);
    /// Affected by section planes.
    pub const CLIPPABLE: Self = Self(1 << 3);
    /// Takes part in collision queries. Not tracked by any render pass.
    pub const COLLIDABLE: Self = Self(1 << 4);
    /// Drawn with the x-ray material instead of its own.
    pub const XRAYED: Self = Self(1 << 5);
    /// Drawn with the highlight material.
    pub const HIGHLIGHTED: Self = Self(1 << 6);
    /// Drawn with the selection material.
    pub const SELECTED: Self = Self(1 << 7);
    /// Feature edges are drawn.
    pub const EDGES: Self = Self(1 << 8);

    /// Returns true if every bit of `other` is set.
    #[inline]
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns a copy with `flag` switched on or off.
    #[inline]
    #[must_use]
    pub const fn with(self, flag: Self, on: bool) -> Self {
        if on {
            Self(self.0 | flag.0)
        } else {
            Self(self.0 & !flag.0)
        }
    }

    /// Switches `flag` on or off in place.
    #[inline]
    pub fn set(&mut self, flag: Self, on: bool) {
        *self = self.with(flag, on);
    }
}

impl BitOr for EntityFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for EntityFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Everything the layer remembers about one portion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PortionState {
    /// Entity flags.
    pub flags: EntityFlags,
    /// The owning mesh is drawn in the transparent pass.
    pub transparent: bool,
}

impl PortionState {
    /// Creates a state.
    #[must_use]
    pub const fn new(flags: EntityFlags, transparent: bool) -> Self {
        Self { flags, transparent }
    }
}
