//! Aggregate portion counters.
//!
//! Counters are kept at two scopes, the layer and the whole model. Both are
//! driven by the same `(before, after)` state transition, so a repeated
//! setter never moves a count.

use super::flags::{EntityFlags, PortionState};

/// A per-portion predicate that is counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Predicate {
    /// [`EntityFlags::VISIBLE`]
    Visible,
    /// Transparent mesh.
    Transparent,
    /// [`EntityFlags::XRAYED`]
    XRayed,
    /// [`EntityFlags::HIGHLIGHTED`]
    Highlighted,
    /// [`EntityFlags::SELECTED`]
    Selected,
    /// [`EntityFlags::CLIPPABLE`]
    Clippable,
    /// [`EntityFlags::EDGES`]
    Edges,
    /// [`EntityFlags::PICKABLE`]
    Pickable,
    /// [`EntityFlags::CULLED`]
    Culled,
}

impl Predicate {
    /// All counted predicates.
    pub const ALL: [Self; 9] = [
        Self::Visible,
        Self::Transparent,
        Self::XRayed,
        Self::Highlighted,
        Self::Selected,
        Self::Clippable,
        Self::Edges,
        Self::Pickable,
        Self::Culled,
    ];

    /// Evaluates the predicate on a portion.
    #[must_use]
    pub const fn holds(self, state: PortionState) -> bool {
        let flag = match self {
            Self::Transparent => return state.transparent,
            Self::Visible => EntityFlags::VISIBLE,
            Self::XRayed => EntityFlags::XRAYED,
            Self::Highlighted => EntityFlags::HIGHLIGHTED,
            Self::Selected => EntityFlags::SELECTED,
            Self::Clippable => EntityFlags::CLIPPABLE,
            Self::Edges => EntityFlags::EDGES,
            Self::Pickable => EntityFlags::PICKABLE,
            Self::Culled => EntityFlags::CULLED,
        };
        state.flags.contains(flag)
    }
}

/// Number of portions for which each predicate holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PortionCounters {
    /// Portions created.
    pub portions: u32,
    /// Visible portions.
    pub visible: u32,
    /// Transparent portions.
    pub transparent: u32,
    /// X-rayed portions.
    pub xrayed: u32,
    /// Highlighted portions.
    pub highlighted: u32,
    /// Selected portions.
    pub selected: u32,
    /// Clippable portions.
    pub clippable: u32,
    /// Portions with edges on.
    pub edges: u32,
    /// Pickable portions.
    pub pickable: u32,
    /// Culled portions.
    pub culled: u32,
}

impl PortionCounters {
    /// Creates zeroed counters.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            portions: 0,
            visible: 0,
            transparent: 0,
            xrayed: 0,
            highlighted: 0,
            selected: 0,
            clippable: 0,
            edges: 0,
            pickable: 0,
            culled: 0,
        }
    }

    /// Count for one predicate.
    #[must_use]
    pub const fn count(&self, predicate: Predicate) -> u32 {
        match predicate {
            Predicate::Visible => self.visible,
            Predicate::Transparent => self.transparent,
            Predicate::XRayed => self.xrayed,
            Predicate::Highlighted => self.highlighted,
            Predicate::Selected => self.selected,
            Predicate::Clippable => self.clippable,
            Predicate::Edges => self.edges,
            Predicate::Pickable => self.pickable,
            Predicate::Culled => self.culled,
        }
    }

    fn count_mut(&mut self, predicate: Predicate) -> &mut u32 {
        match predicate {
            Predicate::Visible => &mut self.visible,
            Predicate::Transparent => &mut self.transparent,
            Predicate::XRayed => &mut self.xrayed,
            Predicate::Highlighted => &mut self.highlighted,
            Predicate::Selected => &mut self.selected,
            Predicate::Clippable => &mut self.clippable,
            Predicate::Edges => &mut self.edges,
            Predicate::Pickable => &mut self.pickable,
            Predicate::Culled => &mut self.culled,
        }
    }

    /// Records a new portion. New portions start with no flags set.
    pub fn add_portion(&mut self) {
        self.portions += 1;
    }

    /// Applies the transition of one portion from `before` to `after`.
    pub fn apply(&mut self, before: PortionState, after: PortionState) {
        for predicate in Predicate::ALL {
            let count = self.count_mut(predicate);
            match (predicate.holds(before), predicate.holds(after)) {
                (false, true) => *count += 1,
                (true, false) => *count -= 1,
                _ => {}
            }
        }
    }

    /// Removes everything `other` contributed, e.g. a destroyed layer.
    pub fn subtract(&mut self, other: &Self) {
        self.portions -= other.portions;
        for predicate in Predicate::ALL {
            *self.count_mut(predicate) -= other.count(predicate);
        }
    }

    /// Every portion is culled. True for an empty layer.
    #[inline]
    #[must_use]
    pub const fn all_culled(&self) -> bool {
        self.culled == self.portions
    }

    /// Nothing is visible.
    #[inline]
    #[must_use]
    pub const fn none_visible(&self) -> bool {
        self.visible == 0
    }

    /// Every portion is transparent.
    #[inline]
    #[must_use]
    pub const fn all_transparent(&self) -> bool {
        self.transparent == self.portions
    }

    /// Every portion is x-rayed.
    #[inline]
    #[must_use]
    pub const fn all_xrayed(&self) -> bool {
        self.xrayed == self.portions
    }
}
