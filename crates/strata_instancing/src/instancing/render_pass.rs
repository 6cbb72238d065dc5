//! Render-pass selectors.
//!
//! Each portion carries four selector bytes. The vertex stage of every pass
//! compares its own pass code against the relevant byte and discards the
//! portion on mismatch, so no CPU iteration over portions is ever needed.
//!
//! | Byte | Concern        | Priority (first match wins)                                 |
//! |------|----------------|-------------------------------------------------------------|
//! | x    | fill           | hidden/culled/x-rayed → none, transparent, opaque            |
//! | y    | emphasis fill  | hidden/culled → none, selected, highlighted, x-rayed, none   |
//! | z    | edges          | hidden/culled → none, selected, highlighted, x-rayed, edges  |
//! | w    | pick           | visible, not culled and pickable → pick                      |

use super::flags::EntityFlags;

/// Code of a render pass, as written into selector bytes.
#[repr(u8)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RenderPass {
    /// Not drawn by any pass for this concern.
    #[default]
    NotRendered = 0,
    /// Opaque color fill.
    OpaqueFill = 1,
    /// Transparent color fill.
    TransparentFill = 2,
    /// X-ray material fill.
    XRayedFill = 3,
    /// Highlight material fill.
    HighlightedFill = 4,
    /// Selection material fill.
    SelectedFill = 5,
    /// Edges of opaque portions.
    OpaqueEdges = 6,
    /// Edges of transparent portions.
    TransparentEdges = 7,
    /// X-ray edges.
    XRayedEdges = 8,
    /// Highlight edges.
    HighlightedEdges = 9,
    /// Selection edges.
    SelectedEdges = 10,
    /// Picking.
    Pick = 11,
}

impl RenderPass {
    /// Byte value written into selector buffers.
    #[inline]
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }
}

/// The four per-portion selectors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSelectors {
    /// Normal fill.
    pub fill: RenderPass,
    /// Emphasis fill.
    pub emphasis_fill: RenderPass,
    /// Edges.
    pub edges: RenderPass,
    /// Picking.
    pub pick: RenderPass,
}

impl PassSelectors {
    /// Packs the selectors as `[fill, emphasis, edges, pick]`.
    #[must_use]
    pub const fn to_bytes(self) -> [u8; 4] {
        [
            self.fill.code(),
            self.emphasis_fill.code(),
            self.edges.code(),
            self.pick.code(),
        ]
    }
}

/// Derives the pass selectors of a portion from its flags.
#[must_use]
pub fn encode_pass_selectors(flags: EntityFlags, transparent: bool) -> PassSelectors {
    let visible = flags.contains(EntityFlags::VISIBLE);
    let culled = flags.contains(EntityFlags::CULLED);
    let xrayed = flags.contains(EntityFlags::XRAYED);
    let highlighted = flags.contains(EntityFlags::HIGHLIGHTED);
    let selected = flags.contains(EntityFlags::SELECTED);
    let edges = flags.contains(EntityFlags::EDGES);
    let pickable = flags.contains(EntityFlags::PICKABLE);

    let shown = visible && !culled;

    let fill = if !shown || xrayed {
        RenderPass::NotRendered
    } else if transparent {
        RenderPass::TransparentFill
    } else {
        RenderPass::OpaqueFill
    };

    let emphasis_fill = if !shown {
        RenderPass::NotRendered
    } else if selected {
        RenderPass::SelectedFill
    } else if highlighted {
        RenderPass::HighlightedFill
    } else if xrayed {
        RenderPass::XRayedFill
    } else {
        RenderPass::NotRendered
    };

    let edges = if !shown {
        RenderPass::NotRendered
    } else if selected {
        RenderPass::SelectedEdges
    } else if highlighted {
        RenderPass::HighlightedEdges
    } else if xrayed {
        RenderPass::XRayedEdges
    } else if edges {
        if transparent {
            RenderPass::TransparentEdges
        } else {
            RenderPass::OpaqueEdges
        }
    } else {
        RenderPass::NotRendered
    };

    let pick = if shown && pickable {
        RenderPass::Pick
    } else {
        RenderPass::NotRendered
    };

    PassSelectors {
        fill,
        emphasis_fill,
        edges,
        pick,
    }
}

/// Clippable selector, padded to four bytes: `[255, 0, 0, 0]` or zeros.
#[must_use]
pub const fn encode_clippable(flags: EntityFlags) -> [u8; 4] {
    if flags.contains(EntityFlags::CLIPPABLE) {
        [255, 0, 0, 0]
    } else {
        [0; 4]
    }
}
