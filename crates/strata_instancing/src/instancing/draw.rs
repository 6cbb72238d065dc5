//! Layer-level draw gating.
//!
//! Each draw entry point looks only at the layer's counters. If no portion
//! could possibly pass the selector test for that pass, the renderer is not
//! invoked at all. Otherwise one instanced draw covers every portion and the
//! vertex stage discards the ones whose selector does not match.

use std::collections::HashMap;

use super::counters::PortionCounters;
use super::layer::{Finalized, InstancingLayer};
use super::render_pass::RenderPass;

/// Kind of renderer an instancing layer can dispatch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RendererKind {
    /// Color fill.
    Draw,
    /// Color fill with ambient occlusion.
    DrawWithSao,
    /// Depth only.
    Depth,
    /// View-space normals.
    Normals,
    /// Flat emphasis fill.
    Fill,
    /// Edge lines.
    Edges,
    /// Occlusion queries.
    Occlusion,
    /// Shadow maps.
    Shadow,
    /// Pick colors.
    PickMesh,
    /// Pick depth.
    PickDepth,
    /// Pick normals.
    PickNormals,
}

/// Per-frame statistics collected while drawing layers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawStats {
    /// Renderer invocations.
    pub draw_calls: u32,
    /// Instances submitted, summed over invocations. A layer drawn in
    /// several passes contributes its portions once per pass.
    pub instance_draws: u32,
    /// Draw entry points skipped by a counter test.
    pub layers_skipped: u32,
}

/// State shared by every layer drawn in a frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameContext {
    /// Ambient occlusion is enabled for opaque fill.
    pub with_sao: bool,
    /// Statistics for this frame.
    pub stats: DrawStats,
}

impl FrameContext {
    /// Starts a frame.
    #[must_use]
    pub fn new(with_sao: bool) -> Self {
        Self {
            with_sao,
            stats: DrawStats::default(),
        }
    }
}

/// Issues the instanced draw for one layer.
pub trait LayerRenderer {
    /// Draws every portion of `layer` whose selector equals `pass`.
    fn draw_layer(
        &mut self,
        frame: &mut FrameContext,
        layer: &InstancingLayer<Finalized>,
        pass: RenderPass,
    );
}

/// Renderers registered for instancing layers, one per kind.
#[derive(Default)]
pub struct InstancingRenderers {
    renderers: HashMap<RendererKind, Box<dyn LayerRenderer>>,
}

impl InstancingRenderers {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a renderer, returning the one it replaces.
    pub fn register(
        &mut self,
        kind: RendererKind,
        renderer: Box<dyn LayerRenderer>,
    ) -> Option<Box<dyn LayerRenderer>> {
        self.renderers.insert(kind, renderer)
    }

    /// Returns true if a renderer of this kind is registered.
    #[must_use]
    pub fn contains(&self, kind: RendererKind) -> bool {
        self.renderers.contains_key(&kind)
    }

    fn get_mut(&mut self, kind: RendererKind) -> Option<&mut (dyn LayerRenderer + 'static)> {
        self.renderers.get_mut(&kind).map(|r| &mut **r)
    }
}

impl std::fmt::Debug for InstancingRenderers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstancingRenderers")
            .field("kinds", &self.renderers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl PortionCounters {
    fn nothing_shown(&self) -> bool {
        self.all_culled() || self.none_visible()
    }

    fn no_opaque_fill(&self) -> bool {
        self.nothing_shown() || self.all_transparent() || self.all_xrayed()
    }

    fn no_transparent_fill(&self) -> bool {
        self.nothing_shown() || self.transparent == 0 || self.all_xrayed()
    }
}

impl InstancingLayer<Finalized> {
    /// Invokes `kind` for `pass` unless `skip`. Returns true if a renderer ran.
    fn dispatch(
        &self,
        frame: &mut FrameContext,
        renderers: &mut InstancingRenderers,
        skip: bool,
        kind: RendererKind,
        pass: RenderPass,
    ) -> bool {
        if skip {
            frame.stats.layers_skipped += 1;
            return false;
        }
        let Some(renderer) = renderers.get_mut(kind) else {
            return false;
        };
        renderer.draw_layer(frame, self, pass);
        frame.stats.draw_calls += 1;
        frame.stats.instance_draws += self.num_portions();
        true
    }

    /// Opaque fill, with ambient occlusion when the frame asks for it.
    pub fn draw_opaque_fill(
        &self,
        frame: &mut FrameContext,
        renderers: &mut InstancingRenderers,
    ) -> bool {
        let kind = if frame.with_sao {
            RendererKind::DrawWithSao
        } else {
            RendererKind::Draw
        };
        let skip = self.counters.no_opaque_fill();
        self.dispatch(frame, renderers, skip, kind, RenderPass::OpaqueFill)
    }

    /// Transparent fill.
    pub fn draw_transparent_fill(
        &self,
        frame: &mut FrameContext,
        renderers: &mut InstancingRenderers,
    ) -> bool {
        let skip = self.counters.no_transparent_fill();
        self.dispatch(
            frame,
            renderers,
            skip,
            RendererKind::Draw,
            RenderPass::TransparentFill,
        )
    }

    /// Depth of opaque portions.
    pub fn draw_depth(&self, frame: &mut FrameContext, renderers: &mut InstancingRenderers) -> bool {
        let skip = self.counters.no_opaque_fill();
        self.dispatch(frame, renderers, skip, RendererKind::Depth, RenderPass::OpaqueFill)
    }

    /// Normals of opaque portions.
    pub fn draw_normals(
        &self,
        frame: &mut FrameContext,
        renderers: &mut InstancingRenderers,
    ) -> bool {
        let skip = self.counters.no_opaque_fill();
        self.dispatch(frame, renderers, skip, RendererKind::Normals, RenderPass::OpaqueFill)
    }

    /// X-ray fill.
    pub fn draw_xrayed_fill(
        &self,
        frame: &mut FrameContext,
        renderers: &mut InstancingRenderers,
    ) -> bool {
        let skip = self.counters.nothing_shown() || self.counters.xrayed == 0;
        self.dispatch(frame, renderers, skip, RendererKind::Fill, RenderPass::XRayedFill)
    }

    /// Highlight fill.
    pub fn draw_highlighted_fill(
        &self,
        frame: &mut FrameContext,
        renderers: &mut InstancingRenderers,
    ) -> bool {
        let skip = self.counters.nothing_shown() || self.counters.highlighted == 0;
        self.dispatch(
            frame,
            renderers,
            skip,
            RendererKind::Fill,
            RenderPass::HighlightedFill,
        )
    }

    /// Selection fill.
    pub fn draw_selected_fill(
        &self,
        frame: &mut FrameContext,
        renderers: &mut InstancingRenderers,
    ) -> bool {
        let skip = self.counters.nothing_shown() || self.counters.selected == 0;
        self.dispatch(frame, renderers, skip, RendererKind::Fill, RenderPass::SelectedFill)
    }

    /// Edges of opaque portions.
    pub fn draw_opaque_edges(
        &self,
        frame: &mut FrameContext,
        renderers: &mut InstancingRenderers,
    ) -> bool {
        let skip = self.counters.nothing_shown() || self.counters.edges == 0;
        self.dispatch(frame, renderers, skip, RendererKind::Edges, RenderPass::OpaqueEdges)
    }

    /// Edges of transparent portions.
    pub fn draw_transparent_edges(
        &self,
        frame: &mut FrameContext,
        renderers: &mut InstancingRenderers,
    ) -> bool {
        let skip = self.counters.nothing_shown() || self.counters.edges == 0;
        self.dispatch(
            frame,
            renderers,
            skip,
            RendererKind::Edges,
            RenderPass::TransparentEdges,
        )
    }

    /// X-ray edges.
    pub fn draw_xrayed_edges(
        &self,
        frame: &mut FrameContext,
        renderers: &mut InstancingRenderers,
    ) -> bool {
        let skip = self.counters.nothing_shown() || self.counters.xrayed == 0;
        self.dispatch(frame, renderers, skip, RendererKind::Edges, RenderPass::XRayedEdges)
    }

    /// Highlight edges.
    pub fn draw_highlighted_edges(
        &self,
        frame: &mut FrameContext,
        renderers: &mut InstancingRenderers,
    ) -> bool {
        let skip = self.counters.nothing_shown() || self.counters.highlighted == 0;
        self.dispatch(
            frame,
            renderers,
            skip,
            RendererKind::Edges,
            RenderPass::HighlightedEdges,
        )
    }

    /// Selection edges.
    pub fn draw_selected_edges(
        &self,
        frame: &mut FrameContext,
        renderers: &mut InstancingRenderers,
    ) -> bool {
        let skip = self.counters.nothing_shown() || self.counters.selected == 0;
        self.dispatch(
            frame,
            renderers,
            skip,
            RendererKind::Edges,
            RenderPass::SelectedEdges,
        )
    }

    /// Occlusion test geometry.
    pub fn draw_occlusion(
        &self,
        frame: &mut FrameContext,
        renderers: &mut InstancingRenderers,
    ) -> bool {
        let skip = self.counters.nothing_shown();
        self.dispatch(frame, renderers, skip, RendererKind::Occlusion, RenderPass::OpaqueFill)
    }

    /// Shadow map geometry.
    pub fn draw_shadow(&self, frame: &mut FrameContext, renderers: &mut InstancingRenderers) -> bool {
        let skip = self.counters.nothing_shown();
        self.dispatch(frame, renderers, skip, RendererKind::Shadow, RenderPass::OpaqueFill)
    }

    /// Pick colors.
    pub fn draw_pick_mesh(
        &self,
        frame: &mut FrameContext,
        renderers: &mut InstancingRenderers,
    ) -> bool {
        let skip = self.counters.nothing_shown();
        self.dispatch(frame, renderers, skip, RendererKind::PickMesh, RenderPass::Pick)
    }

    /// Pick depths.
    pub fn draw_pick_depths(
        &self,
        frame: &mut FrameContext,
        renderers: &mut InstancingRenderers,
    ) -> bool {
        let skip = self.counters.nothing_shown();
        self.dispatch(frame, renderers, skip, RendererKind::PickDepth, RenderPass::Pick)
    }

    /// Pick normals.
    pub fn draw_pick_normals(
        &self,
        frame: &mut FrameContext,
        renderers: &mut InstancingRenderers,
    ) -> bool {
        let skip = self.counters.nothing_shown();
        self.dispatch(frame, renderers, skip, RendererKind::PickNormals, RenderPass::Pick)
    }
}
