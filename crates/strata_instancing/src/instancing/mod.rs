//! Instanced portions of a shared mesh.
//!
//! ## Key Concepts
//!
//! - **Layer**: one geometry on the GPU plus per-portion attribute buffers
//! - **Portion**: one instance of the geometry, addressed by a dense id
//! - **Pass selectors**: four bytes per portion telling each render pass
//!   whether to draw it
//! - **Counters**: per-predicate portion counts that let whole passes be
//!   skipped without touching portions

mod counters;
mod draw;
mod flags;
mod layer;
mod model;
mod patch;
mod render_pass;

pub use counters::{PortionCounters, Predicate};
pub use draw::{DrawStats, FrameContext, InstancingRenderers, LayerRenderer, RendererKind};
pub use flags::{EntityFlags, PortionState};
pub use layer::{
    Building, Finalized, InstancingLayer, LayerGeometry, LayerMesh, LayerNormals, LayerPositions,
    NewPortion, PortionBuffers, PortionDesc, PortionId, MAX_PORTIONS,
};
pub use model::{InstancedModel, LayerSlot};
pub use render_pass::{encode_clippable, encode_pass_selectors, PassSelectors, RenderPass};
