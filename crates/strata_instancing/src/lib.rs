//! # Strata Instancing
//!
//! Instanced-geometry layers for large scene viewers:
//! - One compressed mesh on the GPU, reused by thousands of portions
//! - Per-portion color, transform, pick color and packed state flags
//! - Single-portion patches that rewrite 4 bytes, not whole buffers
//! - Whole render passes skipped from O(1) counter tests
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     LAYER LIFECYCLE                           │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Geometry → Quantize/Oct-encode → Static GPU buffers          │
//! │       ↓                                                       │
//! │  create_portion × N → staging arrays → finalize → GPU buffers │
//! │       ↓                                                       │
//! │  set_* → pass selectors + counters → draw gate → renderer     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## MANDATE
//!
//! - Flag patches never scan portions
//! - Layer and model counters always equal the number of portions
//!   for which each predicate holds
//! - No GPU calls outside [`gpu::BufferAllocator`]

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod bounds;
pub mod config;
pub mod error;
pub mod geometry;
pub mod gpu;
pub mod instancing;

pub use bounds::{DAabb, Obb};
pub use config::{IndexFormat, InstancingConfig};
pub use error::{BufferError, ConfigError, LayerError, LayerResult};
pub use geometry::{build_edge_indices, PrimitiveKind};
pub use gpu::{BufferAllocator, BufferId, HostBuffers, WgpuBuffers};
pub use instancing::{
    encode_pass_selectors, Building, DrawStats, EntityFlags, Finalized, FrameContext,
    InstancedModel, InstancingLayer, InstancingRenderers, LayerGeometry, LayerNormals,
    LayerPositions, LayerRenderer, LayerSlot, NewPortion, PassSelectors, PortionCounters,
    PortionDesc, PortionId, PortionState, Predicate, RenderPass, RendererKind, MAX_PORTIONS,
};
