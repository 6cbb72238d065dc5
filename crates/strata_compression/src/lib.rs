//! # Strata Compression
//!
//! Lossy compression for geometry that is shared by many instances:
//!
//! - **Positions** are quantized onto a 16-bit lattice spanning the mesh's
//!   local bounding box. A decode matrix maps the lattice back to local space.
//! - **Normals** are octahedrally encoded into two signed bytes, picking the
//!   rounding direction that reconstructs the closest direction.
//!
//! ```text
//! f32 xyz ──► Aabb ──► quantize ──► u16 xyz + decode matrix
//! f32 nrm ──────────► oct encode ──► i8 xy (best of 4 roundings)
//! ```
//!
//! ## CRITICAL RULE
//!
//! This crate must NEVER depend on `wgpu` or any other GPU crate.
//! GPU upload belongs in `strata_instancing`.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod bounds;
pub mod normals;
pub mod positions;

pub use bounds::Aabb;
pub use normals::{
    oct_decode, oct_encode, oct_encode_normals, oct_encode_normals_into, oct_encode_rounded,
    OctRounding, OCT_COMPONENTS,
};
pub use positions::{
    decode_position, quantize_positions, quantize_positions_into, QuantizedPositions, LATTICE_MAX,
};
