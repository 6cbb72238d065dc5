//! Shared-mesh geometry helpers.
//!
//! Primitive topology names and edge derivation for layers that do not
//! bring their own edge indices.

mod edges;
mod primitive;

pub use edges::build_edge_indices;
pub use primitive::PrimitiveKind;
