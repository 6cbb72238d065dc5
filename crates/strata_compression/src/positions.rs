//! Position quantization onto a 16-bit lattice.
//!
//! Each axis of the local bounding box is divided into 65535 cells. A
//! coordinate is stored as the index of the nearest lattice point, so the
//! reconstruction error on an axis never exceeds half a cell.
//!
//! A flat axis (`max == min`) gets a multiplier of zero: every coordinate on
//! it quantizes to 0 and the decode matrix restores the constant through its
//! translation.

use glam::{Mat4, Vec3, Vec4};

use crate::bounds::Aabb;

/// Largest lattice coordinate on each axis.
pub const LATTICE_MAX: f32 = 65535.0;

/// Quantized positions plus the matrix that maps them back to local space.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantizedPositions {
    /// Flat XYZ lattice coordinates.
    pub positions: Vec<u16>,
    /// `Translate(min) * Scale((max - min) / 65535)`.
    pub decode_matrix: Mat4,
}

/// Quantizes a flat XYZ array against its bounding box.
///
/// Trailing components that do not form a full triple are dropped.
#[must_use]
pub fn quantize_positions(positions: &[f32], aabb: &Aabb) -> QuantizedPositions {
    let mut quantized = vec![0u16; positions.len() / 3 * 3];
    let decode_matrix = quantize_positions_into(positions, aabb, &mut quantized);
    QuantizedPositions {
        positions: quantized,
        decode_matrix,
    }
}

/// Quantizes into a caller-owned buffer and returns the decode matrix.
///
/// Writes `min(positions.len(), out.len())` rounded down to whole triples.
pub fn quantize_positions_into(positions: &[f32], aabb: &Aabb, out: &mut [u16]) -> Mat4 {
    let extent = aabb.extent();
    let multiplier = Vec3::new(
        axis_multiplier(extent.x),
        axis_multiplier(extent.y),
        axis_multiplier(extent.z),
    );

    for (src, dst) in positions.chunks_exact(3).zip(out.chunks_exact_mut(3)) {
        let p = (Vec3::new(src[0], src[1], src[2]) - aabb.min) * multiplier;
        dst[0] = to_lattice(p.x);
        dst[1] = to_lattice(p.y);
        dst[2] = to_lattice(p.z);
    }

    decode_matrix(aabb)
}

/// Reconstructs one local-space position from its lattice coordinates.
#[inline]
#[must_use]
pub fn decode_position(decode_matrix: &Mat4, lattice: [u16; 3]) -> Vec3 {
    decode_matrix.transform_point3(Vec3::new(
        f32::from(lattice[0]),
        f32::from(lattice[1]),
        f32::from(lattice[2]),
    ))
}

// Built from columns: a point-sized box has an all-zero scale, which
// `Mat4::from_scale` rejects.
fn decode_matrix(aabb: &Aabb) -> Mat4 {
    let scale = aabb.extent() / LATTICE_MAX;
    Mat4::from_cols(
        Vec4::new(scale.x, 0.0, 0.0, 0.0),
        Vec4::new(0.0, scale.y, 0.0, 0.0),
        Vec4::new(0.0, 0.0, scale.z, 0.0),
        aabb.min.extend(1.0),
    )
}

#[inline]
fn axis_multiplier(extent: f32) -> f32 {
    if extent == 0.0 {
        0.0
    } else {
        LATTICE_MAX / extent
    }
}

#[inline]
fn to_lattice(scaled: f32) -> u16 {
    scaled.round().clamp(0.0, LATTICE_MAX) as u16
}
