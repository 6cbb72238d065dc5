//! Local-space axis-aligned bounds.

use glam::{Mat4, Vec3};

/// Axis-aligned bounding box in a mesh's local space.
///
/// A freshly collapsed box has `min = +inf` and `max = -inf`, so the first
/// expanded point becomes both corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner.
    pub min: Vec3,
    /// Maximum corner.
    pub max: Vec3,
}

impl Aabb {
    /// Creates a box from its corners.
    #[must_use]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Creates an inverted box that any point expands.
    #[must_use]
    pub const fn collapsed() -> Self {
        Self {
            min: Vec3::splat(f32::INFINITY),
            max: Vec3::splat(f32::NEG_INFINITY),
        }
    }

    /// Bounds of a flat XYZ array. Trailing components that do not form a
    /// full triple are ignored.
    #[must_use]
    pub fn from_points(positions: &[f32]) -> Self {
        let mut aabb = Self::collapsed();
        for p in positions.chunks_exact(3) {
            aabb.expand_point(Vec3::new(p[0], p[1], p[2]));
        }
        aabb
    }

    /// Bounds of a flat XYZ lattice array, in lattice units.
    #[must_use]
    pub fn from_lattice_points(positions: &[u16]) -> Self {
        let mut aabb = Self::collapsed();
        for p in positions.chunks_exact(3) {
            aabb.expand_point(Vec3::new(f32::from(p[0]), f32::from(p[1]), f32::from(p[2])));
        }
        aabb
    }

    /// Grows the box to contain `point`.
    #[inline]
    pub fn expand_point(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Returns true if no point has been added yet.
    #[must_use]
    pub fn is_collapsed(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Size along each axis.
    #[must_use]
    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }

    /// The eight corners, ordered by bit pattern (x = bit 0, y = bit 1, z = bit 2).
    #[must_use]
    pub fn corners(&self) -> [Vec3; 8] {
        let mut corners = [Vec3::ZERO; 8];
        for (i, corner) in corners.iter_mut().enumerate() {
            *corner = Vec3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            );
        }
        corners
    }

    /// Maps a box given in lattice units back to local space.
    ///
    /// Used for pre-compressed geometry, where only the lattice and its
    /// decode matrix are known.
    #[must_use]
    pub fn decompress(&self, decode_matrix: &Mat4) -> Self {
        let mut out = Self::collapsed();
        for corner in self.corners() {
            out.expand_point(decode_matrix.transform_point3(corner));
        }
        out
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::collapsed()
    }
}
