//! World-space bounds.
//!
//! Layer geometry lives in `f32` local space. World bounds are kept in `f64`
//! because RTC centers put layers far from the origin.

use glam::{DMat4, DVec3};
use strata_compression::Aabb;

/// Axis-aligned bounding box in world space, double precision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DAabb {
    /// Minimum corner.
    pub min: DVec3,
    /// Maximum corner.
    pub max: DVec3,
}

impl DAabb {
    /// Creates a box from its corners.
    #[must_use]
    pub const fn new(min: DVec3, max: DVec3) -> Self {
        Self { min, max }
    }

    /// Creates an inverted box that any point expands.
    #[must_use]
    pub const fn collapsed() -> Self {
        Self {
            min: DVec3::splat(f64::INFINITY),
            max: DVec3::splat(f64::NEG_INFINITY),
        }
    }

    /// Returns true if nothing has been added yet.
    #[must_use]
    pub fn is_collapsed(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Grows the box to contain `point`.
    #[inline]
    pub fn expand_point(&mut self, point: DVec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Grows the box to contain `other`. A collapsed `other` changes nothing.
    pub fn expand(&mut self, other: &Self) {
        if other.is_collapsed() {
            return;
        }
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    /// Shifts both corners.
    pub fn translate(&mut self, offset: DVec3) {
        self.min += offset;
        self.max += offset;
    }

    /// Returns true if both corners are within `epsilon` of `other`'s.
    #[must_use]
    pub fn abs_diff_eq(&self, other: &Self, epsilon: f64) -> bool {
        self.min.abs_diff_eq(other.min, epsilon) && self.max.abs_diff_eq(other.max, epsilon)
    }
}

impl Default for DAabb {
    fn default() -> Self {
        Self::collapsed()
    }
}

impl From<Aabb> for DAabb {
    fn from(aabb: Aabb) -> Self {
        Self::new(aabb.min.as_dvec3(), aabb.max.as_dvec3())
    }
}

/// Oriented bounding box stored as its eight corners.
///
/// Transforming the corners and re-bounding them gives a conservative world
/// AABB for any affine transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Obb {
    /// Corner points.
    pub corners: [DVec3; 8],
}

impl Obb {
    /// The box spanned by a local AABB.
    #[must_use]
    pub fn from_aabb(aabb: &Aabb) -> Self {
        Self {
            corners: aabb.corners().map(|c| c.as_dvec3()),
        }
    }

    /// World bounds of the corners after applying `matrix`.
    #[must_use]
    pub fn transformed_aabb(&self, matrix: &DMat4) -> DAabb {
        let mut aabb = DAabb::collapsed();
        for corner in &self.corners {
            aabb.expand_point(matrix.transform_point3(*corner));
        }
        aabb
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_expand_ignores_collapsed() {
        let mut a = DAabb::new(DVec3::ZERO, DVec3::ONE);
        a.expand(&DAabb::collapsed());
        assert_eq!(a, DAabb::new(DVec3::ZERO, DVec3::ONE));
    }

    #[test]
    fn test_obb_translation() {
        let obb = Obb::from_aabb(&Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0)));
        let world = obb.transformed_aabb(&DMat4::from_translation(DVec3::new(5.0, 0.0, 0.0)));
        assert_eq!(world.min, DVec3::new(4.0, -1.0, -1.0));
        assert_eq!(world.max, DVec3::new(6.0, 1.0, 1.0));
    }

    #[test]
    fn test_obb_rotation_is_conservative() {
        let obb = Obb::from_aabb(&Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0)));
        let world = obb.transformed_aabb(&DMat4::from_rotation_z(std::f64::consts::FRAC_PI_4));
        let r = 2.0_f64.sqrt();
        assert!(world.abs_diff_eq(
            &DAabb::new(DVec3::new(-r, -r, -1.0), DVec3::new(r, r, 1.0)),
            1e-9
        ));
    }
}
