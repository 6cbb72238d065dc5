//! Octahedral normal encoding.
//!
//! A unit vector is projected onto the octahedron `|x| + |y| + |z| = 1`. The
//! lower hemisphere is folded over the diagonals into the same square, so
//! the whole sphere maps onto `[-1, 1]^2` and fits in two signed bytes.
//!
//! Rounding each coordinate to a byte can go either way. All four
//! floor/ceil combinations are decoded and the one whose direction is
//! closest to the input (largest dot product) is kept.

use glam::{Vec2, Vec3};

/// Bytes per encoded normal.
pub const OCT_COMPONENTS: usize = 2;

/// Half-range the projected coordinates are scaled to before rounding.
const OCT_SCALE: f32 = 127.5;

/// Rounding direction for one encoded coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OctRounding {
    /// Round toward negative infinity.
    Floor,
    /// Round toward positive infinity.
    Ceil,
}

impl OctRounding {
    #[inline]
    fn apply(self, v: f32) -> f32 {
        match self {
            Self::Floor => v.floor(),
            Self::Ceil => v.ceil(),
        }
    }
}

const CANDIDATES: [(OctRounding, OctRounding); 4] = [
    (OctRounding::Floor, OctRounding::Floor),
    (OctRounding::Ceil, OctRounding::Floor),
    (OctRounding::Floor, OctRounding::Ceil),
    (OctRounding::Ceil, OctRounding::Ceil),
];

/// Encodes one normal, keeping the best of the four rounding combinations.
///
/// The input does not need to be unit length. A zero vector encodes as
/// `[0, 0]`, which decodes to `+Z`.
#[must_use]
pub fn oct_encode(normal: Vec3) -> [i8; 2] {
    let mut best = oct_encode_rounded(normal, OctRounding::Floor, OctRounding::Floor);
    let mut best_cos = normal.dot(oct_decode(best));

    for &(rx, ry) in &CANDIDATES[1..] {
        let candidate = oct_encode_rounded(normal, rx, ry);
        let cos = normal.dot(oct_decode(candidate));
        if cos > best_cos {
            best = candidate;
            best_cos = cos;
        }
    }
    best
}

/// Encodes one normal with a fixed rounding direction per coordinate.
#[must_use]
pub fn oct_encode_rounded(normal: Vec3, round_x: OctRounding, round_y: OctRounding) -> [i8; 2] {
    let p = project(normal) * OCT_SCALE;
    [to_byte(round_x.apply(p.x)), to_byte(round_y.apply(p.y))]
}

/// Decodes two bytes back to a unit vector.
#[must_use]
pub fn oct_decode(code: [i8; 2]) -> Vec3 {
    let x = f32::from(code[0]);
    let y = f32::from(code[1]);
    let mut x = x / if x < 0.0 { 127.0 } else { 128.0 };
    let mut y = y / if y < 0.0 { 127.0 } else { 128.0 };
    let z = 1.0 - x.abs() - y.abs();
    if z < 0.0 {
        let folded = fold(Vec2::new(x, y));
        x = folded.x;
        y = folded.y;
    }
    Vec3::new(x, y, z).normalize_or_zero()
}

/// Encodes a flat XYZ normal array into a new flat XY byte array.
#[must_use]
pub fn oct_encode_normals(normals: &[f32]) -> Vec<i8> {
    let mut out = vec![0i8; normals.len() / 3 * OCT_COMPONENTS];
    oct_encode_normals_into(normals, &mut out);
    out
}

/// Encodes into a caller-owned buffer. Returns the number of bytes written.
pub fn oct_encode_normals_into(normals: &[f32], out: &mut [i8]) -> usize {
    let mut written = 0;
    for (src, dst) in normals
        .chunks_exact(3)
        .zip(out.chunks_exact_mut(OCT_COMPONENTS))
    {
        let code = oct_encode(Vec3::new(src[0], src[1], src[2]));
        dst.copy_from_slice(&code);
        written += OCT_COMPONENTS;
    }
    written
}

fn project(n: Vec3) -> Vec2 {
    let l1 = n.x.abs() + n.y.abs() + n.z.abs();
    if l1 == 0.0 {
        return Vec2::ZERO;
    }
    let p = Vec2::new(n.x / l1, n.y / l1);
    if n.z < 0.0 {
        fold(p)
    } else {
        p
    }
}

/// Reflects a point across the diamond edge. Self-inverse on the square.
#[inline]
fn fold(p: Vec2) -> Vec2 {
    Vec2::new(
        (1.0 - p.y.abs()) * sign(p.x),
        (1.0 - p.x.abs()) * sign(p.y),
    )
}

#[inline]
fn sign(v: f32) -> f32 {
    if v >= 0.0 {
        1.0
    } else {
        -1.0
    }
}

#[inline]
fn to_byte(v: f32) -> i8 {
    // Saturating: ceil(127.5) lands on 128
    v.clamp(-128.0, 127.0) as i8
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn random_unit(rng: &mut ChaCha8Rng) -> Vec3 {
        loop {
            let v = Vec3::new(
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            );
            let len = v.length();
            if len > 0.1 && len <= 1.0 {
                return v / len;
            }
        }
    }

    #[test]
    fn test_axes_round_trip() {
        for axis in [Vec3::X, Vec3::Y, Vec3::Z, -Vec3::X, -Vec3::Y, -Vec3::Z] {
            let decoded = oct_decode(oct_encode(axis));
            assert!(axis.dot(decoded) > 0.999, "{axis} decoded to {decoded}");
        }
    }

    #[test]
    fn test_best_of_four_never_worse_than_any_rounding() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let fold_edges = [
            Vec3::new(0.5, 0.5, -0.001),
            Vec3::new(-0.7, 0.3, 0.0),
            Vec3::new(0.01, -0.99, -0.1),
        ];
        let normals = (0..2_000)
            .map(|_| random_unit(&mut rng))
            .chain(fold_edges.map(Vec3::normalize));

        for n in normals {
            let best = n.dot(oct_decode(oct_encode(n)));
            for (rx, ry) in CANDIDATES {
                let single = n.dot(oct_decode(oct_encode_rounded(n, rx, ry)));
                assert!(
                    best >= single,
                    "best {best} < {rx:?}/{ry:?} {single} for {n}"
                );
            }
        }
    }

    #[test]
    fn test_decoded_is_unit_and_close() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        for _ in 0..2_000 {
            let n = random_unit(&mut rng);
            let decoded = oct_decode(oct_encode(n));
            assert!((decoded.length() - 1.0).abs() < 1e-5);
            // Two bytes give well under two degrees of error
            assert!(n.dot(decoded) > 0.9994, "{n} decoded to {decoded}");
        }
    }

    #[test]
    fn test_lower_hemisphere_keeps_sign() {
        let n = Vec3::new(0.3, -0.4, -0.866).normalize();
        let decoded = oct_decode(oct_encode(n));
        assert!(decoded.z < 0.0);
        assert!(decoded.y < 0.0);
        assert!(decoded.x > 0.0);
    }

    #[test]
    fn test_zero_normal_is_stable() {
        assert_eq!(oct_encode(Vec3::ZERO), [0, 0]);
    }

    #[test]
    fn test_flat_array_encoding() {
        let normals = [0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0];
        let encoded = oct_encode_normals(&normals);
        assert_eq!(encoded.len(), 4);
        assert!(oct_decode([encoded[2], encoded[3]]).dot(Vec3::Y) > 0.999);
    }
}
