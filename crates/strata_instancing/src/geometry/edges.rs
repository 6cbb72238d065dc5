//! Feature-edge extraction for triangle meshes.
//!
//! Coincident vertices are welded first so that seams in the vertex data
//! (split normals, UV seams) do not show up as edges. An edge is kept when
//! it borders exactly one triangle, more than two triangles, or two
//! triangles whose normals differ by more than the threshold angle.

use std::collections::HashMap;

use glam::Vec3;

/// Positions closer than this are welded together.
const WELD_PRECISION: f32 = 1.0e4;

struct Edge {
    /// Unwelded vertex indices of the first occurrence, as uploaded.
    vertices: [u32; 2],
    first_face: Vec3,
    second_face: Option<Vec3>,
    faces: u32,
}

/// Derives edge indices (pairs) from triangle indices.
///
/// `positions` is a flat XYZ array. It may be float local positions or
/// lattice coordinates; only angles matter. Triangles that reference
/// missing vertices or have zero area are skipped.
#[must_use]
pub fn build_edge_indices(positions: &[f32], indices: &[u32], threshold_degrees: f32) -> Vec<u32> {
    let vertex_count = positions.len() / 3;
    let vertex = |i: u32| -> Vec3 {
        let i = i as usize * 3;
        Vec3::new(positions[i], positions[i + 1], positions[i + 2])
    };

    // Weld: every vertex maps to the first vertex sharing its rounded position.
    let mut welded = Vec::with_capacity(vertex_count);
    let mut seen: HashMap<[i64; 3], u32> = HashMap::with_capacity(vertex_count);
    for i in 0..vertex_count as u32 {
        let p = vertex(i) * WELD_PRECISION;
        let key = [p.x.round() as i64, p.y.round() as i64, p.z.round() as i64];
        welded.push(*seen.entry(key).or_insert(i));
    }

    let threshold_cos = threshold_degrees.to_radians().cos();
    let mut edges: Vec<Edge> = Vec::new();
    let mut lookup: HashMap<(u32, u32), usize> = HashMap::new();

    for tri in indices.chunks_exact(3) {
        if tri.iter().any(|&i| i as usize >= vertex_count) {
            continue;
        }
        let (a, b, c) = (vertex(tri[0]), vertex(tri[1]), vertex(tri[2]));
        let normal = (b - a).cross(c - a);
        if normal.length_squared() == 0.0 {
            continue;
        }
        let normal = normal.normalize();

        for (i0, i1) in [(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])] {
            let (w0, w1) = (welded[i0 as usize], welded[i1 as usize]);
            if w0 == w1 {
                continue;
            }
            let key = (w0.min(w1), w0.max(w1));
            match lookup.get(&key) {
                Some(&slot) => {
                    let edge = &mut edges[slot];
                    edge.faces += 1;
                    if edge.second_face.is_none() {
                        edge.second_face = Some(normal);
                    }
                }
                None => {
                    lookup.insert(key, edges.len());
                    edges.push(Edge {
                        vertices: [i0, i1],
                        first_face: normal,
                        second_face: None,
                        faces: 1,
                    });
                }
            }
        }
    }

    let mut out = Vec::new();
    for edge in &edges {
        let keep = match edge.second_face {
            None => true,
            Some(_) if edge.faces > 2 => true,
            Some(second) => edge.first_face.dot(second) <= threshold_cos,
        };
        if keep {
            out.extend_from_slice(&edge.vertices);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two triangles sharing the diagonal of a unit square.
    fn flat_quad() -> (Vec<f32>, Vec<u32>) {
        let positions = vec![
            0.0, 0.0, 0.0, //
            1.0, 0.0, 0.0, //
            1.0, 1.0, 0.0, //
            0.0, 1.0, 0.0,
        ];
        (positions, vec![0, 1, 2, 0, 2, 3])
    }

    fn edge_count(edges: &[u32]) -> usize {
        edges.len() / 2
    }

    #[test]
    fn test_coplanar_diagonal_dropped() {
        let (positions, indices) = flat_quad();
        let edges = build_edge_indices(&positions, &indices, 10.0);
        assert_eq!(edge_count(&edges), 4);
        let has_diagonal = edges
            .chunks_exact(2)
            .any(|e| (e[0] == 0 && e[1] == 2) || (e[0] == 2 && e[1] == 0));
        assert!(!has_diagonal);
    }

    #[test]
    fn test_folded_edge_kept() {
        // Second triangle lifted out of plane: 90 degree fold along 0-2.
        let positions = vec![
            0.0, 0.0, 0.0, //
            1.0, 0.0, 0.0, //
            1.0, 1.0, 0.0, //
            0.0, 0.0, 1.0,
        ];
        let edges = build_edge_indices(&positions, &[0, 1, 2, 0, 2, 3], 10.0);
        assert_eq!(edge_count(&edges), 5);
    }

    #[test]
    fn test_seam_vertices_welded() {
        // Same quad, but the second triangle uses duplicated vertices.
        let positions = vec![
            0.0, 0.0, 0.0, //
            1.0, 0.0, 0.0, //
            1.0, 1.0, 0.0, //
            0.0, 0.0, 0.0, //
            1.0, 1.0, 0.0, //
            0.0, 1.0, 0.0,
        ];
        let edges = build_edge_indices(&positions, &[0, 1, 2, 3, 4, 5], 10.0);
        assert_eq!(edge_count(&edges), 4);
    }

    #[test]
    fn test_degenerate_and_out_of_range_skipped() {
        let (positions, _) = flat_quad();
        let edges = build_edge_indices(&positions, &[0, 1, 1, 0, 1, 9], 10.0);
        assert!(edges.is_empty());
    }
}
