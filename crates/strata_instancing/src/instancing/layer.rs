//! # Instancing Layer
//!
//! One geometry uploaded once, drawn many times as portions.
//!
//! ```text
//! InstancingLayer<Building> ──create_portion──► staging arrays
//!            │
//!         finalize (consumes)
//!            ▼
//! InstancingLayer<Finalized> ──set_*──► 4-byte sub-range patches
//! ```
//!
//! The phase is a type parameter, so appending to a finalized layer or
//! patching a building one does not compile. [`InstancedModel`] wraps both
//! phases behind runtime checks for callers that hold layers by index.
//!
//! [`InstancedModel`]: super::InstancedModel

use std::borrow::Cow;

use glam::{DMat4, DVec3, Mat4};
use strata_compression::{decode_position, oct_encode_normals, quantize_positions, Aabb};
use tracing::{debug, trace};

use super::counters::PortionCounters;
use super::flags::PortionState;
use crate::bounds::{DAabb, Obb};
use crate::config::{IndexFormat, InstancingConfig};
use crate::error::{LayerError, LayerResult};
use crate::geometry::{build_edge_indices, PrimitiveKind};
use crate::gpu::{BufferAllocator, BufferDesc, BufferId, BufferTarget, BufferUsage, ComponentType};

/// Most portions one layer can hold. Ids are `u32` and start at zero.
pub const MAX_PORTIONS: u32 = u32::MAX;

const MODEL_ROW_LABELS: [&str; 3] = [
    "portion model matrix row 0",
    "portion model matrix row 1",
    "portion model matrix row 2",
];

const NORMAL_ROW_LABELS: [&str; 3] = [
    "portion normal matrix row 0",
    "portion normal matrix row 1",
    "portion normal matrix row 2",
];

/// Vertex positions of a layer's geometry.
#[derive(Debug, Clone, Copy)]
pub enum LayerPositions<'a> {
    /// Local-space XYZ triples. Quantized on creation.
    Float(&'a [f32]),
    /// Already on the 16-bit lattice.
    Quantized {
        /// Lattice XYZ triples.
        lattice: &'a [u16],
        /// Maps lattice coordinates back to local space.
        decode_matrix: Mat4,
    },
}

/// Vertex normals of a layer's geometry.
#[derive(Debug, Clone, Copy)]
pub enum LayerNormals<'a> {
    /// Unit XYZ triples. Octahedrally encoded on creation.
    Float(&'a [f32]),
    /// Already encoded, two bytes per vertex.
    OctEncoded(&'a [i8]),
}

/// Geometry shared by every portion of a layer.
#[derive(Debug, Clone, Copy)]
pub struct LayerGeometry<'a> {
    /// Primitive name. `None` or an unknown name means triangles.
    pub primitive: Option<&'a str>,
    /// Vertex positions.
    pub positions: LayerPositions<'a>,
    /// Vertex normals.
    pub normals: Option<LayerNormals<'a>>,
    /// Element indices.
    pub indices: Option<&'a [u32]>,
    /// Edge index pairs. Derived from triangles when absent.
    pub edge_indices: Option<&'a [u32]>,
    /// Overrides the configured edge threshold.
    pub edge_threshold_degrees: Option<f32>,
    /// Relative-to-center origin added to every world position.
    pub rtc_center: Option<DVec3>,
}

impl<'a> LayerGeometry<'a> {
    /// Geometry with positions only.
    #[must_use]
    pub const fn new(positions: LayerPositions<'a>) -> Self {
        Self {
            primitive: None,
            positions,
            normals: None,
            indices: None,
            edge_indices: None,
            edge_threshold_degrees: None,
            rtc_center: None,
        }
    }

    /// Sets the primitive name.
    #[must_use]
    pub fn with_primitive(mut self, primitive: &'a str) -> Self {
        self.primitive = Some(primitive);
        self
    }

    /// Sets the normals.
    #[must_use]
    pub fn with_normals(mut self, normals: LayerNormals<'a>) -> Self {
        self.normals = Some(normals);
        self
    }

    /// Sets the element indices.
    #[must_use]
    pub fn with_indices(mut self, indices: &'a [u32]) -> Self {
        self.indices = Some(indices);
        self
    }

    /// Supplies edge indices instead of deriving them.
    #[must_use]
    pub fn with_edge_indices(mut self, edge_indices: &'a [u32]) -> Self {
        self.edge_indices = Some(edge_indices);
        self
    }

    /// Overrides the edge threshold for this layer.
    #[must_use]
    pub fn with_edge_threshold(mut self, degrees: f32) -> Self {
        self.edge_threshold_degrees = Some(degrees);
        self
    }

    /// Sets the relative-to-center origin.
    #[must_use]
    pub fn with_rtc_center(mut self, center: DVec3) -> Self {
        self.rtc_center = Some(center);
        self
    }
}

/// GPU-resident geometry of a layer.
#[derive(Debug, Clone)]
pub struct LayerMesh {
    /// Primitive topology.
    pub primitive: PrimitiveKind,
    /// Lattice positions, `u16` x4 with a zero `w`.
    pub positions: BufferId,
    /// Octahedral normals, `i8` x4 normalized with zero `z` and `w`.
    pub normals: Option<BufferId>,
    /// Element indices.
    pub indices: Option<BufferId>,
    /// Edge index pairs. `None` when the geometry has no edges.
    pub edge_indices: Option<BufferId>,
    /// Width of both index buffers.
    pub index_format: IndexFormat,
    /// Vertices in the position buffer.
    pub num_vertices: u32,
    /// Indices in the index buffer.
    pub num_indices: u32,
    /// Indices in the edge index buffer.
    pub num_edge_indices: u32,
    /// Lattice to local space.
    pub decode_matrix: Mat4,
    /// Bounds of the decoded positions.
    pub local_aabb: Aabb,
    /// Relative-to-center origin.
    pub rtc_center: Option<DVec3>,
    obb: Obb,
}

/// Identifier of a portion within its layer. Dense, starting at zero.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortionId(pub u32);

impl PortionId {
    /// Element offset into per-portion buffers.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Per-portion inputs to [`InstancingLayer::create_portion`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PortionDesc {
    /// Quantized RGB color.
    pub color: [u8; 3],
    /// Quantized opacity, stored as the color's alpha.
    pub opacity: u8,
    /// Local transform of this instance of the geometry.
    pub mesh_matrix: Mat4,
    /// Optional entity transform applied after the mesh matrix.
    pub world_matrix: Option<DMat4>,
    /// Color written by the pick pass.
    pub pick_color: [u8; 4],
}

impl Default for PortionDesc {
    fn default() -> Self {
        Self {
            color: [255, 255, 255],
            opacity: 255,
            mesh_matrix: Mat4::IDENTITY,
            world_matrix: None,
            pick_color: [0; 4],
        }
    }
}

/// Result of [`InstancingLayer::create_portion`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NewPortion {
    /// The new portion.
    pub id: PortionId,
    /// World bounds of the new portion alone.
    pub world_aabb: DAabb,
}

#[derive(Debug, Default)]
struct PortionStaging {
    colors: Vec<[u8; 4]>,
    pick_colors: Vec<[u8; 4]>,
    offsets: Vec<[f32; 3]>,
    model_rows: [Vec<[f32; 4]>; 3],
    normal_rows: [Vec<[f32; 4]>; 3],
}

/// Per-portion buffers created by finalize.
#[derive(Debug, Clone)]
pub struct PortionBuffers {
    /// RGBA, `u8` x4.
    pub colors: BufferId,
    /// Pass selectors, `u8` x4.
    pub flags: BufferId,
    /// Clippable selector, normalized `u8` x4 (only x is meaningful).
    pub flags2: BufferId,
    /// XYZ offsets, `f32` x3. Only with entity offsets enabled.
    pub offsets: Option<BufferId>,
    /// Model matrix rows 0..3, `f32` x4 each.
    pub model_matrix: [BufferId; 3],
    /// Normal matrix rows 0..3, `f32` x4 each.
    pub normal_matrix: [BufferId; 3],
    /// Pick colors, `u8` x4.
    pub pick_colors: BufferId,
}

impl PortionBuffers {
    fn destroy(&self, gpu: &mut impl BufferAllocator) {
        for id in [self.colors, self.flags, self.flags2, self.pick_colors]
            .into_iter()
            .chain(self.offsets)
            .chain(self.model_matrix)
            .chain(self.normal_matrix)
        {
            gpu.destroy(id);
        }
    }
}

/// Phase of a layer that still accepts portions.
#[derive(Debug, Default)]
pub struct Building {
    staging: PortionStaging,
}

/// Phase of a layer whose portions are on the GPU.
#[derive(Debug)]
pub struct Finalized {
    pub(super) buffers: PortionBuffers,
    pub(super) states: Vec<PortionState>,
}

/// A shared geometry plus its portions.
#[derive(Debug)]
pub struct InstancingLayer<P> {
    pub(super) index: usize,
    pub(super) mesh: LayerMesh,
    pub(super) aabb: DAabb,
    pub(super) counters: PortionCounters,
    pub(super) entity_offsets: bool,
    pub(super) phase: P,
}

impl<P> InstancingLayer<P> {
    /// Index of this layer in its model.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// The shared geometry.
    #[must_use]
    pub const fn mesh(&self) -> &LayerMesh {
        &self.mesh
    }

    /// Primitive topology.
    #[must_use]
    pub const fn primitive(&self) -> PrimitiveKind {
        self.mesh.primitive
    }

    /// Union of every portion's world bounds.
    #[must_use]
    pub const fn aabb(&self) -> &DAabb {
        &self.aabb
    }

    /// Layer-scope counters.
    #[must_use]
    pub const fn counters(&self) -> &PortionCounters {
        &self.counters
    }

    /// Portions created so far. Also the instance count.
    #[must_use]
    pub const fn num_portions(&self) -> u32 {
        self.counters.portions
    }

    /// Whether per-portion offsets are allocated.
    #[must_use]
    pub const fn entity_offsets_enabled(&self) -> bool {
        self.entity_offsets
    }

    fn destroy_mesh(&self, gpu: &mut impl BufferAllocator) {
        let mesh = &self.mesh;
        for id in std::iter::once(mesh.positions)
            .chain(mesh.normals)
            .chain(mesh.indices)
            .chain(mesh.edge_indices)
        {
            gpu.destroy(id);
        }
    }
}

impl InstancingLayer<Building> {
    /// Compresses and uploads the geometry.
    ///
    /// Float positions are quantized over their own bounds and float normals
    /// are octahedrally encoded. Edge indices are derived from triangle
    /// indices when none are supplied.
    ///
    /// # Errors
    ///
    /// - [`LayerError::InvalidGeometry`] for empty positions, arrays whose
    ///   length is not a whole number of vertices, mismatched normals or
    ///   out-of-range indices.
    /// - [`LayerError::CapacityExceeded`] if the vertex count is above the
    ///   ceiling for the configured index width.
    ///
    /// Nothing is allocated when an error is returned.
    pub fn new(
        index: usize,
        geometry: &LayerGeometry<'_>,
        config: &InstancingConfig,
        gpu: &mut impl BufferAllocator,
    ) -> LayerResult<Self> {
        let primitive = geometry
            .primitive
            .map_or_else(PrimitiveKind::default, PrimitiveKind::from_name);

        let num_vertices = match geometry.positions {
            LayerPositions::Float(p) => whole_items("positions", p.len(), 3)?,
            LayerPositions::Quantized { lattice, .. } => whole_items("positions", lattice.len(), 3)?,
        };
        if num_vertices == 0 {
            return Err(LayerError::InvalidGeometry("layer has no positions".into()));
        }
        let max = config.max_vertices();
        if num_vertices > max {
            return Err(LayerError::CapacityExceeded {
                vertices: num_vertices,
                max,
            });
        }

        if let Some(normals) = geometry.normals {
            let count = match normals {
                LayerNormals::Float(n) => whole_items("normals", n.len(), 3)?,
                LayerNormals::OctEncoded(n) => whole_items("normals", n.len(), 2)?,
            };
            if count != num_vertices {
                return Err(LayerError::InvalidGeometry(format!(
                    "{count} normals for {num_vertices} vertices"
                )));
            }
        }
        if let Some(indices) = geometry.indices {
            check_indices("indices", indices, num_vertices)?;
        }
        if let Some(edges) = geometry.edge_indices {
            whole_items("edge indices", edges.len(), 2)?;
            check_indices("edge indices", edges, num_vertices)?;
        }

        let (lattice, decode_matrix, local_aabb): (Cow<'_, [u16]>, Mat4, Aabb) =
            match geometry.positions {
                LayerPositions::Float(p) => {
                    let aabb = Aabb::from_points(p);
                    let quantized = quantize_positions(p, &aabb);
                    (Cow::Owned(quantized.positions), quantized.decode_matrix, aabb)
                }
                LayerPositions::Quantized {
                    lattice,
                    decode_matrix,
                } => (
                    Cow::Borrowed(lattice),
                    decode_matrix,
                    Aabb::from_lattice_points(lattice).decompress(&decode_matrix),
                ),
            };

        let edge_indices: Cow<'_, [u32]> = match (geometry.edge_indices, geometry.indices) {
            (Some(edges), _) => Cow::Borrowed(edges),
            (None, Some(indices)) if primitive == PrimitiveKind::Triangles => {
                let threshold = geometry
                    .edge_threshold_degrees
                    .unwrap_or(config.edge_threshold_degrees);
                let local = local_positions(&geometry.positions, &lattice, &decode_matrix);
                Cow::Owned(build_edge_indices(&local, indices, threshold))
            }
            _ => Cow::Borrowed(&[]),
        };

        let index_format = config.index_format();
        let positions = gpu.alloc(&BufferDesc::from_slice(
            "layer positions",
            BufferTarget::Attribute,
            &pad_lattice(&lattice),
            4,
            ComponentType::U16,
            BufferUsage::Static,
        ));
        let normals = geometry.normals.map(|normals| {
            let encoded = match normals {
                LayerNormals::Float(n) => Cow::Owned(oct_encode_normals(n)),
                LayerNormals::OctEncoded(n) => Cow::Borrowed(n),
            };
            gpu.alloc(
                &BufferDesc::from_slice(
                    "layer normals",
                    BufferTarget::Attribute,
                    &pad_normals(&encoded),
                    4,
                    ComponentType::I8,
                    BufferUsage::Static,
                )
                .normalized(),
            )
        });
        let indices = geometry
            .indices
            .map(|indices| alloc_indices(gpu, "layer indices", indices, index_format));
        let edge_buffer = (!edge_indices.is_empty())
            .then(|| alloc_indices(gpu, "layer edge indices", &edge_indices, index_format));

        debug!(
            layer = index,
            primitive = primitive.name(),
            precompressed = matches!(geometry.positions, LayerPositions::Quantized { .. }),
            vertices = num_vertices,
            indices = geometry.indices.map_or(0, <[u32]>::len),
            edge_indices = edge_indices.len(),
            "layer geometry uploaded"
        );

        Ok(Self {
            index,
            mesh: LayerMesh {
                primitive,
                positions,
                normals,
                indices,
                edge_indices: edge_buffer,
                index_format,
                num_vertices: num_vertices as u32,
                num_indices: geometry.indices.map_or(0, |i| i.len() as u32),
                num_edge_indices: edge_indices.len() as u32,
                decode_matrix,
                local_aabb,
                rtc_center: geometry.rtc_center,
                obb: Obb::from_aabb(&local_aabb),
            },
            aabb: DAabb::collapsed(),
            counters: PortionCounters::new(),
            entity_offsets: config.entity_offsets_enabled,
            phase: Building::default(),
        })
    }

    /// Appends a portion and returns its id and world bounds.
    ///
    /// The layer's AABB grows to include the portion. Both the layer and
    /// `model` counters record one more portion.
    ///
    /// # Errors
    ///
    /// [`LayerError::TooManyPortions`] once the layer holds
    /// [`MAX_PORTIONS`]. Nothing is staged.
    pub fn create_portion(
        &mut self,
        model: &mut PortionCounters,
        desc: &PortionDesc,
    ) -> LayerResult<NewPortion> {
        if self.counters.portions >= MAX_PORTIONS {
            return Err(LayerError::TooManyPortions {
                layer: self.index,
                max: MAX_PORTIONS,
            });
        }
        let id = PortionId(self.counters.portions);
        let staging = &mut self.phase.staging;

        let [r, g, b] = desc.color;
        staging.colors.push([r, g, b, desc.opacity]);
        staging.pick_colors.push(desc.pick_color);
        if self.entity_offsets {
            staging.offsets.push([0.0; 3]);
        }

        // Singular mesh matrices give a non-finite normal matrix.
        let normal_matrix = desc.mesh_matrix.transpose().inverse();
        for row in 0..3 {
            staging.model_rows[row].push(desc.mesh_matrix.row(row).to_array());
            staging.normal_rows[row].push(normal_matrix.row(row).to_array());
        }

        let mesh_matrix = desc.mesh_matrix.as_dmat4();
        let matrix = desc
            .world_matrix
            .map_or(mesh_matrix, |world| world * mesh_matrix);
        let mut world_aabb = self.mesh.obb.transformed_aabb(&matrix);
        if let Some(center) = self.mesh.rtc_center {
            world_aabb.translate(center);
        }
        self.aabb.expand(&world_aabb);

        self.counters.add_portion();
        model.add_portion();
        trace!(layer = self.index, portion = id.0, "portion staged");

        Ok(NewPortion { id, world_aabb })
    }

    /// Uploads every staged array and drops the staging memory.
    ///
    /// Pass selectors start zeroed, so nothing is drawn until each portion's
    /// flags are initialised.
    #[must_use]
    pub fn finalize(self, gpu: &mut impl BufferAllocator) -> InstancingLayer<Finalized> {
        let Self {
            index,
            mesh,
            aabb,
            counters,
            entity_offsets,
            phase,
        } = self;
        let staging = phase.staging;
        let num_portions = staging.colors.len();
        let zeros = vec![[0u8; 4]; num_portions];

        let colors = gpu.alloc(&BufferDesc::from_slice(
            "portion colors",
            BufferTarget::Attribute,
            &staging.colors,
            4,
            ComponentType::U8,
            BufferUsage::Dynamic,
        ));
        let flags = gpu.alloc(&BufferDesc::from_slice(
            "portion pass selectors",
            BufferTarget::Attribute,
            &zeros,
            4,
            ComponentType::U8,
            BufferUsage::Dynamic,
        ));
        let flags2 = gpu.alloc(
            &BufferDesc::from_slice(
                "portion clippable",
                BufferTarget::Attribute,
                &zeros,
                4,
                ComponentType::U8,
                BufferUsage::Dynamic,
            )
            .normalized(),
        );
        let offsets = entity_offsets.then(|| {
            gpu.alloc(&BufferDesc::from_slice(
                "portion offsets",
                BufferTarget::Attribute,
                &staging.offsets,
                3,
                ComponentType::F32,
                BufferUsage::Dynamic,
            ))
        });
        let model_matrix = alloc_rows(gpu, &MODEL_ROW_LABELS, &staging.model_rows);
        let normal_matrix = alloc_rows(gpu, &NORMAL_ROW_LABELS, &staging.normal_rows);
        let pick_colors = gpu.alloc(&BufferDesc::from_slice(
            "portion pick colors",
            BufferTarget::Attribute,
            &staging.pick_colors,
            4,
            ComponentType::U8,
            BufferUsage::Static,
        ));

        debug!(layer = index, portions = num_portions, "layer finalized");

        InstancingLayer {
            index,
            mesh,
            aabb,
            counters,
            entity_offsets,
            phase: Finalized {
                buffers: PortionBuffers {
                    colors,
                    flags,
                    flags2,
                    offsets,
                    model_matrix,
                    normal_matrix,
                    pick_colors,
                },
                states: vec![PortionState::default(); num_portions],
            },
        }
    }

    /// Releases the geometry buffers.
    pub fn destroy(self, gpu: &mut impl BufferAllocator) {
        self.destroy_mesh(gpu);
        debug!(layer = self.index, "building layer destroyed");
    }
}

impl InstancingLayer<Finalized> {
    /// Per-portion buffers, for binding.
    #[must_use]
    pub const fn buffers(&self) -> &PortionBuffers {
        &self.phase.buffers
    }

    /// Current flags of a portion.
    #[must_use]
    pub fn portion_state(&self, portion: PortionId) -> Option<PortionState> {
        self.phase.states.get(portion.index()).copied()
    }

    /// Releases the geometry and every per-portion buffer.
    pub fn destroy(self, gpu: &mut impl BufferAllocator) {
        self.destroy_mesh(gpu);
        self.phase.buffers.destroy(gpu);
        debug!(layer = self.index, "layer destroyed");
    }
}

fn whole_items(name: &str, len: usize, stride: usize) -> LayerResult<usize> {
    if len % stride == 0 {
        Ok(len / stride)
    } else {
        Err(LayerError::InvalidGeometry(format!(
            "{name} length {len} is not a multiple of {stride}"
        )))
    }
}

fn check_indices(name: &str, indices: &[u32], num_vertices: usize) -> LayerResult<()> {
    match indices.iter().find(|&&i| i as usize >= num_vertices) {
        Some(bad) => Err(LayerError::InvalidGeometry(format!(
            "{name} reference vertex {bad} of {num_vertices}"
        ))),
        None => Ok(()),
    }
}

fn local_positions<'a>(
    positions: &LayerPositions<'a>,
    lattice: &[u16],
    decode_matrix: &Mat4,
) -> Cow<'a, [f32]> {
    match *positions {
        LayerPositions::Float(p) => Cow::Borrowed(p),
        LayerPositions::Quantized { .. } => Cow::Owned(
            lattice
                .chunks_exact(3)
                .flat_map(|v| decode_position(decode_matrix, [v[0], v[1], v[2]]).to_array())
                .collect(),
        ),
    }
}

/// Widens lattice triples to `u16` x4. Vertex strides must be a multiple
/// of four bytes and there is no three-component 16-bit vertex format.
fn pad_lattice(lattice: &[u16]) -> Vec<[u16; 4]> {
    lattice
        .chunks_exact(3)
        .map(|v| [v[0], v[1], v[2], 0])
        .collect()
}

/// Widens octahedral pairs to `i8` x4 for the same stride rule.
fn pad_normals(encoded: &[i8]) -> Vec<[i8; 4]> {
    encoded
        .chunks_exact(2)
        .map(|n| [n[0], n[1], 0, 0])
        .collect()
}

fn alloc_indices(
    gpu: &mut impl BufferAllocator,
    label: &str,
    indices: &[u32],
    format: IndexFormat,
) -> BufferId {
    match format {
        // In range: the vertex ceiling for 16-bit indices is below u16::MAX.
        IndexFormat::Uint16 => {
            let narrow: Vec<u16> = indices.iter().map(|&i| i as u16).collect();
            gpu.alloc(&BufferDesc::from_slice(
                label,
                BufferTarget::Index,
                &narrow,
                1,
                ComponentType::U16,
                BufferUsage::Static,
            ))
        }
        IndexFormat::Uint32 => gpu.alloc(&BufferDesc::from_slice(
            label,
            BufferTarget::Index,
            indices,
            1,
            ComponentType::U32,
            BufferUsage::Static,
        )),
    }
}

fn alloc_rows(
    gpu: &mut impl BufferAllocator,
    labels: &[&str; 3],
    rows: &[Vec<[f32; 4]>; 3],
) -> [BufferId; 3] {
    std::array::from_fn(|i| {
        gpu.alloc(&BufferDesc::from_slice(
            labels[i],
            BufferTarget::Attribute,
            &rows[i],
            4,
            ComponentType::F32,
            BufferUsage::Static,
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::HostBuffers;
    use glam::Vec3;

    const QUAD: [f32; 12] = [
        0.0, 0.0, 0.0, //
        1.0, 0.0, 0.0, //
        1.0, 1.0, 0.0, //
        0.0, 1.0, 0.0,
    ];
    const QUAD_INDICES: [u32; 6] = [0, 1, 2, 0, 2, 3];

    fn quad_layer(host: &mut HostBuffers, config: &InstancingConfig) -> InstancingLayer<Building> {
        let geometry = LayerGeometry::new(LayerPositions::Float(&QUAD)).with_indices(&QUAD_INDICES);
        InstancingLayer::<Building>::new(0, &geometry, config, host).unwrap()
    }

    #[test]
    fn test_new_uploads_geometry() {
        let mut host = HostBuffers::new();
        let layer = quad_layer(&mut host, &InstancingConfig::default());
        let mesh = layer.mesh();
        assert_eq!(mesh.primitive, PrimitiveKind::Triangles);
        assert_eq!(mesh.num_vertices, 4);
        assert_eq!(mesh.num_indices, 6);
        // Coplanar diagonal dropped, four boundary edges kept.
        assert_eq!(mesh.num_edge_indices, 8);

        let positions = host.get(mesh.positions).unwrap();
        assert_eq!(positions.components, 4);
        assert_eq!(positions.to_vec::<[u16; 4]>()[1], [65535, 0, 0, 0]);
        let indices = host.get(mesh.indices.unwrap()).unwrap();
        assert_eq!(indices.component_type, ComponentType::U16);
        assert_eq!(indices.to_vec::<u16>(), vec![0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn test_big_indices_use_u32() {
        let mut host = HostBuffers::new();
        let config = InstancingConfig {
            big_indices: true,
            ..InstancingConfig::default()
        };
        let layer = quad_layer(&mut host, &config);
        let indices = host.get(layer.mesh().indices.unwrap()).unwrap();
        assert_eq!(indices.component_type, ComponentType::U32);
        assert_eq!(indices.to_vec::<u32>(), QUAD_INDICES.to_vec());
    }

    #[test]
    fn test_new_rejects_bad_geometry() {
        let mut host = HostBuffers::new();
        let config = InstancingConfig::default();

        let ragged = LayerGeometry::new(LayerPositions::Float(&QUAD[..10]));
        assert!(matches!(
            InstancingLayer::<Building>::new(0, &ragged, &config, &mut host),
            Err(LayerError::InvalidGeometry(_))
        ));

        let bad_index = LayerGeometry::new(LayerPositions::Float(&QUAD)).with_indices(&[0, 1, 4]);
        assert!(matches!(
            InstancingLayer::<Building>::new(0, &bad_index, &config, &mut host),
            Err(LayerError::InvalidGeometry(_))
        ));

        let empty = LayerGeometry::new(LayerPositions::Float(&[]));
        assert!(InstancingLayer::<Building>::new(0, &empty, &config, &mut host).is_err());

        assert_eq!(host.stats().allocations, 0);
    }

    #[test]
    fn test_capacity_exceeded() {
        let mut host = HostBuffers::new();
        let positions = vec![0.0f32; 3 * 65_531];
        let geometry = LayerGeometry::new(LayerPositions::Float(&positions));
        let err = InstancingLayer::<Building>::new(0, &geometry, &InstancingConfig::default(), &mut host)
            .unwrap_err();
        assert_eq!(
            err,
            LayerError::CapacityExceeded {
                vertices: 65_531,
                max: 65_530
            }
        );
    }

    #[test]
    fn test_quantized_input_is_kept() {
        let mut host = HostBuffers::new();
        let lattice = [0u16, 0, 0, 65535, 65535, 65535];
        let decode_matrix = Mat4::from_scale(Vec3::splat(2.0 / 65535.0));
        let geometry = LayerGeometry::new(LayerPositions::Quantized {
            lattice: &lattice,
            decode_matrix,
        });
        let layer =
            InstancingLayer::<Building>::new(0, &geometry, &InstancingConfig::default(), &mut host).unwrap();
        assert_eq!(layer.mesh().decode_matrix, decode_matrix);
        assert!(layer.mesh().local_aabb.max.abs_diff_eq(Vec3::splat(2.0), 1e-5));
        let buffer = host.get(layer.mesh().positions).unwrap();
        assert_eq!(
            buffer.to_vec::<[u16; 4]>(),
            vec![[0, 0, 0, 0], [65535, 65535, 65535, 0]]
        );

        // Every lattice vertex decodes through the supplied matrix.
        let decoded: Vec<Vec3> = buffer
            .to_vec::<[u16; 4]>()
            .iter()
            .map(|&[x, y, z, _]| decode_position(&layer.mesh().decode_matrix, [x, y, z]))
            .collect();
        assert!(decoded[0].abs_diff_eq(Vec3::ZERO, 1e-6));
        assert!(decoded[1].abs_diff_eq(Vec3::splat(2.0), 1e-5));
    }

    #[test]
    fn test_unknown_primitive_is_triangles() {
        let mut host = HostBuffers::new();
        let geometry = LayerGeometry::new(LayerPositions::Float(&QUAD))
            .with_primitive("quads")
            .with_indices(&QUAD_INDICES);
        let layer =
            InstancingLayer::<Building>::new(0, &geometry, &InstancingConfig::default(), &mut host).unwrap();
        assert_eq!(layer.primitive(), PrimitiveKind::Triangles);
    }

    #[test]
    fn test_lines_get_no_derived_edges() {
        let mut host = HostBuffers::new();
        let geometry = LayerGeometry::new(LayerPositions::Float(&QUAD))
            .with_primitive("lines")
            .with_indices(&[0, 1, 2, 3]);
        let layer =
            InstancingLayer::<Building>::new(0, &geometry, &InstancingConfig::default(), &mut host).unwrap();
        assert_eq!(layer.mesh().edge_indices, None);
        assert_eq!(layer.mesh().num_edge_indices, 0);
    }

    #[test]
    fn test_normals_are_encoded() {
        let mut host = HostBuffers::new();
        let normals = [0.0f32, 0.0, 1.0].repeat(4);
        let geometry =
            LayerGeometry::new(LayerPositions::Float(&QUAD)).with_normals(LayerNormals::Float(&normals));
        let layer =
            InstancingLayer::<Building>::new(0, &geometry, &InstancingConfig::default(), &mut host).unwrap();
        let buffer = host.get(layer.mesh().normals.unwrap()).unwrap();
        assert!(buffer.normalized);
        assert_eq!(buffer.components, 4);
        assert_eq!(buffer.to_vec::<i8>(), vec![0; 16]);

        let short = LayerGeometry::new(LayerPositions::Float(&QUAD))
            .with_normals(LayerNormals::OctEncoded(&[0, 0]));
        assert!(InstancingLayer::<Building>::new(0, &short, &InstancingConfig::default(), &mut host).is_err());
    }

    #[test]
    fn test_oct_encoded_normals_pass_through() {
        let mut host = HostBuffers::new();
        let encoded: [i8; 8] = [12, -34, 127, -128, 0, 5, -1, 64];
        let geometry = LayerGeometry::new(LayerPositions::Float(&QUAD))
            .with_normals(LayerNormals::OctEncoded(&encoded));
        let layer =
            InstancingLayer::<Building>::new(0, &geometry, &InstancingConfig::default(), &mut host).unwrap();
        let buffer = host.get(layer.mesh().normals.unwrap()).unwrap();
        assert_eq!(
            buffer.to_vec::<[i8; 4]>(),
            vec![[12, -34, 0, 0], [127, -128, 0, 0], [0, 5, 0, 0], [-1, 64, 0, 0]]
        );
    }

    #[test]
    fn test_create_portion_grows_aabb() {
        let mut host = HostBuffers::new();
        let mut model = PortionCounters::new();
        let mut layer = quad_layer(&mut host, &InstancingConfig::default());

        let first = layer.create_portion(&mut model, &PortionDesc::default()).unwrap();
        let second = layer
            .create_portion(
                &mut model,
                &PortionDesc {
                    mesh_matrix: Mat4::from_translation(Vec3::new(3.0, 0.0, 0.0)),
                    ..PortionDesc::default()
                },
            )
            .unwrap();

        assert_eq!(first.id, PortionId(0));
        assert_eq!(second.id, PortionId(1));
        assert_eq!(second.world_aabb.min, DVec3::new(3.0, 0.0, 0.0));
        assert_eq!(layer.aabb().min, DVec3::ZERO);
        assert_eq!(layer.aabb().max, DVec3::new(4.0, 1.0, 0.0));
        assert_eq!(layer.num_portions(), 2);
        assert_eq!(model.portions, 2);
    }

    #[test]
    fn test_full_layer_rejects_portions() {
        let mut host = HostBuffers::new();
        let mut model = PortionCounters::new();
        let mut layer = quad_layer(&mut host, &InstancingConfig::default());
        layer.counters.portions = MAX_PORTIONS;

        assert_eq!(
            layer.create_portion(&mut model, &PortionDesc::default()),
            Err(LayerError::TooManyPortions {
                layer: 0,
                max: MAX_PORTIONS
            })
        );
        assert!(layer.phase.staging.colors.is_empty());
        assert!(layer.aabb().is_collapsed());
        assert_eq!(model.portions, 0);
    }

    #[test]
    fn test_world_matrix_and_rtc_center() {
        let mut host = HostBuffers::new();
        let mut model = PortionCounters::new();
        let geometry = LayerGeometry::new(LayerPositions::Float(&QUAD))
            .with_rtc_center(DVec3::new(1.0e6, 0.0, 0.0));
        let mut layer =
            InstancingLayer::<Building>::new(0, &geometry, &InstancingConfig::default(), &mut host).unwrap();

        let portion = layer
            .create_portion(
                &mut model,
                &PortionDesc {
                    mesh_matrix: Mat4::from_scale(Vec3::splat(2.0)),
                    world_matrix: Some(DMat4::from_translation(DVec3::new(0.0, 10.0, 0.0))),
                    ..PortionDesc::default()
                },
            )
            .unwrap();
        assert_eq!(portion.world_aabb.min, DVec3::new(1.0e6, 10.0, 0.0));
        assert_eq!(portion.world_aabb.max, DVec3::new(1.0e6 + 2.0, 12.0, 0.0));
    }

    #[test]
    fn test_finalize_uploads_staging() {
        let mut host = HostBuffers::new();
        let mut model = PortionCounters::new();
        let config = InstancingConfig {
            entity_offsets_enabled: true,
            ..InstancingConfig::default()
        };
        let mut layer = quad_layer(&mut host, &config);
        layer
            .create_portion(
                &mut model,
                &PortionDesc {
                    color: [10, 20, 30],
                    opacity: 128,
                    mesh_matrix: Mat4::from_translation(Vec3::new(7.0, 8.0, 9.0)),
                    pick_color: [1, 2, 3, 4],
                    ..PortionDesc::default()
                },
            )
            .unwrap();

        let layer = layer.finalize(&mut host);
        let buffers = layer.buffers();
        assert_eq!(host.get(buffers.colors).unwrap().bytes, vec![10, 20, 30, 128]);
        assert_eq!(host.get(buffers.flags).unwrap().bytes, vec![0; 4]);
        assert!(host.get(buffers.flags2).unwrap().normalized);
        assert_eq!(host.get(buffers.pick_colors).unwrap().bytes, vec![1, 2, 3, 4]);
        assert_eq!(
            host.get(buffers.offsets.unwrap()).unwrap().to_vec::<f32>(),
            vec![0.0; 3]
        );

        let row0 = host.get(buffers.model_matrix[0]).unwrap().to_vec::<f32>();
        assert_eq!(row0, vec![1.0, 0.0, 0.0, 7.0]);
        let row2 = host.get(buffers.model_matrix[2]).unwrap().to_vec::<f32>();
        assert_eq!(row2, vec![0.0, 0.0, 1.0, 9.0]);
        assert_eq!(layer.portion_state(PortionId(0)), Some(PortionState::default()));
    }

    #[test]
    fn test_finalize_without_offsets_or_portions() {
        let mut host = HostBuffers::new();
        let layer = quad_layer(&mut host, &InstancingConfig::default()).finalize(&mut host);
        assert_eq!(layer.buffers().offsets, None);
        assert!(host.get(layer.buffers().colors).unwrap().bytes.is_empty());
    }

    #[test]
    fn test_destroy_releases_everything() {
        let mut host = HostBuffers::new();
        let mut model = PortionCounters::new();
        let mut layer = quad_layer(&mut host, &InstancingConfig::default());
        layer.create_portion(&mut model, &PortionDesc::default()).unwrap();
        let layer = layer.finalize(&mut host);
        assert!(host.live_count() > 0);
        layer.destroy(&mut host);
        assert_eq!(host.live_count(), 0);
    }
}
