//! [`BufferAllocator`] backed by `wgpu`.
//!
//! Buffers are created initialised through `DeviceExt::create_buffer_init`
//! and patched through `Queue::write_buffer`, which stages the bytes and
//! copies them before the next submission.

use std::sync::Arc;

use wgpu::util::DeviceExt;

use super::buffer::{BufferAllocator, BufferDesc, BufferId, BufferTarget, ComponentType};
use crate::error::BufferError;

/// A live `wgpu` buffer plus how it should be bound.
#[derive(Debug)]
pub struct WgpuBuffer {
    /// The GPU buffer.
    pub buffer: wgpu::Buffer,
    /// Vertex attribute format, if the layout has a `wgpu` equivalent.
    pub vertex_format: Option<wgpu::VertexFormat>,
    /// Index format for index buffers.
    pub index_format: Option<wgpu::IndexFormat>,
}

impl WgpuBuffer {
    /// Vertex stride for a buffer holding one attribute.
    #[must_use]
    pub fn array_stride(&self) -> Option<wgpu::BufferAddress> {
        self.vertex_format.map(|format| format.size())
    }
}

/// Allocator that owns `wgpu` buffers.
#[derive(Debug)]
pub struct WgpuBuffers {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    buffers: Vec<Option<WgpuBuffer>>,
}

impl WgpuBuffers {
    /// Creates an allocator for one device.
    #[must_use]
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        Self {
            device,
            queue,
            buffers: Vec::new(),
        }
    }

    /// Returns a live buffer for binding.
    #[must_use]
    pub fn get(&self, id: BufferId) -> Option<&WgpuBuffer> {
        self.buffers.get(id.0 as usize).and_then(Option::as_ref)
    }
}

impl BufferAllocator for WgpuBuffers {
    fn alloc(&mut self, desc: &BufferDesc<'_>) -> BufferId {
        let usage = match desc.target {
            BufferTarget::Attribute => wgpu::BufferUsages::VERTEX,
            BufferTarget::Index => wgpu::BufferUsages::INDEX,
        } | wgpu::BufferUsages::COPY_DST;

        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(desc.label),
                contents: desc.data,
                usage,
            });

        let (vertex_format, index_format) = match desc.target {
            BufferTarget::Attribute => (
                vertex_format(desc.component_type, desc.components, desc.normalized),
                None,
            ),
            BufferTarget::Index => (None, index_format(desc.component_type)),
        };

        let id = BufferId(self.buffers.len() as u32);
        self.buffers.push(Some(WgpuBuffer {
            buffer,
            vertex_format,
            index_format,
        }));
        id
    }

    fn check_range(&self, id: BufferId, byte_offset: usize, len: usize) -> Result<(), BufferError> {
        let entry = self.get(id).ok_or(BufferError::UnknownBuffer(id))?;

        let size = entry.buffer.size() as usize;
        let in_bounds = byte_offset.checked_add(len).is_some_and(|end| end <= size);
        if !in_bounds {
            return Err(BufferError::OutOfRange {
                offset: byte_offset,
                len,
                size,
            });
        }

        let align = wgpu::COPY_BUFFER_ALIGNMENT as usize;
        if byte_offset % align != 0 || len % align != 0 {
            return Err(BufferError::Misaligned {
                offset: byte_offset,
                len,
            });
        }
        Ok(())
    }

    fn update_range(
        &mut self,
        id: BufferId,
        byte_offset: usize,
        data: &[u8],
    ) -> Result<(), BufferError> {
        self.check_range(id, byte_offset, data.len())?;
        let entry = self.get(id).ok_or(BufferError::UnknownBuffer(id))?;
        self.queue
            .write_buffer(&entry.buffer, byte_offset as wgpu::BufferAddress, data);
        Ok(())
    }

    fn destroy(&mut self, id: BufferId) {
        if let Some(entry) = self.buffers.get_mut(id.0 as usize).and_then(Option::take) {
            entry.buffer.destroy();
        }
    }
}

/// Maps a component layout to a `wgpu` vertex format.
///
/// Returns `None` for layouts `wgpu` cannot express as a vertex attribute,
/// such as three 16-bit components. Layers widen such data to four.
#[must_use]
pub fn vertex_format(
    component_type: ComponentType,
    components: u8,
    normalized: bool,
) -> Option<wgpu::VertexFormat> {
    use wgpu::VertexFormat as F;

    let format = match (component_type, components, normalized) {
        (ComponentType::U8, 2, false) => F::Uint8x2,
        (ComponentType::U8, 4, false) => F::Uint8x4,
        (ComponentType::U8, 2, true) => F::Unorm8x2,
        (ComponentType::U8, 4, true) => F::Unorm8x4,
        (ComponentType::I8, 2, false) => F::Sint8x2,
        (ComponentType::I8, 4, false) => F::Sint8x4,
        (ComponentType::I8, 2, true) => F::Snorm8x2,
        (ComponentType::I8, 4, true) => F::Snorm8x4,
        (ComponentType::U16, 2, false) => F::Uint16x2,
        (ComponentType::U16, 4, false) => F::Uint16x4,
        (ComponentType::U16, 2, true) => F::Unorm16x2,
        (ComponentType::U16, 4, true) => F::Unorm16x4,
        (ComponentType::U32, 1, _) => F::Uint32,
        (ComponentType::U32, 2, _) => F::Uint32x2,
        (ComponentType::U32, 3, _) => F::Uint32x3,
        (ComponentType::U32, 4, _) => F::Uint32x4,
        (ComponentType::F32, 1, _) => F::Float32,
        (ComponentType::F32, 2, _) => F::Float32x2,
        (ComponentType::F32, 3, _) => F::Float32x3,
        (ComponentType::F32, 4, _) => F::Float32x4,
        _ => return None,
    };
    Some(format)
}

fn index_format(component_type: ComponentType) -> Option<wgpu::IndexFormat> {
    match component_type {
        ComponentType::U16 => Some(wgpu::IndexFormat::Uint16),
        ComponentType::U32 => Some(wgpu::IndexFormat::Uint32),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_attribute_formats() {
        assert_eq!(
            vertex_format(ComponentType::U8, 4, false),
            Some(wgpu::VertexFormat::Uint8x4)
        );
        assert_eq!(
            vertex_format(ComponentType::U8, 4, true),
            Some(wgpu::VertexFormat::Unorm8x4)
        );
        assert_eq!(
            vertex_format(ComponentType::F32, 4, false),
            Some(wgpu::VertexFormat::Float32x4)
        );
    }

    #[test]
    fn test_mesh_attribute_formats() {
        assert_eq!(
            vertex_format(ComponentType::U16, 4, false),
            Some(wgpu::VertexFormat::Uint16x4)
        );
        assert_eq!(
            vertex_format(ComponentType::I8, 4, true),
            Some(wgpu::VertexFormat::Snorm8x4)
        );
        assert_eq!(vertex_format(ComponentType::U16, 3, false), None);
    }

    #[test]
    fn test_index_formats() {
        assert_eq!(index_format(ComponentType::U16), Some(wgpu::IndexFormat::Uint16));
        assert_eq!(index_format(ComponentType::U32), Some(wgpu::IndexFormat::Uint32));
        assert_eq!(index_format(ComponentType::F32), None);
    }
}
