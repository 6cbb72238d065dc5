//! Buffer allocation interface and the host-memory implementation.
//!
//! Layers never touch a graphics API directly. They describe each buffer
//! once with a [`BufferDesc`], keep the returned [`BufferId`], and patch
//! sub-ranges of it afterwards.

use bytemuck::Pod;

use crate::error::BufferError;

/// Opaque handle to a buffer owned by an allocator.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u32);

/// What a buffer is bound as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    /// Per-vertex or per-instance attribute data.
    Attribute,
    /// Element indices.
    Index,
}

/// Scalar type of each component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentType {
    /// `u8`
    U8,
    /// `i8`
    I8,
    /// `u16`
    U16,
    /// `u32`
    U32,
    /// `f32`
    F32,
}

impl ComponentType {
    /// Size of one component in bytes.
    #[must_use]
    pub const fn size(self) -> usize {
        match self {
            Self::U8 | Self::I8 => 1,
            Self::U16 => 2,
            Self::U32 | Self::F32 => 4,
        }
    }
}

/// How often the contents change after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    /// Written once.
    Static,
    /// Patched in place.
    Dynamic,
}

/// Everything an allocator needs to create a buffer.
#[derive(Debug, Clone, Copy)]
pub struct BufferDesc<'a> {
    /// Debug label.
    pub label: &'a str,
    /// Binding target.
    pub target: BufferTarget,
    /// Initial contents.
    pub data: &'a [u8],
    /// Number of items (vertices, instances or indices).
    pub item_count: usize,
    /// Components per item.
    pub components: u8,
    /// Component scalar type.
    pub component_type: ComponentType,
    /// Update frequency hint.
    pub usage: BufferUsage,
    /// Integer components are read as normalized floats.
    pub normalized: bool,
}

impl<'a> BufferDesc<'a> {
    /// Describes a buffer of `components`-wide items from a typed slice.
    #[must_use]
    pub fn from_slice<T: Pod>(
        label: &'a str,
        target: BufferTarget,
        data: &'a [T],
        components: u8,
        component_type: ComponentType,
        usage: BufferUsage,
    ) -> Self {
        let data: &[u8] = bytemuck::cast_slice(data);
        let item_size = usize::from(components) * component_type.size();
        Self {
            label,
            target,
            data,
            item_count: if item_size == 0 { 0 } else { data.len() / item_size },
            components,
            component_type,
            usage,
            normalized: false,
        }
    }

    /// Marks integer components as normalized.
    #[must_use]
    pub const fn normalized(mut self) -> Self {
        self.normalized = true;
        self
    }
}

/// A backend that owns GPU (or GPU-like) buffers.
pub trait BufferAllocator {
    /// Creates a buffer initialised with `desc.data`. Its size is fixed.
    fn alloc(&mut self, desc: &BufferDesc<'_>) -> BufferId;

    /// Checks that `update_range` would accept a write of `len` bytes at
    /// `byte_offset`, without writing.
    ///
    /// # Errors
    ///
    /// The [`BufferError`] that `update_range` would return.
    fn check_range(&self, id: BufferId, byte_offset: usize, len: usize)
        -> Result<(), BufferError>;

    /// Overwrites `data.len()` bytes starting at `byte_offset`.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError`] if the id is unknown or the range does not
    /// fit inside the buffer.
    fn update_range(&mut self, id: BufferId, byte_offset: usize, data: &[u8])
        -> Result<(), BufferError>;

    /// Releases a buffer. Unknown ids are ignored.
    fn destroy(&mut self, id: BufferId);
}

/// Checks a write of `count` elements of `T` at an element offset.
///
/// # Errors
///
/// Propagates the allocator's [`BufferError`].
pub fn check_elements<T: Pod>(
    allocator: &impl BufferAllocator,
    id: BufferId,
    element_offset: usize,
    count: usize,
) -> Result<(), BufferError> {
    let size = std::mem::size_of::<T>();
    allocator.check_range(id, element_offset * size, count * size)
}

/// Writes typed elements at an element offset.
///
/// # Errors
///
/// Propagates the allocator's [`BufferError`].
pub fn write_elements<T: Pod>(
    allocator: &mut impl BufferAllocator,
    id: BufferId,
    element_offset: usize,
    data: &[T],
) -> Result<(), BufferError> {
    allocator.update_range(
        id,
        element_offset * std::mem::size_of::<T>(),
        bytemuck::cast_slice(data),
    )
}

/// A buffer held in host memory.
#[derive(Debug, Clone)]
pub struct HostBuffer {
    /// Debug label given at allocation.
    pub label: String,
    /// Binding target.
    pub target: BufferTarget,
    /// Current contents.
    pub bytes: Vec<u8>,
    /// Number of items.
    pub item_count: usize,
    /// Components per item.
    pub components: u8,
    /// Component scalar type.
    pub component_type: ComponentType,
    /// Update frequency hint.
    pub usage: BufferUsage,
    /// Normalized integer flag.
    pub normalized: bool,
}

impl HostBuffer {
    /// Copies the contents out as typed elements. Trailing bytes that do
    /// not fill a whole element are ignored.
    #[must_use]
    pub fn to_vec<T: Pod>(&self) -> Vec<T> {
        self.bytes
            .chunks_exact(std::mem::size_of::<T>())
            .map(bytemuck::pod_read_unaligned)
            .collect()
    }
}

/// Traffic counters kept by [`HostBuffers`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostBufferStats {
    /// Buffers created.
    pub allocations: u32,
    /// Sub-range updates applied.
    pub updates: u32,
    /// Bytes written by sub-range updates.
    pub bytes_updated: usize,
    /// Buffers released.
    pub destroyed: u32,
}

/// In-memory [`BufferAllocator`] for headless use and tests.
#[derive(Debug, Default)]
pub struct HostBuffers {
    buffers: Vec<Option<HostBuffer>>,
    stats: HostBufferStats,
}

impl HostBuffers {
    /// Creates an empty allocator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a live buffer.
    #[must_use]
    pub fn get(&self, id: BufferId) -> Option<&HostBuffer> {
        self.buffers.get(id.0 as usize).and_then(Option::as_ref)
    }

    /// Number of buffers not yet destroyed.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.buffers.iter().filter(|b| b.is_some()).count()
    }

    /// Traffic counters.
    #[must_use]
    pub const fn stats(&self) -> HostBufferStats {
        self.stats
    }
}

impl BufferAllocator for HostBuffers {
    fn alloc(&mut self, desc: &BufferDesc<'_>) -> BufferId {
        let id = BufferId(self.buffers.len() as u32);
        self.buffers.push(Some(HostBuffer {
            label: desc.label.to_owned(),
            target: desc.target,
            bytes: desc.data.to_vec(),
            item_count: desc.item_count,
            components: desc.components,
            component_type: desc.component_type,
            usage: desc.usage,
            normalized: desc.normalized,
        }));
        self.stats.allocations += 1;
        id
    }

    fn check_range(&self, id: BufferId, byte_offset: usize, len: usize) -> Result<(), BufferError> {
        let size = self.get(id).ok_or(BufferError::UnknownBuffer(id))?.bytes.len();
        match byte_offset.checked_add(len) {
            Some(end) if end <= size => Ok(()),
            _ => Err(BufferError::OutOfRange {
                offset: byte_offset,
                len,
                size,
            }),
        }
    }

    fn update_range(
        &mut self,
        id: BufferId,
        byte_offset: usize,
        data: &[u8],
    ) -> Result<(), BufferError> {
        self.check_range(id, byte_offset, data.len())?;
        let Some(buffer) = self.buffers.get_mut(id.0 as usize).and_then(Option::as_mut) else {
            return Err(BufferError::UnknownBuffer(id));
        };
        let end = byte_offset + data.len();
        buffer.bytes[byte_offset..end].copy_from_slice(data);
        self.stats.updates += 1;
        self.stats.bytes_updated += data.len();
        Ok(())
    }

    fn destroy(&mut self, id: BufferId) {
        if let Some(slot) = self.buffers.get_mut(id.0 as usize) {
            if slot.take().is_some() {
                self.stats.destroyed += 1;
            }
        }
    }
}
