//! GPU buffer backends.
//!
//! [`BufferAllocator`] is the only way layers reach GPU memory:
//!
//! - [`HostBuffers`] keeps everything in host memory (tests, headless tools)
//! - [`WgpuBuffers`] creates and patches real `wgpu` buffers

mod buffer;
mod wgpu_buffers;

pub use buffer::{
    check_elements, write_elements, BufferAllocator, BufferDesc, BufferId, BufferTarget,
    BufferUsage, ComponentType, HostBuffer, HostBufferStats, HostBuffers,
};
pub use wgpu_buffers::{vertex_format, WgpuBuffer, WgpuBuffers};
