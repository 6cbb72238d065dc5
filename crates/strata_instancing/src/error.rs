//! # Instancing Error Types
//!
//! Lifecycle misuse, bad indices and buffer failures. Every error leaves the
//! layer, its counters and its buffers exactly as they were before the call.

use thiserror::Error;

use crate::gpu::BufferId;

/// Errors raised by buffer allocators.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    /// The id was never allocated or has been destroyed.
    #[error("unknown buffer: {0:?}")]
    UnknownBuffer(BufferId),

    /// A sub-range update reaches past the end of the buffer.
    #[error("update out of range: {len} bytes at offset {offset} in a {size}-byte buffer")]
    OutOfRange {
        /// Byte offset of the update.
        offset: usize,
        /// Length of the update in bytes.
        len: usize,
        /// Size of the buffer in bytes.
        size: usize,
    },

    /// The backend requires 4-byte aligned copies.
    #[error("misaligned update: {len} bytes at offset {offset}")]
    Misaligned {
        /// Byte offset of the update.
        offset: usize,
        /// Length of the update in bytes.
        len: usize,
    },
}

/// Errors that can occur while building or patching a layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LayerError {
    /// A portion was appended, or finalize called, after finalize.
    #[error("layer {layer} is already finalized")]
    AlreadyFinalized {
        /// Layer index.
        layer: usize,
    },

    /// A per-portion setter was called before finalize.
    #[error("layer {layer} is not finalized")]
    NotFinalized {
        /// Layer index.
        layer: usize,
    },

    /// The layer's buffers have been released.
    #[error("layer {layer} has been destroyed")]
    LayerDestroyed {
        /// Layer index.
        layer: usize,
    },

    /// No layer with this index exists in the model.
    #[error("unknown layer: {0}")]
    UnknownLayer(usize),

    /// Portion id outside `[0, num_portions)`.
    #[error("portion {portion} out of range: layer has {num_portions} portions")]
    PortionOutOfRange {
        /// Requested portion id.
        portion: u32,
        /// Portions in the layer.
        num_portions: u32,
    },

    /// Geometry has more vertices than the index format can address.
    #[error("layer geometry has {vertices} vertices, limit is {max}")]
    CapacityExceeded {
        /// Vertices supplied.
        vertices: usize,
        /// Vertex ceiling for the configured index width.
        max: usize,
    },

    /// The layer already holds as many portions as its ids can name.
    #[error("layer {layer} is full: {max} portions")]
    TooManyPortions {
        /// Layer index.
        layer: usize,
        /// Portion ceiling.
        max: u32,
    },

    /// Malformed geometry arrays.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// A buffer update failed.
    #[error(transparent)]
    Buffer(#[from] BufferError),
}

/// Result type for layer operations.
pub type LayerResult<T> = Result<T, LayerError>;

/// Errors loading an [`InstancingConfig`](crate::InstancingConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid TOML for this schema.
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}
