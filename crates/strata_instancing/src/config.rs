//! Scene-wide instancing configuration.
//!
//! Loaded once at startup, usually from a TOML file:
//!
//! ```toml
//! entity_offsets_enabled = true
//! big_indices = false
//! edge_threshold_degrees = 10.0
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

/// Vertex ceiling with 16-bit indices. A few below `u16::MAX` so restart
/// values stay free.
pub const MAX_VERTS_SMALL_INDICES: usize = 65_530;

/// Vertex ceiling with 32-bit indices.
pub const MAX_VERTS_BIG_INDICES: usize = 5_000_000;

/// Default dihedral angle, in degrees, above which a shared edge is drawn.
pub const DEFAULT_EDGE_THRESHOLD_DEGREES: f32 = 10.0;

/// Width of the index buffers a layer uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexFormat {
    /// `u16` indices.
    Uint16,
    /// `u32` indices.
    Uint32,
}

/// Configuration shared by every layer of a model.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InstancingConfig {
    /// Allocate a per-portion XYZ offset buffer that `set_offset` can patch.
    pub entity_offsets_enabled: bool,
    /// Use 32-bit indices and the larger vertex ceiling.
    pub big_indices: bool,
    /// Edge threshold used when a layer does not supply its own.
    pub edge_threshold_degrees: f32,
}

impl Default for InstancingConfig {
    fn default() -> Self {
        Self {
            entity_offsets_enabled: false,
            big_indices: false,
            edge_threshold_degrees: DEFAULT_EDGE_THRESHOLD_DEGREES,
        }
    }
}

impl InstancingConfig {
    /// Parses a TOML document. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on malformed TOML or unknown keys.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    /// Reads and parses a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Parse`] if it does not parse.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Index width implied by `big_indices`.
    #[must_use]
    pub const fn index_format(&self) -> IndexFormat {
        if self.big_indices {
            IndexFormat::Uint32
        } else {
            IndexFormat::Uint16
        }
    }

    /// Most vertices one layer may hold.
    #[must_use]
    pub const fn max_vertices(&self) -> usize {
        if self.big_indices {
            MAX_VERTS_BIG_INDICES
        } else {
            MAX_VERTS_SMALL_INDICES
        }
    }
}
