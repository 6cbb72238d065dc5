//! # Instanced Model
//!
//! Owns a list of layers addressed by index and the model-scope counters.
//! Lifecycle misuse that the typed layer API rules out at compile time is
//! reported here as [`LayerError`].

use std::mem;

use glam::Vec3;
use tracing::{debug, info};

use super::counters::PortionCounters;
use super::flags::EntityFlags;
use super::layer::{
    Building, Finalized, InstancingLayer, LayerGeometry, NewPortion, PortionDesc, PortionId,
};
use crate::bounds::DAabb;
use crate::config::InstancingConfig;
use crate::error::{LayerError, LayerResult};
use crate::gpu::BufferAllocator;

/// A layer slot in its current phase.
#[derive(Debug)]
pub enum LayerSlot {
    /// Accepting portions.
    Building(InstancingLayer<Building>),
    /// Uploaded and patchable.
    Finalized(InstancingLayer<Finalized>),
    /// Buffers released. The index is not reused.
    Destroyed,
}

/// A set of instancing layers sharing one configuration.
#[derive(Debug)]
pub struct InstancedModel {
    config: InstancingConfig,
    layers: Vec<LayerSlot>,
    counters: PortionCounters,
}

impl InstancedModel {
    /// Creates an empty model.
    #[must_use]
    pub fn new(config: InstancingConfig) -> Self {
        Self {
            config,
            layers: Vec::new(),
            counters: PortionCounters::new(),
        }
    }

    /// Shared configuration.
    #[must_use]
    pub const fn config(&self) -> &InstancingConfig {
        &self.config
    }

    /// Model-scope counters, the sum of every live layer's counters.
    #[must_use]
    pub const fn counters(&self) -> &PortionCounters {
        &self.counters
    }

    /// Number of layer slots, including destroyed ones.
    #[must_use]
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    /// A layer slot.
    #[must_use]
    pub fn layer(&self, layer: usize) -> Option<&LayerSlot> {
        self.layers.get(layer)
    }

    /// A finalized layer, for drawing.
    ///
    /// # Errors
    ///
    /// Returns the lifecycle error if the layer is not finalized.
    pub fn finalized_layer(&self, layer: usize) -> LayerResult<&InstancingLayer<Finalized>> {
        match self.layers.get(layer) {
            Some(LayerSlot::Finalized(l)) => Ok(l),
            Some(LayerSlot::Building(_)) => Err(LayerError::NotFinalized { layer }),
            Some(LayerSlot::Destroyed) => Err(LayerError::LayerDestroyed { layer }),
            None => Err(LayerError::UnknownLayer(layer)),
        }
    }

    /// Every finalized layer.
    pub fn finalized_layers(&self) -> impl Iterator<Item = &InstancingLayer<Finalized>> {
        self.layers.iter().filter_map(|slot| match slot {
            LayerSlot::Finalized(l) => Some(l),
            _ => None,
        })
    }

    /// Union of every live layer's world bounds.
    #[must_use]
    pub fn aabb(&self) -> DAabb {
        let mut aabb = DAabb::collapsed();
        for slot in &self.layers {
            match slot {
                LayerSlot::Building(l) => aabb.expand(l.aabb()),
                LayerSlot::Finalized(l) => aabb.expand(l.aabb()),
                LayerSlot::Destroyed => {}
            }
        }
        aabb
    }

    /// Uploads a geometry as a new layer and returns its index.
    ///
    /// # Errors
    ///
    /// See [`InstancingLayer::new`]. No slot is taken on error.
    pub fn create_layer(
        &mut self,
        gpu: &mut impl BufferAllocator,
        geometry: &LayerGeometry<'_>,
    ) -> LayerResult<usize> {
        let index = self.layers.len();
        let layer = InstancingLayer::<Building>::new(index, geometry, &self.config, gpu)?;
        self.layers.push(LayerSlot::Building(layer));
        Ok(index)
    }

    /// Appends a portion to a building layer.
    ///
    /// # Errors
    ///
    /// [`LayerError::AlreadyFinalized`] once the layer is finalized,
    /// [`LayerError::TooManyPortions`] when it is full, plus the usual
    /// unknown or destroyed layer errors.
    pub fn create_portion(&mut self, layer: usize, desc: &PortionDesc) -> LayerResult<NewPortion> {
        match self.layers.get_mut(layer) {
            Some(LayerSlot::Building(l)) => l.create_portion(&mut self.counters, desc),
            Some(LayerSlot::Finalized(_)) => Err(LayerError::AlreadyFinalized { layer }),
            Some(LayerSlot::Destroyed) => Err(LayerError::LayerDestroyed { layer }),
            None => Err(LayerError::UnknownLayer(layer)),
        }
    }

    /// Finalizes one layer.
    ///
    /// # Errors
    ///
    /// [`LayerError::AlreadyFinalized`] if called twice.
    pub fn finalize_layer(&mut self, gpu: &mut impl BufferAllocator, layer: usize) -> LayerResult<()> {
        let slot = self
            .layers
            .get_mut(layer)
            .ok_or(LayerError::UnknownLayer(layer))?;
        match mem::replace(slot, LayerSlot::Destroyed) {
            LayerSlot::Building(l) => {
                *slot = LayerSlot::Finalized(l.finalize(gpu));
                Ok(())
            }
            LayerSlot::Finalized(l) => {
                *slot = LayerSlot::Finalized(l);
                Err(LayerError::AlreadyFinalized { layer })
            }
            LayerSlot::Destroyed => Err(LayerError::LayerDestroyed { layer }),
        }
    }

    /// Finalizes every building layer. Returns how many were finalized.
    pub fn finalize(&mut self, gpu: &mut impl BufferAllocator) -> usize {
        let mut finalized = 0;
        for slot in &mut self.layers {
            if !matches!(slot, LayerSlot::Building(_)) {
                continue;
            }
            if let LayerSlot::Building(l) = mem::replace(slot, LayerSlot::Destroyed) {
                *slot = LayerSlot::Finalized(l.finalize(gpu));
                finalized += 1;
            }
        }
        info!(
            layers = finalized,
            portions = self.counters.portions,
            "instanced model finalized"
        );
        finalized
    }

    /// Releases one layer's buffers and removes its counts from the model.
    ///
    /// # Errors
    ///
    /// Unknown or already destroyed layers.
    pub fn destroy_layer(&mut self, gpu: &mut impl BufferAllocator, layer: usize) -> LayerResult<()> {
        let slot = self
            .layers
            .get_mut(layer)
            .ok_or(LayerError::UnknownLayer(layer))?;
        match mem::replace(slot, LayerSlot::Destroyed) {
            LayerSlot::Building(l) => {
                self.counters.subtract(l.counters());
                l.destroy(gpu);
            }
            LayerSlot::Finalized(l) => {
                self.counters.subtract(l.counters());
                l.destroy(gpu);
            }
            LayerSlot::Destroyed => return Err(LayerError::LayerDestroyed { layer }),
        }
        Ok(())
    }

    /// Releases every layer.
    pub fn destroy(mut self, gpu: &mut impl BufferAllocator) {
        for layer in 0..self.layers.len() {
            // Already destroyed slots are the only possible error.
            let _ = self.destroy_layer(gpu, layer);
        }
        debug!("instanced model destroyed");
    }

    fn with_finalized<T>(
        &mut self,
        layer: usize,
        patch: impl FnOnce(&mut InstancingLayer<Finalized>, &mut PortionCounters) -> LayerResult<T>,
    ) -> LayerResult<T> {
        match self.layers.get_mut(layer) {
            Some(LayerSlot::Finalized(l)) => patch(l, &mut self.counters),
            Some(LayerSlot::Building(_)) => Err(LayerError::NotFinalized { layer }),
            Some(LayerSlot::Destroyed) => Err(LayerError::LayerDestroyed { layer }),
            None => Err(LayerError::UnknownLayer(layer)),
        }
    }

    /// See [`InstancingLayer::init_flags`].
    ///
    /// # Errors
    ///
    /// [`LayerError::NotFinalized`] before finalize, or the layer's error.
    pub fn init_flags(
        &mut self,
        gpu: &mut impl BufferAllocator,
        layer: usize,
        portion: PortionId,
        flags: EntityFlags,
        transparent: bool,
    ) -> LayerResult<()> {
        self.with_finalized(layer, |l, model| {
            l.init_flags(gpu, model, portion, flags, transparent)
        })
    }

    /// See [`InstancingLayer::set_visible`].
    ///
    /// # Errors
    ///
    /// [`LayerError::NotFinalized`] before finalize, or the layer's error.
    pub fn set_visible(
        &mut self,
        gpu: &mut impl BufferAllocator,
        layer: usize,
        portion: PortionId,
        visible: bool,
    ) -> LayerResult<()> {
        self.with_finalized(layer, |l, model| l.set_visible(gpu, model, portion, visible))
    }

    /// See [`InstancingLayer::set_highlighted`].
    ///
    /// # Errors
    ///
    /// [`LayerError::NotFinalized`] before finalize, or the layer's error.
    pub fn set_highlighted(
        &mut self,
        gpu: &mut impl BufferAllocator,
        layer: usize,
        portion: PortionId,
        highlighted: bool,
    ) -> LayerResult<()> {
        self.with_finalized(layer, |l, model| {
            l.set_highlighted(gpu, model, portion, highlighted)
        })
    }

    /// See [`InstancingLayer::set_xrayed`].
    ///
    /// # Errors
    ///
    /// [`LayerError::NotFinalized`] before finalize, or the layer's error.
    pub fn set_xrayed(
        &mut self,
        gpu: &mut impl BufferAllocator,
        layer: usize,
        portion: PortionId,
        xrayed: bool,
    ) -> LayerResult<()> {
        self.with_finalized(layer, |l, model| l.set_xrayed(gpu, model, portion, xrayed))
    }

    /// See [`InstancingLayer::set_selected`].
    ///
    /// # Errors
    ///
    /// [`LayerError::NotFinalized`] before finalize, or the layer's error.
    pub fn set_selected(
        &mut self,
        gpu: &mut impl BufferAllocator,
        layer: usize,
        portion: PortionId,
        selected: bool,
    ) -> LayerResult<()> {
        self.with_finalized(layer, |l, model| l.set_selected(gpu, model, portion, selected))
    }

    /// See [`InstancingLayer::set_edges`].
    ///
    /// # Errors
    ///
    /// [`LayerError::NotFinalized`] before finalize, or the layer's error.
    pub fn set_edges(
        &mut self,
        gpu: &mut impl BufferAllocator,
        layer: usize,
        portion: PortionId,
        edges: bool,
    ) -> LayerResult<()> {
        self.with_finalized(layer, |l, model| l.set_edges(gpu, model, portion, edges))
    }

    /// See [`InstancingLayer::set_culled`].
    ///
    /// # Errors
    ///
    /// [`LayerError::NotFinalized`] before finalize, or the layer's error.
    pub fn set_culled(
        &mut self,
        gpu: &mut impl BufferAllocator,
        layer: usize,
        portion: PortionId,
        culled: bool,
    ) -> LayerResult<()> {
        self.with_finalized(layer, |l, model| l.set_culled(gpu, model, portion, culled))
    }

    /// See [`InstancingLayer::set_pickable`].
    ///
    /// # Errors
    ///
    /// [`LayerError::NotFinalized`] before finalize, or the layer's error.
    pub fn set_pickable(
        &mut self,
        gpu: &mut impl BufferAllocator,
        layer: usize,
        portion: PortionId,
        pickable: bool,
    ) -> LayerResult<()> {
        self.with_finalized(layer, |l, model| l.set_pickable(gpu, model, portion, pickable))
    }

    /// See [`InstancingLayer::set_clippable`].
    ///
    /// # Errors
    ///
    /// [`LayerError::NotFinalized`] before finalize, or the layer's error.
    pub fn set_clippable(
        &mut self,
        gpu: &mut impl BufferAllocator,
        layer: usize,
        portion: PortionId,
        clippable: bool,
    ) -> LayerResult<()> {
        self.with_finalized(layer, |l, model| {
            l.set_clippable(gpu, model, portion, clippable)
        })
    }

    /// See [`InstancingLayer::set_collidable`].
    ///
    /// # Errors
    ///
    /// [`LayerError::NotFinalized`] before finalize, or the layer's error.
    pub fn set_collidable(
        &mut self,
        gpu: &mut impl BufferAllocator,
        layer: usize,
        portion: PortionId,
        collidable: bool,
    ) -> LayerResult<()> {
        self.with_finalized(layer, |l, model| {
            l.set_collidable(gpu, model, portion, collidable)
        })
    }

    /// See [`InstancingLayer::set_transparent`].
    ///
    /// # Errors
    ///
    /// [`LayerError::NotFinalized`] before finalize, or the layer's error.
    pub fn set_transparent(
        &mut self,
        gpu: &mut impl BufferAllocator,
        layer: usize,
        portion: PortionId,
        transparent: bool,
    ) -> LayerResult<()> {
        self.with_finalized(layer, |l, model| {
            l.set_transparent(gpu, model, portion, transparent)
        })
    }

    /// See [`InstancingLayer::set_color`].
    ///
    /// # Errors
    ///
    /// [`LayerError::NotFinalized`] before finalize, or the layer's error.
    pub fn set_color(
        &mut self,
        gpu: &mut impl BufferAllocator,
        layer: usize,
        portion: PortionId,
        rgba: [u8; 4],
    ) -> LayerResult<()> {
        self.with_finalized(layer, |l, _| l.set_color(gpu, portion, rgba))
    }

    /// See [`InstancingLayer::set_offset`].
    ///
    /// # Errors
    ///
    /// [`LayerError::NotFinalized`] before finalize, or the layer's error.
    pub fn set_offset(
        &mut self,
        gpu: &mut impl BufferAllocator,
        layer: usize,
        portion: PortionId,
        offset: Vec3,
    ) -> LayerResult<()> {
        self.with_finalized(layer, |l, _| l.set_offset(gpu, portion, offset))
    }
}

impl Default for InstancedModel {
    fn default() -> Self {
        Self::new(InstancingConfig::default())
    }
}
