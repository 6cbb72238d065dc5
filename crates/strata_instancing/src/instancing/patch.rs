//! Per-portion state patches on a finalized layer.
//!
//! Every setter checks the portion id, writes only that portion's element
//! of the affected buffer, then moves the layer and model counters by the
//! change in state.

use glam::Vec3;
use tracing::{trace, warn};

use super::counters::PortionCounters;
use super::flags::{EntityFlags, PortionState};
use super::layer::{Finalized, InstancingLayer, PortionId};
use super::render_pass::{encode_clippable, encode_pass_selectors, PassSelectors};
use crate::error::{LayerError, LayerResult};
use crate::gpu::{check_elements, write_elements, BufferAllocator};

/// Which selector buffers a state change must rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rewrite {
    Selectors,
    Clippable,
    Both,
    Nothing,
}

impl InstancingLayer<Finalized> {
    fn slot(&self, portion: PortionId) -> LayerResult<usize> {
        let num_portions = self.counters.portions;
        if portion.0 < num_portions {
            Ok(portion.index())
        } else {
            Err(LayerError::PortionOutOfRange {
                portion: portion.0,
                num_portions,
            })
        }
    }

    fn transition(
        &mut self,
        gpu: &mut impl BufferAllocator,
        model: &mut PortionCounters,
        portion: PortionId,
        rewrite: Rewrite,
        update: impl FnOnce(&mut PortionState),
    ) -> LayerResult<()> {
        let slot = self.slot(portion)?;
        let before = self.phase.states[slot];
        let mut after = before;
        update(&mut after);

        let buffers = &self.phase.buffers;
        let selectors = matches!(rewrite, Rewrite::Selectors | Rewrite::Both).then(|| {
            let encoded = encode_pass_selectors(after.flags, after.transparent);
            (buffers.flags, encoded.to_bytes())
        });
        let clippable = matches!(rewrite, Rewrite::Clippable | Rewrite::Both)
            .then(|| (buffers.flags2, encode_clippable(after.flags)));

        // Every range is checked before the first write. A rejected patch
        // changes nothing.
        for (id, _) in selectors.iter().chain(&clippable) {
            check_elements::<[u8; 4]>(&*gpu, *id, slot, 1)?;
        }
        for (id, bytes) in selectors.iter().chain(&clippable) {
            write_elements(gpu, *id, slot, &[*bytes])?;
        }

        self.phase.states[slot] = after;
        self.counters.apply(before, after);
        model.apply(before, after);
        trace!(layer = self.index, portion = portion.0, flags = after.flags.0, "portion patched");
        Ok(())
    }

    fn set_flag(
        &mut self,
        gpu: &mut impl BufferAllocator,
        model: &mut PortionCounters,
        portion: PortionId,
        flag: EntityFlags,
        on: bool,
    ) -> LayerResult<()> {
        self.transition(gpu, model, portion, Rewrite::Selectors, |state| {
            state.flags.set(flag, on);
        })
    }

    /// Sets every flag of a portion at once and writes both selector buffers.
    ///
    /// # Errors
    ///
    /// [`LayerError::PortionOutOfRange`] for an unknown portion, or a
    /// [`LayerError::Buffer`] from the allocator.
    pub fn init_flags(
        &mut self,
        gpu: &mut impl BufferAllocator,
        model: &mut PortionCounters,
        portion: PortionId,
        flags: EntityFlags,
        transparent: bool,
    ) -> LayerResult<()> {
        self.transition(gpu, model, portion, Rewrite::Both, |state| {
            *state = PortionState::new(flags, transparent);
        })
    }

    /// Shows or hides a portion.
    ///
    /// # Errors
    ///
    /// See [`Self::init_flags`].
    pub fn set_visible(
        &mut self,
        gpu: &mut impl BufferAllocator,
        model: &mut PortionCounters,
        portion: PortionId,
        visible: bool,
    ) -> LayerResult<()> {
        self.set_flag(gpu, model, portion, EntityFlags::VISIBLE, visible)
    }

    /// Highlights a portion.
    ///
    /// # Errors
    ///
    /// See [`Self::init_flags`].
    pub fn set_highlighted(
        &mut self,
        gpu: &mut impl BufferAllocator,
        model: &mut PortionCounters,
        portion: PortionId,
        highlighted: bool,
    ) -> LayerResult<()> {
        self.set_flag(gpu, model, portion, EntityFlags::HIGHLIGHTED, highlighted)
    }

    /// X-rays a portion.
    ///
    /// # Errors
    ///
    /// See [`Self::init_flags`].
    pub fn set_xrayed(
        &mut self,
        gpu: &mut impl BufferAllocator,
        model: &mut PortionCounters,
        portion: PortionId,
        xrayed: bool,
    ) -> LayerResult<()> {
        self.set_flag(gpu, model, portion, EntityFlags::XRAYED, xrayed)
    }

    /// Selects a portion.
    ///
    /// # Errors
    ///
    /// See [`Self::init_flags`].
    pub fn set_selected(
        &mut self,
        gpu: &mut impl BufferAllocator,
        model: &mut PortionCounters,
        portion: PortionId,
        selected: bool,
    ) -> LayerResult<()> {
        self.set_flag(gpu, model, portion, EntityFlags::SELECTED, selected)
    }

    /// Turns a portion's edges on or off.
    ///
    /// # Errors
    ///
    /// See [`Self::init_flags`].
    pub fn set_edges(
        &mut self,
        gpu: &mut impl BufferAllocator,
        model: &mut PortionCounters,
        portion: PortionId,
        edges: bool,
    ) -> LayerResult<()> {
        self.set_flag(gpu, model, portion, EntityFlags::EDGES, edges)
    }

    /// Culls a portion.
    ///
    /// # Errors
    ///
    /// See [`Self::init_flags`].
    pub fn set_culled(
        &mut self,
        gpu: &mut impl BufferAllocator,
        model: &mut PortionCounters,
        portion: PortionId,
        culled: bool,
    ) -> LayerResult<()> {
        self.set_flag(gpu, model, portion, EntityFlags::CULLED, culled)
    }

    /// Includes a portion in picking.
    ///
    /// # Errors
    ///
    /// See [`Self::init_flags`].
    pub fn set_pickable(
        &mut self,
        gpu: &mut impl BufferAllocator,
        model: &mut PortionCounters,
        portion: PortionId,
        pickable: bool,
    ) -> LayerResult<()> {
        self.set_flag(gpu, model, portion, EntityFlags::PICKABLE, pickable)
    }

    /// Moves a portion between the opaque and transparent passes.
    ///
    /// # Errors
    ///
    /// See [`Self::init_flags`].
    pub fn set_transparent(
        &mut self,
        gpu: &mut impl BufferAllocator,
        model: &mut PortionCounters,
        portion: PortionId,
        transparent: bool,
    ) -> LayerResult<()> {
        self.transition(gpu, model, portion, Rewrite::Selectors, |state| {
            state.transparent = transparent;
        })
    }

    /// Makes a portion subject to section planes. Writes only the
    /// clippable buffer.
    ///
    /// # Errors
    ///
    /// See [`Self::init_flags`].
    pub fn set_clippable(
        &mut self,
        gpu: &mut impl BufferAllocator,
        model: &mut PortionCounters,
        portion: PortionId,
        clippable: bool,
    ) -> LayerResult<()> {
        self.transition(gpu, model, portion, Rewrite::Clippable, |state| {
            state.flags.set(EntityFlags::CLIPPABLE, clippable);
        })
    }

    /// Records collidability. No render pass reads it, so no buffer is
    /// written.
    ///
    /// # Errors
    ///
    /// [`LayerError::PortionOutOfRange`] for an unknown portion.
    pub fn set_collidable(
        &mut self,
        gpu: &mut impl BufferAllocator,
        model: &mut PortionCounters,
        portion: PortionId,
        collidable: bool,
    ) -> LayerResult<()> {
        self.transition(gpu, model, portion, Rewrite::Nothing, |state| {
            state.flags.set(EntityFlags::COLLIDABLE, collidable);
        })
    }

    /// Overwrites a portion's RGBA color.
    ///
    /// # Errors
    ///
    /// See [`Self::init_flags`].
    pub fn set_color(
        &mut self,
        gpu: &mut impl BufferAllocator,
        portion: PortionId,
        rgba: [u8; 4],
    ) -> LayerResult<()> {
        let slot = self.slot(portion)?;
        write_elements(gpu, self.phase.buffers.colors, slot, &[rgba])?;
        Ok(())
    }

    /// Overwrites a portion's offset.
    ///
    /// Without entity offsets configured this only logs a warning.
    ///
    /// # Errors
    ///
    /// See [`Self::init_flags`].
    pub fn set_offset(
        &mut self,
        gpu: &mut impl BufferAllocator,
        portion: PortionId,
        offset: Vec3,
    ) -> LayerResult<()> {
        let slot = self.slot(portion)?;
        let Some(offsets) = self.phase.buffers.offsets else {
            warn!(
                layer = self.index,
                portion = portion.0,
                "entity offsets are disabled; set_offset ignored"
            );
            return Ok(());
        };
        write_elements(gpu, offsets, slot, &[offset.to_array()])?;
        Ok(())
    }

    /// Selectors currently uploaded for a portion.
    #[must_use]
    pub fn selectors(&self, portion: PortionId) -> Option<PassSelectors> {
        self.portion_state(portion)
            .map(|state| encode_pass_selectors(state.flags, state.transparent))
    }
}
