//! Per-cell state of the fluid heightfield.
//!
//! A cell is plain data: the baked terrain height under it, the fluid resting
//! on top, and two gameplay flags. All mutation goes through
//! [`FluidGrid`](super::FluidGrid), so the setters here are crate-private.
//!
//! ## Data Model
//! - `fluid_volume` is a depth in world height units and is never negative
//! - surface height is derived as terrain + volume
//! - `blocked` cells act as infinitely tall terrain for the flow step
//! - `frozen` cells neither give nor receive flow but keep reporting volume

use bevy::math::Vec2;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FluidCell {
    terrain_height: f32,
    fluid_volume: f32,
    frozen: bool,
    blocked: bool,
    /// Advisory flow direction written by force effects. The flow step does
    /// not read it.
    flow_velocity: Vec2,
}

impl FluidCell {
    #[inline]
    pub fn terrain_height(&self) -> f32 {
        self.terrain_height
    }

    #[inline]
    pub fn fluid_volume(&self) -> f32 {
        self.fluid_volume
    }

    /// Top of the fluid column, or the bare terrain when dry.
    #[inline]
    pub fn surface_height(&self) -> f32 {
        self.terrain_height + self.fluid_volume
    }

    #[inline]
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    #[inline]
    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    #[inline]
    pub fn flow_velocity(&self) -> Vec2 {
        self.flow_velocity
    }

    /// Returns true if the cell holds more than a trace of fluid.
    #[inline]
    pub fn is_wet(&self) -> bool {
        self.fluid_volume > crate::MIN_FLUID_VOLUME
    }

    /// Returns true if the flow step may move fluid out of this cell.
    #[inline]
    pub(crate) fn can_emit(&self) -> bool {
        self.is_wet() && !self.frozen && !self.blocked
    }

    /// Returns true if the flow step may move fluid into this cell.
    #[inline]
    pub(crate) fn can_receive(&self) -> bool {
        !self.frozen && !self.blocked
    }

    pub(crate) fn set_terrain_height(&mut self, height: f32) {
        self.terrain_height = height;
    }

    /// Stores a new volume, clamping negatives to zero.
    pub(crate) fn set_fluid_volume(&mut self, volume: f32) {
        self.fluid_volume = volume.max(0.0);
    }

    pub(crate) fn set_frozen(&mut self, frozen: bool) {
        self.frozen = frozen;
    }

    pub(crate) fn set_blocked(&mut self, blocked: bool) {
        self.blocked = blocked;
    }

    pub(crate) fn add_flow_velocity(&mut self, impulse: Vec2) {
        self.flow_velocity += impulse;
    }
}
