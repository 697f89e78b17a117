//! The structure the player defends.
//!
//! Fluid standing above the hall's base damages it in proportion to depth.
//! Once health reaches zero the hall is destroyed for good and the siege is
//! lost.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use siege_shared::fluid::FluidGrid;

use crate::schedule::TimerHandle;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TownHallSetup {
    pub position: Vec3,
    pub max_health: f32,
    pub damage_per_depth_per_second: f32,
    pub damage_check_interval: f32,
}

impl Default for TownHallSetup {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            max_health: 1000.0,
            damage_per_depth_per_second: 2.0,
            damage_check_interval: 0.5,
        }
    }
}

/// Outcome of one damage check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TownHallCheck {
    /// No fluid above the base, or already destroyed.
    Dry,
    Damaged { depth: f32, health: f32 },
    /// This check brought health to zero.
    Destroyed,
}

#[derive(Debug, Clone)]
pub struct TownHall {
    pub position: Vec3,
    base_height: f32,
    health: f32,
    max_health: f32,
    damage_per_depth_per_second: f32,
    check_interval: f32,
    destroyed: bool,
    pub(crate) timer: Option<TimerHandle>,
}

impl TownHall {
    pub fn new(setup: &TownHallSetup) -> Self {
        Self {
            position: setup.position,
            base_height: setup.position.y,
            health: setup.max_health,
            max_health: setup.max_health,
            damage_per_depth_per_second: setup.damage_per_depth_per_second,
            check_interval: setup.damage_check_interval,
            destroyed: false,
            timer: None,
        }
    }

    /// Rests the hall on the baked terrain under it.
    pub fn settle_on_terrain(&mut self, grid: &FluidGrid) {
        if let Some(cell) = grid.cell_at(self.position) {
            self.base_height = cell.terrain_height();
            self.position.y = self.base_height;
        }
    }

    pub fn health(&self) -> f32 {
        self.health
    }

    pub fn max_health(&self) -> f32 {
        self.max_health
    }

    pub fn base_height(&self) -> f32 {
        self.base_height
    }

    pub fn check_interval(&self) -> f32 {
        self.check_interval
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn check_fluid_damage(&mut self, grid: &FluidGrid) -> TownHallCheck {
        if self.destroyed {
            return TownHallCheck::Dry;
        }

        let depth = grid.height_at(self.position) - self.base_height;
        if depth <= 0.0 {
            return TownHallCheck::Dry;
        }

        let damage = depth * self.damage_per_depth_per_second * self.check_interval;
        self.health = (self.health - damage).max(0.0);

        if self.health <= 0.0 {
            self.destroyed = true;
            TownHallCheck::Destroyed
        } else {
            TownHallCheck::Damaged {
                depth,
                health: self.health,
            }
        }
    }
}
