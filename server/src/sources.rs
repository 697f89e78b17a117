//! Stationary fluid emitters.
//!
//! A source adds a fixed amount of fluid to one cell on a repeating timer.
//! The cell is resolved once when the source is placed. Regular sources are
//! switched on by waves; basin sources stay dormant until the basin trigger.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use siege_shared::fluid::FluidGrid;

use crate::schedule::{EffectScheduler, TimerHandle};
use crate::siege::SiegeAction;

pub const DEFAULT_SPAWN_RATE: f32 = 10.0;
pub const DEFAULT_SPAWN_INTERVAL: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SourceKind {
    #[default]
    Regular,
    Basin,
}

/// Placement and tuning of one source, as read from a scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSetup {
    pub position: Vec3,
    pub kind: SourceKind,
    /// Volume added per spawn, before any wave multiplier.
    pub spawn_rate: f32,
    pub spawn_interval: f32,
    /// Start emitting as soon as the siege begins. The wave manager switches
    /// every source off when it starts, so this only matters without waves.
    pub active_on_start: bool,
}

impl Default for SourceSetup {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            kind: SourceKind::Regular,
            spawn_rate: DEFAULT_SPAWN_RATE,
            spawn_interval: DEFAULT_SPAWN_INTERVAL,
            active_on_start: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FluidSource {
    pub id: SourceId,
    pub kind: SourceKind,
    pub position: Vec3,
    cell: IVec2,
    base_spawn_rate: f32,
    spawn_rate: f32,
    spawn_interval: f32,
    timer: Option<TimerHandle>,
}

impl FluidSource {
    pub fn new(id: SourceId, setup: &SourceSetup, grid: &FluidGrid) -> Self {
        let cell = grid.world_to_cell(setup.position);
        if !grid.is_valid_cell(cell.x, cell.y) {
            warn!(
                "Fluid source {:?} at {} lies outside the grid and will not emit",
                id, setup.position
            );
        }
        Self {
            id,
            kind: setup.kind,
            position: setup.position,
            cell,
            base_spawn_rate: setup.spawn_rate.max(0.0),
            spawn_rate: setup.spawn_rate.max(0.0),
            spawn_interval: setup.spawn_interval,
            timer: None,
        }
    }

    pub fn cell(&self) -> IVec2 {
        self.cell
    }

    pub fn is_active(&self) -> bool {
        self.timer.is_some()
    }

    pub fn spawn_rate(&self) -> f32 {
        self.spawn_rate
    }

    pub fn base_spawn_rate(&self) -> f32 {
        self.base_spawn_rate
    }

    pub fn spawn_interval(&self) -> f32 {
        self.spawn_interval
    }

    /// Sets the per-spawn volume to the base rate times `multiplier`.
    /// Multipliers never stack across waves.
    pub fn apply_multiplier(&mut self, multiplier: f32) {
        self.spawn_rate = self.base_spawn_rate * multiplier.max(0.0);
    }

    /// Starts the spawn timer. Does nothing if already active.
    pub fn activate(&mut self, scheduler: &mut EffectScheduler<SiegeAction>) {
        if self.timer.is_some() {
            return;
        }
        self.timer = Some(
            scheduler.schedule_repeating(self.spawn_interval, SiegeAction::SpawnFluid(self.id)),
        );
        debug!("Fluid source {:?} activated at {} per spawn", self.id, self.spawn_rate);
    }

    pub fn deactivate(&mut self, scheduler: &mut EffectScheduler<SiegeAction>) {
        scheduler.cancel_slot(&mut self.timer);
    }

    /// Emits one batch of fluid into the cached cell.
    pub fn spawn(&self, grid: &mut FluidGrid) {
        grid.add_volume(self.cell.x, self.cell.y, self.spawn_rate);
    }
}
