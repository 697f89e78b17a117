//! Defensive structures that act on the fluid grid.
//!
//! Every tower runs its effect on a repeating timer. The effect itself is a
//! closed set of variants, each holding only its own parameters:
//!
//! - Evaporator: drains fluid in a radius
//! - Cryo Spike: freezes a radius, thaws it later, then cools down
//! - Repulsor: pushes fluid outward from the tower
//! - Siphon: drains fluid and pays for what it removed
//! - Levee Wall: blocks a short run of cells and wears down under pressure

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use siege_shared::fluid::{FluidGrid, LATERAL_NEIGHBORS};

use crate::schedule::TimerHandle;

/// Fraction of the pressure against a levee taken as damage per check.
pub const LEVEE_PRESSURE_DAMAGE: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TowerId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TowerKind {
    Evaporator,
    CryoSpike,
    Repulsor,
    Siphon,
    LeveeWall,
}

impl TowerKind {
    pub const ALL: [TowerKind; 5] = [
        TowerKind::Evaporator,
        TowerKind::CryoSpike,
        TowerKind::Repulsor,
        TowerKind::Siphon,
        TowerKind::LeveeWall,
    ];

    pub fn stats(self) -> TowerStats {
        let (effect_radius, effect_interval, build_cost, max_health) = match self {
            TowerKind::Evaporator => (500.0, 0.5, 100.0, 100.0),
            TowerKind::CryoSpike => (450.0, 1.0, 200.0, 100.0),
            TowerKind::Repulsor => (600.0, 0.5, 150.0, 100.0),
            TowerKind::Siphon => (400.0, 0.5, 75.0, 100.0),
            TowerKind::LeveeWall => (0.0, 1.0, 25.0, 500.0),
        };
        TowerStats {
            effect_radius,
            effect_interval,
            build_cost,
            max_health,
        }
    }

    pub fn default_effect(self) -> TowerEffect {
        match self {
            TowerKind::Evaporator => TowerEffect::Drain { amount: 50.0 },
            TowerKind::CryoSpike => TowerEffect::FreezeCycle {
                freeze_duration: 30.0,
                cooldown_duration: 5.0,
                phase: CryoPhase::Ready,
            },
            TowerKind::Repulsor => TowerEffect::RadialPush { strength: 200.0 },
            TowerKind::Siphon => TowerEffect::DrainConvert {
                amount: 30.0,
                conversion_ratio: 0.5,
            },
            TowerKind::LeveeWall => TowerEffect::Levee {
                length: 3,
                cells: Vec::new(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TowerStats {
    pub effect_radius: f32,
    pub effect_interval: f32,
    pub build_cost: f32,
    pub max_health: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CryoPhase {
    #[default]
    Ready,
    Freezing,
    Cooldown,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TowerEffect {
    Drain {
        amount: f32,
    },
    FreezeCycle {
        freeze_duration: f32,
        cooldown_duration: f32,
        phase: CryoPhase,
    },
    RadialPush {
        strength: f32,
    },
    DrainConvert {
        amount: f32,
        conversion_ratio: f32,
    },
    Levee {
        length: u32,
        cells: Vec<IVec2>,
    },
}

/// What a tower's effect did, for the caller to follow up on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EffectOutcome {
    Idle,
    Drained { removed: f32 },
    /// A freeze started; thaw after the given number of seconds.
    Froze { cells: usize, thaw_after: f32 },
    Pushed,
    Converted { removed: f32, currency: f32 },
    Strained { pressure: f32, destroyed: bool },
}

#[derive(Debug, Clone)]
pub struct Tower {
    pub id: TowerId,
    pub kind: TowerKind,
    pub position: Vec3,
    /// Facing on the ground plane (world X, world Z). Only levees use it.
    pub facing: Vec2,
    pub stats: TowerStats,
    health: f32,
    effect: TowerEffect,
    pub(crate) timer: Option<TimerHandle>,
    /// Pending thaw or cooldown timer of a cryo spike.
    pub(crate) phase_timer: Option<TimerHandle>,
}

impl Tower {
    pub fn new(id: TowerId, kind: TowerKind, position: Vec3, facing: Vec2) -> Self {
        let stats = kind.stats();
        Self {
            id,
            kind,
            position,
            facing: facing.try_normalize().unwrap_or(Vec2::X),
            health: stats.max_health,
            stats,
            effect: kind.default_effect(),
            timer: None,
            phase_timer: None,
        }
    }

    pub fn with_effect(mut self, effect: TowerEffect) -> Self {
        self.effect = effect;
        self
    }

    pub fn effect(&self) -> &TowerEffect {
        &self.effect
    }

    pub fn health(&self) -> f32 {
        self.health
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0.0
    }

    pub fn cryo_phase(&self) -> Option<CryoPhase> {
        match self.effect {
            TowerEffect::FreezeCycle { phase, .. } => Some(phase),
            _ => None,
        }
    }

    /// Cells a levee occupies. Empty for other towers or before placement.
    pub fn occupied_cells(&self) -> &[IVec2] {
        match &self.effect {
            TowerEffect::Levee { cells, .. } => cells,
            _ => &[],
        }
    }

    /// Applies damage. Returns true if this hit destroyed the tower.
    pub fn apply_damage(&mut self, amount: f32) -> bool {
        if amount.is_nan() || amount <= 0.0 || self.health <= 0.0 {
            return false;
        }
        self.health = (self.health - amount).max(0.0);
        self.health <= 0.0
    }

    /// Claims grid space when the tower enters the world.
    pub fn on_placed(&mut self, grid: &mut FluidGrid) {
        let cell_size = grid.cell_size();
        let position = self.position;
        let facing = self.facing;
        if let TowerEffect::Levee { length, cells } = &mut self.effect {
            cells.clear();
            let half = (*length / 2) as i32;
            for i in 0..*length as i32 {
                let along = facing * ((i - half) as f32 * cell_size);
                let world = position + Vec3::new(along.x, 0.0, along.y);
                let cell = grid.world_to_cell(world);
                if grid.is_valid_cell(cell.x, cell.y) && !cells.contains(&cell) {
                    cells.push(cell);
                }
            }
            for cell in cells.iter() {
                grid.set_blocked(cell.x, cell.y, true);
            }
        }
    }

    /// Releases grid space when the tower leaves the world.
    pub fn on_removed(&mut self, grid: &mut FluidGrid) {
        let radius = self.stats.effect_radius;
        let position = self.position;
        match &mut self.effect {
            TowerEffect::Levee { cells, .. } => {
                for cell in cells.iter() {
                    grid.set_blocked(cell.x, cell.y, false);
                }
            }
            TowerEffect::FreezeCycle { phase, .. } if *phase == CryoPhase::Freezing => {
                grid.set_frozen(position, radius, false);
                *phase = CryoPhase::Cooldown;
            }
            _ => {}
        }
    }

    /// Runs one activation of the tower's effect.
    pub fn run_effect(&mut self, grid: &mut FluidGrid) -> EffectOutcome {
        if !self.is_alive() {
            return EffectOutcome::Idle;
        }

        if let TowerEffect::Levee { cells, .. } = &self.effect {
            let pressure = levee_pressure(grid, cells);
            if pressure <= 0.0 {
                return EffectOutcome::Idle;
            }
            let destroyed = self.apply_damage(pressure * LEVEE_PRESSURE_DAMAGE);
            return EffectOutcome::Strained {
                pressure,
                destroyed,
            };
        }

        let radius = self.stats.effect_radius;
        let position = self.position;
        match &mut self.effect {
            TowerEffect::Drain { amount } => {
                let before = grid.total_volume();
                grid.remove_in_radius(position, radius, *amount);
                EffectOutcome::Drained {
                    removed: (before - grid.total_volume()).max(0.0),
                }
            }
            TowerEffect::FreezeCycle {
                freeze_duration,
                phase,
                ..
            } => {
                if *phase != CryoPhase::Ready {
                    return EffectOutcome::Idle;
                }
                *phase = CryoPhase::Freezing;
                let cells = grid.set_frozen(position, radius, true);
                EffectOutcome::Froze {
                    cells,
                    thaw_after: *freeze_duration,
                }
            }
            TowerEffect::RadialPush { strength } => {
                grid.apply_radial_force(position, radius, *strength);
                EffectOutcome::Pushed
            }
            TowerEffect::DrainConvert {
                amount,
                conversion_ratio,
            } => {
                let before = grid.total_volume();
                grid.remove_in_radius(position, radius, *amount);
                let removed = before - grid.total_volume();
                if removed > 0.0 {
                    EffectOutcome::Converted {
                        removed,
                        currency: removed * *conversion_ratio,
                    }
                } else {
                    EffectOutcome::Idle
                }
            }
            TowerEffect::Levee { .. } => EffectOutcome::Idle,
        }
    }

    /// Ends a cryo freeze. Returns the cooldown to wait before the next one.
    pub fn thaw(&mut self, grid: &mut FluidGrid) -> Option<f32> {
        let radius = self.stats.effect_radius;
        let position = self.position;
        match &mut self.effect {
            TowerEffect::FreezeCycle {
                cooldown_duration,
                phase,
                ..
            } if *phase == CryoPhase::Freezing => {
                grid.set_frozen(position, radius, false);
                *phase = CryoPhase::Cooldown;
                Some(*cooldown_duration)
            }
            _ => None,
        }
    }

    /// Ends a cryo cooldown so the next check can freeze again.
    pub fn finish_cooldown(&mut self) {
        if let TowerEffect::FreezeCycle { phase, .. } = &mut self.effect {
            if *phase == CryoPhase::Cooldown {
                *phase = CryoPhase::Ready;
            }
        }
    }
}

/// Highest fluid surface next to a levee, measured from the levee's footing.
fn levee_pressure(grid: &FluidGrid, cells: &[IVec2]) -> f32 {
    let mut max_pressure = 0.0f32;
    for cell in cells {
        let Some(own) = grid.cell(cell.x, cell.y) else {
            continue;
        };
        let footing = own.terrain_height();
        for offset in LATERAL_NEIGHBORS {
            let n = *cell + offset;
            if let Some(neighbor) = grid.cell(n.x, n.y) {
                max_pressure = max_pressure.max(neighbor.surface_height() - footing);
            }
        }
    }
    max_pressure
}
