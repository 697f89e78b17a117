//! The defender on foot.
//!
//! The player wades through the fluid (slower and hurt the deeper it gets)
//! and carries a heat lance that evaporates fluid around its aim point while
//! energy lasts.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use siege_shared::fluid::FluidGrid;

use crate::schedule::TimerHandle;

/// Rate the lance ticks at while firing.
pub const LANCE_TICK_RATE: f32 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DepthTier {
    #[default]
    Dry,
    Ankle,
    Knee,
    Waist,
    Chest,
}

impl DepthTier {
    pub fn from_depth(depth: f32) -> Self {
        if depth <= 0.0 {
            DepthTier::Dry
        } else if depth <= 30.0 {
            DepthTier::Ankle
        } else if depth <= 70.0 {
            DepthTier::Knee
        } else if depth <= 120.0 {
            DepthTier::Waist
        } else {
            DepthTier::Chest
        }
    }

    pub fn speed_multiplier(self) -> f32 {
        match self {
            DepthTier::Dry => 1.0,
            DepthTier::Ankle => 0.8,
            DepthTier::Knee => 0.5,
            DepthTier::Waist => 0.3,
            DepthTier::Chest => 0.15,
        }
    }

    pub fn damage_per_second(self) -> f32 {
        match self {
            DepthTier::Dry | DepthTier::Ankle => 0.0,
            DepthTier::Knee => 5.0,
            DepthTier::Waist => 15.0,
            DepthTier::Chest => 30.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerSetup {
    /// Feet position.
    pub position: Vec3,
    pub max_health: f32,
    pub depth_check_interval: f32,
    pub max_energy: f32,
    pub energy_drain_rate: f32,
    pub energy_recharge_rate: f32,
    pub lance_radius: f32,
    pub lance_evaporate_rate: f32,
    /// Where the lance is aimed from the start, if anywhere.
    pub lance_target: Option<Vec3>,
}

impl Default for PlayerSetup {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            max_health: 100.0,
            depth_check_interval: 0.1,
            max_energy: 100.0,
            energy_drain_rate: 10.0,
            energy_recharge_rate: 5.0,
            lance_radius: 150.0,
            lance_evaporate_rate: 15.0,
            lance_target: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Player {
    pub position: Vec3,
    setup: PlayerSetup,
    health: f32,
    energy: f32,
    depth: f32,
    tier: DepthTier,
    lance_target: Option<Vec3>,
    pub(crate) depth_timer: Option<TimerHandle>,
    pub(crate) lance_timer: Option<TimerHandle>,
}

impl Player {
    pub fn new(setup: PlayerSetup) -> Self {
        Self {
            position: setup.position,
            health: setup.max_health,
            energy: setup.max_energy,
            depth: 0.0,
            tier: DepthTier::Dry,
            lance_target: None,
            depth_timer: None,
            lance_timer: None,
            setup,
        }
    }

    pub fn setup(&self) -> &PlayerSetup {
        &self.setup
    }

    pub fn health(&self) -> f32 {
        self.health
    }

    pub fn energy(&self) -> f32 {
        self.energy
    }

    pub fn depth(&self) -> f32 {
        self.depth
    }

    pub fn tier(&self) -> DepthTier {
        self.tier
    }

    pub fn speed_multiplier(&self) -> f32 {
        self.tier.speed_multiplier()
    }

    pub fn is_firing(&self) -> bool {
        self.lance_target.is_some()
    }

    pub fn lance_target(&self) -> Option<Vec3> {
        self.lance_target
    }

    /// Starts or re-aims the lance. Returns true if it was not firing before.
    pub fn aim_lance(&mut self, target: Vec3) -> bool {
        self.lance_target.replace(target).is_none()
    }

    /// Stops the lance. Returns true if it was firing.
    pub fn stop_lance(&mut self) -> bool {
        self.lance_target.take().is_some()
    }

    /// Samples the fluid at the player's feet and applies its effects for
    /// one check interval.
    pub fn check_fluid_depth(&mut self, grid: &FluidGrid) -> DepthTier {
        let interval = self.setup.depth_check_interval;
        self.depth = (grid.height_at(self.position) - self.position.y).max(0.0);
        self.tier = DepthTier::from_depth(self.depth);

        let dps = self.tier.damage_per_second();
        if dps > 0.0 {
            self.health = (self.health - dps * interval).max(0.0);
        }

        if !self.is_firing() && self.energy < self.setup.max_energy {
            self.energy =
                (self.energy + self.setup.energy_recharge_rate * interval).min(self.setup.max_energy);
        }
        self.tier
    }

    /// One lance tick. Returns false once the lance has stopped firing.
    pub fn fire_lance_tick(&mut self, grid: &mut FluidGrid) -> bool {
        let Some(target) = self.lance_target else {
            return false;
        };
        if self.energy <= 0.0 {
            self.lance_target = None;
            return false;
        }

        let dt = 1.0 / LANCE_TICK_RATE;
        self.energy = (self.energy - self.setup.energy_drain_rate * dt).max(0.0);
        grid.remove_in_radius(
            target,
            self.setup.lance_radius,
            self.setup.lance_evaporate_rate * dt,
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use siege_shared::fluid::FluidConfig;

    fn grid() -> FluidGrid {
        FluidGrid::new(FluidConfig {
            grid_size: 8,
            cell_size: 10.0,
            origin: Some(Vec2::ZERO),
            ..Default::default()
        })
    }

    #[test]
    fn test_depth_tiers() {
        assert_eq!(DepthTier::from_depth(0.0), DepthTier::Dry);
        assert_eq!(DepthTier::from_depth(30.0), DepthTier::Ankle);
        assert_eq!(DepthTier::from_depth(30.5), DepthTier::Knee);
        assert_eq!(DepthTier::from_depth(120.0), DepthTier::Waist);
        assert_eq!(DepthTier::from_depth(500.0), DepthTier::Chest);
        assert_eq!(DepthTier::Chest.speed_multiplier(), 0.15);
        assert_eq!(DepthTier::Ankle.damage_per_second(), 0.0);
    }

    #[test]
    fn test_wading_hurts_and_slows() {
        let mut grid = grid();
        grid.add_volume(2, 2, 100.0);
        let mut player = Player::new(PlayerSetup {
            position: grid.cell_to_world(2, 2),
            ..Default::default()
        });

        assert_eq!(player.check_fluid_depth(&grid), DepthTier::Waist);
        assert_eq!(player.speed_multiplier(), 0.3);
        // 15 per second over 0.1 s.
        assert!((player.health() - 98.5).abs() < 1e-4);
    }

    #[test]
    fn test_lance_drains_energy_and_fluid() {
        let mut grid = grid();
        grid.add_volume(4, 4, 10.0);
        let mut player = Player::new(PlayerSetup::default());
        let target = grid.cell_to_world(4, 4);
        assert!(player.aim_lance(target));

        for _ in 0..30 {
            assert!(player.fire_lance_tick(&mut grid));
        }

        // One second of firing: 10 energy, 15 volume requested.
        assert!((player.energy() - 90.0).abs() < 1e-3);
        assert!(grid.total_volume() < 1e-3);
    }

    #[test]
    fn test_lance_stops_when_energy_is_spent() {
        let mut grid = grid();
        let mut player = Player::new(PlayerSetup {
            max_energy: 0.5,
            ..Default::default()
        });
        player.aim_lance(Vec3::ZERO);
        let mut ticks = 0;
        while player.fire_lance_tick(&mut grid) {
            ticks += 1;
            assert!(ticks < 100);
        }
        assert!(!player.is_firing());
        assert_eq!(player.energy(), 0.0);
    }

    #[test]
    fn test_energy_recharges_only_when_idle() {
        let grid = grid();
        let mut player = Player::new(PlayerSetup::default());
        player.energy = 50.0;
        player.check_fluid_depth(&grid);
        assert!((player.energy() - 50.5).abs() < 1e-4);

        player.aim_lance(Vec3::ZERO);
        player.check_fluid_depth(&grid);
        assert!((player.energy() - 50.5).abs() < 1e-4);
    }
}
