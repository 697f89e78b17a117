//! The siege: every gameplay actor that touches the fluid grid.
//!
//! `SiegeWorld` owns sources, towers, the town hall, the player, the wave
//! manager, the currency ledger and the timer scheduler that drives them.
//! Each fixed tick the scheduler is advanced and every due action is
//! dispatched against the grid, strictly before the flow step runs.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use siege_shared::fluid::FluidGrid;

use crate::economy::{ResourceLedger, DEFAULT_STARTING_CURRENCY};
use crate::placement::{validate_placement, PlacementError, PlacementRules};
use crate::player::{DepthTier, Player, PlayerSetup, LANCE_TICK_RATE};
use crate::schedule::EffectScheduler;
use crate::sources::{FluidSource, SourceId, SourceSetup};
use crate::town_hall::{TownHall, TownHallCheck, TownHallSetup};
use crate::towers::{EffectOutcome, Tower, TowerId, TowerKind};
use crate::waves::{WaveManager, WaveSettings, WaveState};

/// Everything the scheduler can fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiegeAction {
    SpawnFluid(SourceId),
    TowerEffect(TowerId),
    CryoThaw(TowerId),
    CryoCooldownDone(TowerId),
    TownHallCheck,
    PlayerDepthCheck,
    LanceTick,
    BuildPhaseElapsed,
    WaveElapsed,
    BasinCheck,
}

/// Outbound notices for HUDs and logs.
#[derive(Debug, Clone, PartialEq)]
pub enum SiegeNotification {
    WaveStateChanged(WaveState),
    WaveNumberChanged { current: usize, total: usize },
    BasinTriggered { total_volume: f32 },
    TownHallDamaged { health: f32, max_health: f32 },
    TownDestroyed,
    CurrencyChanged(f32),
    TowerBuilt { id: TowerId, kind: TowerKind, position: Vec3 },
    TowerDestroyed { id: TowerId, kind: TowerKind },
    PlayerDepthChanged(DepthTier),
}

/// A tower present when the siege starts. Prebuilt towers are free.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TowerSetup {
    pub kind: TowerKind,
    pub position: Vec3,
    #[serde(default = "default_facing")]
    pub facing: Vec2,
}

fn default_facing() -> Vec2 {
    Vec2::X
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiegeSetup {
    pub starting_currency: f32,
    pub sources: Vec<SourceSetup>,
    pub towers: Vec<TowerSetup>,
    pub town_hall: Option<TownHallSetup>,
    pub player: Option<PlayerSetup>,
    pub waves: WaveSettings,
    pub placement: PlacementRules,
    /// Drive sources from waves. When false, sources follow their own
    /// `active_on_start` flag and the siege never ends on its own.
    pub waves_enabled: bool,
}

impl Default for SiegeSetup {
    fn default() -> Self {
        Self {
            starting_currency: DEFAULT_STARTING_CURRENCY,
            sources: Vec::new(),
            towers: Vec::new(),
            town_hall: Some(TownHallSetup::default()),
            player: None,
            waves: WaveSettings::default(),
            placement: PlacementRules::default(),
            waves_enabled: true,
        }
    }
}

#[derive(Resource, Debug)]
pub struct SiegeWorld {
    setup: SiegeSetup,
    scheduler: EffectScheduler<SiegeAction>,
    sources: Vec<FluidSource>,
    towers: Vec<Tower>,
    town_hall: Option<TownHall>,
    player: Option<Player>,
    waves: WaveManager,
    ledger: ResourceLedger,
    next_tower_id: u32,
    notifications: Vec<SiegeNotification>,
    started: bool,
}

impl SiegeWorld {
    pub fn new(setup: SiegeSetup) -> Self {
        Self {
            scheduler: EffectScheduler::new(),
            sources: Vec::new(),
            towers: Vec::new(),
            town_hall: None,
            player: None,
            waves: WaveManager::new(setup.waves.clone()),
            ledger: ResourceLedger::new(setup.starting_currency),
            next_tower_id: 0,
            notifications: Vec::new(),
            started: false,
            setup,
        }
    }

    /// Places every actor and starts their timers. Call once, after the
    /// terrain has been baked.
    pub fn begin(&mut self, grid: &mut FluidGrid) {
        if self.started {
            warn!("Siege already started, ignoring begin");
            return;
        }
        self.started = true;

        self.sources = self
            .setup
            .sources
            .iter()
            .enumerate()
            .map(|(i, setup)| FluidSource::new(SourceId(i as u32), setup, &*grid))
            .collect();

        if let Some(setup) = &self.setup.town_hall {
            let mut hall = TownHall::new(setup);
            hall.settle_on_terrain(grid);
            hall.timer = Some(
                self.scheduler
                    .schedule_repeating(hall.check_interval(), SiegeAction::TownHallCheck),
            );
            self.town_hall = Some(hall);
        }

        if let Some(setup) = self.setup.player.clone() {
            let interval = setup.depth_check_interval;
            let lance_target = setup.lance_target;
            let mut player = Player::new(setup);
            if let Some(cell) = grid.cell_at(player.position) {
                player.position.y = cell.terrain_height();
            }
            player.depth_timer = Some(
                self.scheduler
                    .schedule_repeating(interval, SiegeAction::PlayerDepthCheck),
            );
            self.player = Some(player);
            if let Some(target) = lance_target {
                self.aim_lance(target);
            }
        }

        let prebuilt = self.setup.towers.clone();
        for tower in prebuilt {
            let coords = grid.world_to_cell(tower.position);
            if !grid.is_valid_cell(coords.x, coords.y) {
                warn!(
                    "Skipping prebuilt {:?} at {}: outside the grid",
                    tower.kind, tower.position
                );
                continue;
            }
            let center = grid.cell_to_world(coords.x, coords.y);
            let terrain = grid
                .cell(coords.x, coords.y)
                .map_or(0.0, |c| c.terrain_height());
            self.spawn_tower(
                tower.kind,
                Vec3::new(center.x, terrain, center.z),
                tower.facing,
                grid,
            );
        }

        if self.setup.waves_enabled {
            self.waves
                .begin(&mut self.scheduler, &mut self.sources, &mut self.notifications);
        } else {
            let autostart: Vec<bool> = self
                .setup
                .sources
                .iter()
                .map(|s| s.active_on_start)
                .collect();
            for (source, active) in self.sources.iter_mut().zip(autostart) {
                if active {
                    source.activate(&mut self.scheduler);
                }
            }
        }

        info!(
            "Siege started: {} sources, {} towers, currency {:.0}",
            self.sources.len(),
            self.towers.len(),
            self.ledger.currency()
        );
    }

    /// Advances logical time and applies every effect that falls due.
    pub fn advance(&mut self, dt: f32, grid: &mut FluidGrid) {
        if !self.started {
            return;
        }
        self.scheduler.advance(dt);
        while let Some((_, action)) = self.scheduler.next_due() {
            self.dispatch(action, grid);
        }
    }

    fn dispatch(&mut self, action: SiegeAction, grid: &mut FluidGrid) {
        match action {
            SiegeAction::SpawnFluid(id) => {
                if let Some(source) = self.sources.iter().find(|s| s.id == id) {
                    source.spawn(grid);
                }
            }
            SiegeAction::TowerEffect(id) => self.run_tower(id, grid),
            SiegeAction::CryoThaw(id) => {
                if let Some(tower) = self.towers.iter_mut().find(|t| t.id == id) {
                    tower.phase_timer = None;
                    if let Some(cooldown) = tower.thaw(grid) {
                        tower.phase_timer = Some(
                            self.scheduler
                                .schedule_once(cooldown, SiegeAction::CryoCooldownDone(id)),
                        );
                    }
                }
            }
            SiegeAction::CryoCooldownDone(id) => {
                if let Some(tower) = self.towers.iter_mut().find(|t| t.id == id) {
                    tower.phase_timer = None;
                    tower.finish_cooldown();
                }
            }
            SiegeAction::TownHallCheck => self.check_town_hall(grid),
            SiegeAction::PlayerDepthCheck => {
                if let Some(player) = self.player.as_mut() {
                    let before = player.tier();
                    let tier = player.check_fluid_depth(grid);
                    if tier != before {
                        self.notifications
                            .push(SiegeNotification::PlayerDepthChanged(tier));
                    }
                }
            }
            SiegeAction::LanceTick => {
                if let Some(player) = self.player.as_mut() {
                    if !player.fire_lance_tick(grid) {
                        self.scheduler.cancel_slot(&mut player.lance_timer);
                        debug!("Heat lance stopped with {:.1} energy", player.energy());
                    }
                }
            }
            SiegeAction::BuildPhaseElapsed => {
                self.waves
                    .start_next_wave(&mut self.scheduler, &mut self.sources, &mut self.notifications)
            }
            SiegeAction::WaveElapsed => {
                self.waves
                    .on_wave_elapsed(&mut self.scheduler, &mut self.sources, &mut self.notifications)
            }
            SiegeAction::BasinCheck => {
                let total = grid.total_volume();
                self.waves.check_basin(
                    total,
                    &mut self.scheduler,
                    &mut self.sources,
                    &mut self.notifications,
                );
            }
        }
    }

    fn run_tower(&mut self, id: TowerId, grid: &mut FluidGrid) {
        let Some(index) = self.towers.iter().position(|t| t.id == id) else {
            return;
        };

        match self.towers[index].run_effect(grid) {
            EffectOutcome::Froze { cells, thaw_after } => {
                let tower = &mut self.towers[index];
                self.scheduler.cancel_slot(&mut tower.phase_timer);
                tower.phase_timer =
                    Some(self.scheduler.schedule_once(thaw_after, SiegeAction::CryoThaw(id)));
                debug!("Cryo spike {:?} froze {} cells for {}s", id, cells, thaw_after);
            }
            EffectOutcome::Converted { removed, currency } => {
                if self.ledger.add(currency) {
                    self.notifications
                        .push(SiegeNotification::CurrencyChanged(self.ledger.currency()));
                }
                debug!("Siphon {:?} converted {:.1} volume", id, removed);
            }
            EffectOutcome::Strained {
                destroyed: true, ..
            } => self.remove_tower(index, grid),
            _ => {}
        }
    }

    fn check_town_hall(&mut self, grid: &FluidGrid) {
        let Some(hall) = self.town_hall.as_mut() else {
            return;
        };
        match hall.check_fluid_damage(grid) {
            TownHallCheck::Dry => {}
            TownHallCheck::Damaged { health, .. } => {
                self.notifications.push(SiegeNotification::TownHallDamaged {
                    health,
                    max_health: hall.max_health(),
                });
            }
            TownHallCheck::Destroyed => {
                self.scheduler.cancel_slot(&mut hall.timer);
                self.notifications.push(SiegeNotification::TownHallDamaged {
                    health: 0.0,
                    max_health: hall.max_health(),
                });
                self.notifications.push(SiegeNotification::TownDestroyed);
                self.waves.on_town_destroyed(
                    &mut self.scheduler,
                    &mut self.sources,
                    &mut self.notifications,
                );
            }
        }
    }

    fn spawn_tower(
        &mut self,
        kind: TowerKind,
        position: Vec3,
        facing: Vec2,
        grid: &mut FluidGrid,
    ) -> TowerId {
        let id = TowerId(self.next_tower_id);
        self.next_tower_id += 1;

        let mut tower = Tower::new(id, kind, position, facing);
        tower.on_placed(grid);
        tower.timer = Some(
            self.scheduler
                .schedule_repeating(tower.stats.effect_interval, SiegeAction::TowerEffect(id)),
        );
        self.towers.push(tower);
        self.notifications.push(SiegeNotification::TowerBuilt {
            id,
            kind,
            position,
        });
        id
    }

    fn remove_tower(&mut self, index: usize, grid: &mut FluidGrid) {
        let mut tower = self.towers.remove(index);
        self.scheduler.cancel_slot(&mut tower.timer);
        self.scheduler.cancel_slot(&mut tower.phase_timer);
        tower.on_removed(grid);
        self.notifications.push(SiegeNotification::TowerDestroyed {
            id: tower.id,
            kind: tower.kind,
        });
        info!("{:?} {:?} destroyed", tower.kind, tower.id);
    }

    /// Validates a site, pays for the tower and places it.
    pub fn build_tower(
        &mut self,
        kind: TowerKind,
        position: Vec3,
        facing: Vec2,
        grid: &mut FluidGrid,
    ) -> Result<TowerId, PlacementError> {
        let site =
            validate_placement(grid, &self.setup.placement, &self.ledger, kind, position)?;
        if !self.ledger.spend(kind.stats().build_cost) {
            return Err(PlacementError::Unaffordable);
        }
        self.notifications
            .push(SiegeNotification::CurrencyChanged(self.ledger.currency()));
        Ok(self.spawn_tower(kind, site, facing, grid))
    }

    /// Damages a tower from outside the tower's own effect.
    pub fn damage_tower(&mut self, id: TowerId, amount: f32, grid: &mut FluidGrid) {
        if let Some(index) = self.towers.iter().position(|t| t.id == id) {
            if self.towers[index].apply_damage(amount) {
                self.remove_tower(index, grid);
            }
        }
    }

    pub fn aim_lance(&mut self, target: Vec3) {
        let Some(player) = self.player.as_mut() else {
            return;
        };
        player.aim_lance(target);
        if player.lance_timer.is_none() {
            player.lance_timer = Some(
                self.scheduler
                    .schedule_repeating(1.0 / LANCE_TICK_RATE, SiegeAction::LanceTick),
            );
        }
    }

    pub fn stop_lance(&mut self) {
        if let Some(player) = self.player.as_mut() {
            player.stop_lance();
            self.scheduler.cancel_slot(&mut player.lance_timer);
        }
    }

    pub fn drain_notifications(&mut self) -> Vec<SiegeNotification> {
        std::mem::take(&mut self.notifications)
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_finished(&self) -> bool {
        self.waves.state().is_finished()
    }

    pub fn elapsed(&self) -> f64 {
        self.scheduler.now()
    }

    pub fn wave_state(&self) -> WaveState {
        self.waves.state()
    }

    pub fn waves(&self) -> &WaveManager {
        &self.waves
    }

    pub fn wave_time_remaining(&self) -> f32 {
        self.waves.wave_time_remaining(&self.scheduler)
    }

    pub fn build_phase_time_remaining(&self) -> f32 {
        self.waves.build_phase_time_remaining(&self.scheduler)
    }

    pub fn ledger(&self) -> &ResourceLedger {
        &self.ledger
    }

    pub fn sources(&self) -> &[FluidSource] {
        &self.sources
    }

    pub fn towers(&self) -> &[Tower] {
        &self.towers
    }

    pub fn town_hall(&self) -> Option<&TownHall> {
        self.town_hall.as_ref()
    }

    pub fn player(&self) -> Option<&Player> {
        self.player.as_ref()
    }

    pub fn status_line(&self) -> String {
        let hall = self
            .town_hall
            .as_ref()
            .map_or("none".to_string(), |h| {
                format!("{:.0}/{:.0}", h.health(), h.max_health())
            });
        let timer = match self.wave_state() {
            WaveState::WaveActive => format!(", {:.0}s left", self.wave_time_remaining()),
            WaveState::BuildPhase => {
                format!(", build {:.0}s left", self.build_phase_time_remaining())
            }
            _ => String::new(),
        };
        format!(
            "Siege: {:?} wave {}/{}{}, town hall {}, currency {:.0}, {} towers",
            self.wave_state(),
            self.waves.wave_number(),
            self.waves.total_waves(),
            timer,
            hall,
            self.ledger.currency(),
            self.towers.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::SourceKind;
    use crate::waves::WaveConfig;
    use siege_shared::fluid::FluidConfig;

    fn grid() -> FluidGrid {
        FluidGrid::new(FluidConfig {
            grid_size: 16,
            cell_size: 10.0,
            origin: Some(Vec2::ZERO),
            ..Default::default()
        })
    }

    /// Runs effects then one flow step per tick, like the fixed schedule.
    fn run(siege: &mut SiegeWorld, grid: &mut FluidGrid, seconds: f32) {
        let dt = 1.0 / 30.0;
        let ticks = (seconds / dt).round() as usize;
        for _ in 0..ticks {
            siege.advance(dt, grid);
            grid.step();
        }
    }

    fn source_at(grid: &FluidGrid, x: i32, y: i32) -> SourceSetup {
        SourceSetup {
            position: grid.cell_to_world(x, y),
            ..Default::default()
        }
    }

    #[test]
    fn test_sources_only_run_during_waves() {
        let mut grid = grid();
        let mut siege = SiegeWorld::new(SiegeSetup {
            sources: vec![source_at(&grid, 2, 2)],
            town_hall: None,
            waves: WaveSettings {
                waves: vec![WaveConfig::new(1, 1.0, 2.0, false)],
                build_phase_duration: 1.0,
                ..Default::default()
            },
            ..Default::default()
        });
        siege.begin(&mut grid);

        run(&mut siege, &mut grid, 0.9);
        assert_eq!(grid.total_volume(), 0.0);
        assert_eq!(siege.wave_state(), WaveState::BuildPhase);

        run(&mut siege, &mut grid, 2.0);
        assert_eq!(siege.wave_state(), WaveState::WaveActive);
        assert!(grid.total_volume() > 0.0);

        run(&mut siege, &mut grid, 1.0);
        assert_eq!(siege.wave_state(), WaveState::Victory);
        assert!(siege.is_finished());

        // Two seconds of 10 per 0.1 s.
        assert!((grid.total_volume() - 200.0).abs() < 10.5);
    }

    #[test]
    fn test_flooded_town_hall_means_defeat() {
        let mut grid = grid();
        let mut siege = SiegeWorld::new(SiegeSetup {
            sources: vec![SourceSetup {
                spawn_rate: 500.0,
                ..source_at(&grid, 8, 8)
            }],
            town_hall: Some(TownHallSetup {
                position: grid.cell_to_world(8, 8),
                max_health: 50.0,
                ..Default::default()
            }),
            waves: WaveSettings {
                waves: vec![WaveConfig::new(1, 1.0, 60.0, false)],
                build_phase_duration: 0.5,
                ..Default::default()
            },
            ..Default::default()
        });
        siege.begin(&mut grid);
        run(&mut siege, &mut grid, 10.0);

        assert_eq!(siege.wave_state(), WaveState::Defeat);
        assert!(siege.town_hall().unwrap().is_destroyed());
        assert!(siege.sources().iter().all(|s| !s.is_active()));

        let notes = siege.drain_notifications();
        assert!(notes.contains(&SiegeNotification::TownDestroyed));
        assert!(siege.drain_notifications().is_empty());
    }

    #[test]
    fn test_build_tower_spends_and_places() {
        let mut grid = grid();
        let mut siege = SiegeWorld::new(SiegeSetup {
            town_hall: None,
            starting_currency: 150.0,
            ..Default::default()
        });
        siege.begin(&mut grid);

        let id = siege
            .build_tower(
                TowerKind::Evaporator,
                Vec3::new(42.0, 0.0, 42.0),
                Vec2::X,
                &mut grid,
            )
            .unwrap();
        assert_eq!(siege.ledger().currency(), 50.0);
        let tower = siege.towers().iter().find(|t| t.id == id).unwrap();
        assert_eq!(tower.position, Vec3::new(45.0, 0.0, 45.0));

        assert_eq!(
            siege.build_tower(
                TowerKind::Evaporator,
                Vec3::new(80.0, 0.0, 80.0),
                Vec2::X,
                &mut grid
            ),
            Err(PlacementError::Unaffordable)
        );
        assert_eq!(siege.ledger().currency(), 50.0);
    }

    #[test]
    fn test_siphon_earns_currency() {
        let mut grid = grid();
        let mut siege = SiegeWorld::new(SiegeSetup {
            town_hall: None,
            starting_currency: 75.0,
            waves_enabled: false,
            ..Default::default()
        });
        siege.begin(&mut grid);
        siege
            .build_tower(TowerKind::Siphon, grid.cell_to_world(5, 5), Vec2::X, &mut grid)
            .unwrap();
        assert_eq!(siege.ledger().currency(), 0.0);

        grid.add_volume(5, 5, 40.0);
        // Two siphon pulses of 30 and 10.
        run(&mut siege, &mut grid, 1.0);
        assert!((siege.ledger().currency() - 20.0).abs() < 1e-2);
    }

    #[test]
    fn test_cryo_cycle_is_scheduled() {
        let mut grid = grid();
        let mut siege = SiegeWorld::new(SiegeSetup {
            town_hall: None,
            waves_enabled: false,
            towers: vec![TowerSetup {
                kind: TowerKind::CryoSpike,
                position: grid.cell_to_world(8, 8),
                facing: Vec2::X,
            }],
            ..Default::default()
        });
        siege.begin(&mut grid);
        let frozen = |grid: &FluidGrid| grid.cell(8, 8).unwrap().is_frozen();

        run(&mut siege, &mut grid, 1.5);
        assert!(frozen(&grid));
        // Frozen from t=1 to t=31, cooling down until t=36, refrozen at t=37.
        run(&mut siege, &mut grid, 30.0);
        assert!(!frozen(&grid));
        run(&mut siege, &mut grid, 4.0);
        assert!(!frozen(&grid));
        run(&mut siege, &mut grid, 2.0);
        assert!(frozen(&grid));
    }

    #[test]
    fn test_destroyed_levee_unblocks_cells() {
        let mut grid = grid();
        let mut siege = SiegeWorld::new(SiegeSetup {
            town_hall: None,
            waves_enabled: false,
            towers: vec![TowerSetup {
                kind: TowerKind::LeveeWall,
                position: grid.cell_to_world(8, 8),
                facing: Vec2::Y,
            }],
            ..Default::default()
        });
        siege.begin(&mut grid);
        assert!(grid.cell(8, 8).unwrap().is_blocked());

        let levee = siege.towers()[0].id;
        siege.damage_tower(levee, 1000.0, &mut grid);
        assert!(siege.towers().is_empty());
        assert!(grid.cells().iter().all(|c| !c.is_blocked()));
        assert!(siege
            .drain_notifications()
            .iter()
            .any(|n| matches!(n, SiegeNotification::TowerDestroyed { .. })));
    }

    #[test]
    fn test_player_lance_clears_fluid() {
        let mut grid = grid();
        let target = grid.cell_to_world(3, 3);
        let mut siege = SiegeWorld::new(SiegeSetup {
            town_hall: None,
            waves_enabled: false,
            player: Some(PlayerSetup {
                position: grid.cell_to_world(12, 12),
                lance_target: Some(target),
                ..Default::default()
            }),
            ..Default::default()
        });
        siege.begin(&mut grid);
        grid.add_volume(3, 3, 10.0);

        run(&mut siege, &mut grid, 1.0);
        assert!(grid.total_volume() < 0.1);
        let player = siege.player().unwrap();
        assert!(player.is_firing());
        assert!(player.energy() < 100.0);

        siege.stop_lance();
        assert!(!siege.player().unwrap().is_firing());
    }

    #[test]
    fn test_basin_source_kind_waits_for_trigger() {
        let mut grid = grid();
        let mut siege = SiegeWorld::new(SiegeSetup {
            town_hall: None,
            sources: vec![
                source_at(&grid, 1, 1),
                SourceSetup {
                    kind: SourceKind::Basin,
                    ..source_at(&grid, 14, 14)
                },
            ],
            waves: WaveSettings {
                waves: vec![WaveConfig::new(1, 1.0, 30.0, true)],
                build_phase_duration: 0.5,
                basin_trigger_threshold: 100.0,
                ..Default::default()
            },
            ..Default::default()
        });
        siege.begin(&mut grid);

        run(&mut siege, &mut grid, 1.0);
        assert!(!siege.sources()[1].is_active());
        // Past 100 volume by the check at t=2.5.
        run(&mut siege, &mut grid, 2.0);
        assert!(siege.waves().basin_triggered());
        assert!(siege.sources()[1].is_active());
    }

    #[test]
    fn test_begin_twice_is_ignored() {
        let mut grid = grid();
        let mut siege = SiegeWorld::new(SiegeSetup::default());
        siege.begin(&mut grid);
        let timers = siege.scheduler.len();
        siege.begin(&mut grid);
        assert_eq!(siege.scheduler.len(), timers);
        assert!(siege.status_line().contains("BuildPhase"));
    }
}
