//! Wave progression.
//!
//! The siege alternates between build phases, where every source is off and
//! the player can place towers, and waves, where a growing number of regular
//! sources run at a growing rate. During later waves a basin check watches
//! the total fluid on the map and, once it passes a threshold, opens the
//! basin sources for the rest of the wave.
//!
//! ## States
//! `PreGame -> BuildPhase -> WaveActive -> BuildPhase -> ... -> Victory`
//! with `Defeat` reachable from any running state when the town hall falls.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schedule::{EffectScheduler, TimerHandle};
use crate::siege::{SiegeAction, SiegeNotification};
use crate::sources::{FluidSource, SourceKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WaveState {
    #[default]
    PreGame,
    BuildPhase,
    WaveActive,
    Victory,
    Defeat,
}

impl WaveState {
    pub fn is_finished(self) -> bool {
        matches!(self, WaveState::Victory | WaveState::Defeat)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveConfig {
    /// Regular sources switched on, in placement order.
    pub source_count: usize,
    pub spawn_rate_multiplier: f32,
    /// Seconds the wave lasts.
    pub duration: f32,
    pub basin_trigger_enabled: bool,
}

impl WaveConfig {
    pub fn new(
        source_count: usize,
        spawn_rate_multiplier: f32,
        duration: f32,
        basin_trigger_enabled: bool,
    ) -> Self {
        Self {
            source_count,
            spawn_rate_multiplier,
            duration,
            basin_trigger_enabled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveSettings {
    pub waves: Vec<WaveConfig>,
    pub build_phase_duration: f32,
    /// Total grid volume above which basin sources open.
    pub basin_trigger_threshold: f32,
    pub basin_check_interval: f32,
}

impl Default for WaveSettings {
    fn default() -> Self {
        Self {
            waves: vec![
                WaveConfig::new(1, 1.0, 60.0, false),
                WaveConfig::new(2, 1.2, 75.0, false),
                WaveConfig::new(2, 1.5, 90.0, true),
                WaveConfig::new(3, 1.8, 105.0, true),
                WaveConfig::new(3, 2.5, 120.0, true),
            ],
            build_phase_duration: 30.0,
            basin_trigger_threshold: 5000.0,
            basin_check_interval: 1.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WaveManager {
    settings: WaveSettings,
    state: WaveState,
    /// Index of the current or most recent wave.
    current_wave: Option<usize>,
    basin_triggered: bool,
    build_timer: Option<TimerHandle>,
    wave_timer: Option<TimerHandle>,
    basin_timer: Option<TimerHandle>,
}

impl WaveManager {
    pub fn new(settings: WaveSettings) -> Self {
        Self {
            settings,
            ..Default::default()
        }
    }

    pub fn settings(&self) -> &WaveSettings {
        &self.settings
    }

    pub fn state(&self) -> WaveState {
        self.state
    }

    /// One-based number of the current wave, 0 before the first.
    pub fn wave_number(&self) -> usize {
        self.current_wave.map_or(0, |i| i + 1)
    }

    pub fn total_waves(&self) -> usize {
        self.settings.waves.len()
    }

    pub fn basin_triggered(&self) -> bool {
        self.basin_triggered
    }

    pub fn wave_time_remaining(&self, scheduler: &EffectScheduler<SiegeAction>) -> f32 {
        match (self.state, self.wave_timer) {
            (WaveState::WaveActive, Some(handle)) => scheduler.remaining(handle).unwrap_or(0.0),
            _ => 0.0,
        }
    }

    pub fn build_phase_time_remaining(&self, scheduler: &EffectScheduler<SiegeAction>) -> f32 {
        match (self.state, self.build_timer) {
            (WaveState::BuildPhase, Some(handle)) => scheduler.remaining(handle).unwrap_or(0.0),
            _ => 0.0,
        }
    }

    fn set_state(&mut self, state: WaveState, notes: &mut Vec<SiegeNotification>) {
        if self.state == state {
            return;
        }
        self.state = state;
        notes.push(SiegeNotification::WaveStateChanged(state));
    }

    /// Switches every source off and opens the first build phase.
    pub fn begin(
        &mut self,
        scheduler: &mut EffectScheduler<SiegeAction>,
        sources: &mut [FluidSource],
        notes: &mut Vec<SiegeNotification>,
    ) {
        info!(
            "Wave manager starting with {} waves, {} regular and {} basin sources",
            self.total_waves(),
            sources.iter().filter(|s| s.kind == SourceKind::Regular).count(),
            sources.iter().filter(|s| s.kind == SourceKind::Basin).count()
        );
        self.start_build_phase(scheduler, sources, notes);
    }

    pub fn start_build_phase(
        &mut self,
        scheduler: &mut EffectScheduler<SiegeAction>,
        sources: &mut [FluidSource],
        notes: &mut Vec<SiegeNotification>,
    ) {
        self.set_state(WaveState::BuildPhase, notes);
        deactivate_all(scheduler, sources);
        scheduler.cancel_slot(&mut self.build_timer);
        self.build_timer = Some(scheduler.schedule_once(
            self.settings.build_phase_duration,
            SiegeAction::BuildPhaseElapsed,
        ));
    }

    pub fn start_next_wave(
        &mut self,
        scheduler: &mut EffectScheduler<SiegeAction>,
        sources: &mut [FluidSource],
        notes: &mut Vec<SiegeNotification>,
    ) {
        self.build_timer = None;
        let next = self.current_wave.map_or(0, |i| i + 1);
        let Some(config) = self.settings.waves.get(next).cloned() else {
            self.trigger_victory(scheduler, sources, notes);
            return;
        };

        self.current_wave = Some(next);
        self.set_state(WaveState::WaveActive, notes);
        notes.push(SiegeNotification::WaveNumberChanged {
            current: next + 1,
            total: self.total_waves(),
        });
        self.basin_triggered = false;

        for source in sources.iter_mut().filter(|s| s.kind == SourceKind::Regular) {
            source.apply_multiplier(config.spawn_rate_multiplier);
        }
        for source in sources
            .iter_mut()
            .filter(|s| s.kind == SourceKind::Regular)
            .take(config.source_count)
        {
            source.activate(scheduler);
        }

        self.wave_timer = Some(scheduler.schedule_once(config.duration, SiegeAction::WaveElapsed));
        if config.basin_trigger_enabled {
            scheduler.cancel_slot(&mut self.basin_timer);
            self.basin_timer = Some(scheduler.schedule_repeating(
                self.settings.basin_check_interval,
                SiegeAction::BasinCheck,
            ));
        }

        info!(
            "Wave {} started: {} sources, {:.1}x rate, {:.0}s, basin {}",
            next + 1,
            config.source_count,
            config.spawn_rate_multiplier,
            config.duration,
            if config.basin_trigger_enabled { "on" } else { "off" }
        );
    }

    pub fn on_wave_elapsed(
        &mut self,
        scheduler: &mut EffectScheduler<SiegeAction>,
        sources: &mut [FluidSource],
        notes: &mut Vec<SiegeNotification>,
    ) {
        self.wave_timer = None;
        scheduler.cancel_slot(&mut self.basin_timer);

        if self.wave_number() >= self.total_waves() {
            self.trigger_victory(scheduler, sources, notes);
        } else {
            self.start_build_phase(scheduler, sources, notes);
        }
    }

    /// Opens the basin sources once per wave when the map holds too much fluid.
    pub fn check_basin(
        &mut self,
        total_volume: f32,
        scheduler: &mut EffectScheduler<SiegeAction>,
        sources: &mut [FluidSource],
        notes: &mut Vec<SiegeNotification>,
    ) {
        if self.basin_triggered || self.state != WaveState::WaveActive {
            return;
        }
        if total_volume <= self.settings.basin_trigger_threshold {
            return;
        }
        let Some(multiplier) = self
            .current_wave
            .and_then(|i| self.settings.waves.get(i))
            .map(|config| config.spawn_rate_multiplier)
        else {
            return;
        };

        self.basin_triggered = true;
        for source in sources.iter_mut().filter(|s| s.kind == SourceKind::Basin) {
            source.apply_multiplier(multiplier);
            source.activate(scheduler);
        }
        notes.push(SiegeNotification::BasinTriggered { total_volume });
        info!(
            "Basin trigger: total volume {:.0} above {:.0}",
            total_volume, self.settings.basin_trigger_threshold
        );
    }

    pub fn on_town_destroyed(
        &mut self,
        scheduler: &mut EffectScheduler<SiegeAction>,
        sources: &mut [FluidSource],
        notes: &mut Vec<SiegeNotification>,
    ) {
        if self.state.is_finished() {
            return;
        }
        self.stop(scheduler, sources);
        self.set_state(WaveState::Defeat, notes);
        warn!("Defeat: town hall destroyed on wave {}", self.wave_number());
    }

    fn trigger_victory(
        &mut self,
        scheduler: &mut EffectScheduler<SiegeAction>,
        sources: &mut [FluidSource],
        notes: &mut Vec<SiegeNotification>,
    ) {
        self.stop(scheduler, sources);
        self.set_state(WaveState::Victory, notes);
        info!("Victory: all {} waves survived", self.total_waves());
    }

    fn stop(&mut self, scheduler: &mut EffectScheduler<SiegeAction>, sources: &mut [FluidSource]) {
        deactivate_all(scheduler, sources);
        scheduler.cancel_slot(&mut self.wave_timer);
        scheduler.cancel_slot(&mut self.build_timer);
        scheduler.cancel_slot(&mut self.basin_timer);
    }
}

fn deactivate_all(scheduler: &mut EffectScheduler<SiegeAction>, sources: &mut [FluidSource]) {
    for source in sources.iter_mut() {
        source.deactivate(scheduler);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{SourceId, SourceSetup};
    use siege_shared::fluid::{FluidConfig, FluidGrid};

    struct Harness {
        manager: WaveManager,
        scheduler: EffectScheduler<SiegeAction>,
        sources: Vec<FluidSource>,
        notes: Vec<SiegeNotification>,
    }

    impl Harness {
        fn new(settings: WaveSettings, regular: usize, basin: usize) -> Self {
            let grid = FluidGrid::new(FluidConfig {
                grid_size: 8,
                cell_size: 10.0,
                origin: Some(Vec2::ZERO),
                ..Default::default()
            });
            let mut sources = Vec::new();
            for i in 0..regular + basin {
                let kind = if i < regular {
                    SourceKind::Regular
                } else {
                    SourceKind::Basin
                };
                let setup = SourceSetup {
                    kind,
                    active_on_start: true,
                    ..Default::default()
                };
                sources.push(FluidSource::new(SourceId(i as u32), &setup, &grid));
            }
            Self {
                manager: WaveManager::new(settings),
                scheduler: EffectScheduler::new(),
                sources,
                notes: Vec::new(),
            }
        }

        /// Advances time, answering wave timers and ignoring spawns.
        fn run(&mut self, seconds: f32, total_volume: f32) {
            self.scheduler.advance(seconds);
            while let Some((_, action)) = self.scheduler.next_due() {
                match action {
                    SiegeAction::BuildPhaseElapsed => self.manager.start_next_wave(
                        &mut self.scheduler,
                        &mut self.sources,
                        &mut self.notes,
                    ),
                    SiegeAction::WaveElapsed => self.manager.on_wave_elapsed(
                        &mut self.scheduler,
                        &mut self.sources,
                        &mut self.notes,
                    ),
                    SiegeAction::BasinCheck => self.manager.check_basin(
                        total_volume,
                        &mut self.scheduler,
                        &mut self.sources,
                        &mut self.notes,
                    ),
                    _ => {}
                }
            }
        }

        fn active(&self) -> Vec<u32> {
            self.sources
                .iter()
                .filter(|s| s.is_active())
                .map(|s| s.id.0)
                .collect()
        }
    }

    #[test]
    fn test_begin_opens_build_phase_with_sources_off() {
        let mut h = Harness::new(WaveSettings::default(), 3, 1);
        for source in h.sources.iter_mut() {
            source.activate(&mut h.scheduler);
        }
        h.manager
            .begin(&mut h.scheduler, &mut h.sources, &mut h.notes);

        assert_eq!(h.manager.state(), WaveState::BuildPhase);
        assert!(h.active().is_empty());
        assert!((h.manager.build_phase_time_remaining(&h.scheduler) - 30.0).abs() < 1e-4);
        assert_eq!(h.manager.wave_time_remaining(&h.scheduler), 0.0);
    }

    #[test]
    fn test_wave_one_activates_first_source() {
        let mut h = Harness::new(WaveSettings::default(), 3, 1);
        h.manager
            .begin(&mut h.scheduler, &mut h.sources, &mut h.notes);
        h.run(30.0, 0.0);

        assert_eq!(h.manager.state(), WaveState::WaveActive);
        assert_eq!(h.manager.wave_number(), 1);
        assert_eq!(h.active(), vec![0]);
        assert!((h.manager.wave_time_remaining(&h.scheduler) - 60.0).abs() < 1e-3);
        assert!(h.notes.contains(&SiegeNotification::WaveNumberChanged {
            current: 1,
            total: 5
        }));
    }

    #[test]
    fn test_multiplier_applies_to_base_rate() {
        let mut h = Harness::new(WaveSettings::default(), 3, 0);
        h.manager
            .begin(&mut h.scheduler, &mut h.sources, &mut h.notes);
        // Build 30, wave 60, build 30, then wave 2 at 1.2x.
        h.run(120.0, 0.0);
        assert_eq!(h.manager.wave_number(), 2);
        assert_eq!(h.active(), vec![0, 1]);
        assert!((h.sources[0].spawn_rate() - 12.0).abs() < 1e-4);
    }

    #[test]
    fn test_basin_trigger_once_per_wave() {
        let mut h = Harness::new(WaveSettings::default(), 3, 2);
        h.manager
            .begin(&mut h.scheduler, &mut h.sources, &mut h.notes);
        // Through wave 2 into wave 3.
        h.run(30.0 + 60.0 + 30.0 + 75.0 + 30.0, 0.0);
        assert_eq!(h.manager.wave_number(), 3);
        assert!(!h.manager.basin_triggered());

        h.run(1.0, 6000.0);
        assert!(h.manager.basin_triggered());
        assert_eq!(h.active(), vec![0, 1, 3, 4]);
        assert!((h.sources[3].spawn_rate() - 15.0).abs() < 1e-4);
        let triggers = h
            .notes
            .iter()
            .filter(|n| matches!(n, SiegeNotification::BasinTriggered { .. }))
            .count();
        h.run(5.0, 9000.0);
        let after = h
            .notes
            .iter()
            .filter(|n| matches!(n, SiegeNotification::BasinTriggered { .. }))
            .count();
        assert_eq!(triggers, 1);
        assert_eq!(after, 1);
    }

    #[test]
    fn test_basin_ignored_in_early_waves() {
        let mut h = Harness::new(WaveSettings::default(), 1, 1);
        h.manager
            .begin(&mut h.scheduler, &mut h.sources, &mut h.notes);
        h.run(40.0, 99_999.0);
        assert_eq!(h.manager.wave_number(), 1);
        assert!(!h.manager.basin_triggered());
        assert_eq!(h.active(), vec![0]);
    }

    #[test]
    fn test_full_run_ends_in_victory() {
        let mut h = Harness::new(WaveSettings::default(), 3, 1);
        h.manager
            .begin(&mut h.scheduler, &mut h.sources, &mut h.notes);
        h.run(30.0 * 5.0 + 60.0 + 75.0 + 90.0 + 105.0 + 120.0 + 1.0, 0.0);

        assert_eq!(h.manager.state(), WaveState::Victory);
        assert!(h.active().is_empty());
        assert!(h.scheduler.is_empty());
    }

    #[test]
    fn test_defeat_stops_everything() {
        let mut h = Harness::new(WaveSettings::default(), 2, 0);
        h.manager
            .begin(&mut h.scheduler, &mut h.sources, &mut h.notes);
        h.run(35.0, 0.0);
        h.manager
            .on_town_destroyed(&mut h.scheduler, &mut h.sources, &mut h.notes);

        assert_eq!(h.manager.state(), WaveState::Defeat);
        assert!(h.active().is_empty());
        assert!(h.scheduler.is_empty());
        assert_eq!(
            h.notes.last(),
            Some(&SiegeNotification::WaveStateChanged(WaveState::Defeat))
        );
    }

    #[test]
    fn test_no_waves_is_immediate_victory_after_build() {
        let settings = WaveSettings {
            waves: Vec::new(),
            ..Default::default()
        };
        let mut h = Harness::new(settings, 1, 0);
        h.manager
            .begin(&mut h.scheduler, &mut h.sources, &mut h.notes);
        h.run(31.0, 0.0);
        assert_eq!(h.manager.state(), WaveState::Victory);
    }
}
