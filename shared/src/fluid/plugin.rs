//! Bevy plugin for the fluid heightfield.

use std::time::Duration;

use bevy::prelude::*;

use super::bake::{FlatProbe, TerrainProbe};
use super::flow::FlowStepStats;
use super::telemetry::{debug_boxes, DebugCellBox, FluidTelemetry};
use super::{FluidConfig, FluidGrid};
use crate::sets::SiegeFixedUpdateSet;

/// Plugin that owns the fluid grid and steps it at a fixed rate.
///
/// This plugin:
/// - Validates the config, falling back to the defaults if it is rejected
/// - Inserts the grid and sets the fixed timestep to the configured interval
/// - Bakes terrain heights once at startup from the [`TerrainSource`]
/// - Steps the flow in `FixedUpdate`, after gameplay effects
/// - Refreshes read-only telemetry after each step
pub struct FluidPlugin {
    pub config: FluidConfig,
}

impl FluidPlugin {
    pub fn new(config: FluidConfig) -> Self {
        Self { config }
    }
}

impl Default for FluidPlugin {
    fn default() -> Self {
        Self::new(FluidConfig::default())
    }
}

impl Plugin for FluidPlugin {
    fn build(&self, app: &mut App) {
        let config = match self.config.validate() {
            Ok(()) => self.config.clone(),
            Err(err) => {
                error!("Rejected fluid config ({err}), falling back to defaults");
                FluidConfig::default()
            }
        };

        let step = Duration::from_secs_f32(config.step_interval);
        app.insert_resource(FluidGrid::new(config.clone()))
            .insert_resource(config)
            .insert_resource(Time::<Fixed>::from_duration(step))
            .init_resource::<FluidTelemetry>()
            .init_resource::<LastFlowStep>()
            .init_resource::<FluidDebugOverlay>()
            .configure_sets(
                FixedUpdate,
                (
                    SiegeFixedUpdateSet::Effects,
                    SiegeFixedUpdateSet::FluidStep,
                    SiegeFixedUpdateSet::Telemetry,
                )
                    .chain(),
            )
            .add_systems(Startup, bake_terrain_system)
            .add_systems(
                FixedUpdate,
                step_fluid_simulation.in_set(SiegeFixedUpdateSet::FluidStep),
            )
            .add_systems(
                FixedUpdate,
                (update_fluid_telemetry, refresh_debug_overlay)
                    .chain()
                    .in_set(SiegeFixedUpdateSet::Telemetry),
            );
    }
}

/// Static geometry the grid is baked against.
#[derive(Resource)]
pub struct TerrainSource(pub Box<dyn TerrainProbe + Send + Sync>);

impl TerrainSource {
    pub fn new(probe: impl TerrainProbe + Send + Sync + 'static) -> Self {
        Self(Box::new(probe))
    }
}

/// Counters from the most recent flow step.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct LastFlowStep(pub FlowStepStats);

/// Overlay boxes for a debug renderer. Empty unless the overlay is enabled.
#[derive(Resource, Debug, Clone, Default)]
pub struct FluidDebugOverlay {
    pub boxes: Vec<DebugCellBox>,
}

fn bake_terrain_system(mut grid: ResMut<FluidGrid>, source: Option<Res<TerrainSource>>) {
    let report = match source {
        Some(source) => grid.bake_terrain(source.0.as_ref()),
        None => {
            warn!("No terrain source registered, baking a flat grid at height 0");
            grid.bake_terrain(&FlatProbe::default())
        }
    };

    if let Some(report) = report {
        info!(
            "Baked terrain for {} cells ({} misses), heights {:.1} to {:.1}",
            report.cells, report.misses, report.min_height, report.max_height
        );
    }
}

/// System that steps the fluid simulation forward.
///
/// This runs in FixedUpdate so every step covers the same interval.
fn step_fluid_simulation(mut grid: ResMut<FluidGrid>, mut last: ResMut<LastFlowStep>) {
    last.0 = grid.step();
}

fn update_fluid_telemetry(
    grid: Res<FluidGrid>,
    last: Res<LastFlowStep>,
    mut telemetry: ResMut<FluidTelemetry>,
) {
    telemetry.observe(&grid, last.0);
}

fn refresh_debug_overlay(grid: Res<FluidGrid>, mut overlay: ResMut<FluidDebugOverlay>) {
    if grid.config().debug_overlay {
        overlay.boxes = debug_boxes(&grid);
    } else if !overlay.boxes.is_empty() {
        overlay.boxes.clear();
    }
}
