use std::time::Duration;

use bevy::{
    diagnostic::{FrameTimeDiagnosticsPlugin, LogDiagnosticsPlugin},
    prelude::*,
    time::TimeUpdateStrategy,
};
use bevy_app::ScheduleRunnerPlugin;
use siege_shared::fluid::telemetry::ascii_depth_map;
use siege_shared::fluid::{FluidGrid, FluidPlugin, FluidTelemetry};
use siege_shared::sets::SiegeUpdateSet;
use siege_shared::TICKS_PER_SECOND;

use crate::plugin::SiegePlugin;
use crate::scenario::Scenario;
use crate::siege::SiegeWorld;

/// Seconds between ASCII depth dumps when the debug overlay is on.
const DEPTH_MAP_PERIOD: f32 = 5.0;
/// Grid cells per character in the ASCII depth dump.
const DEPTH_MAP_STRIDE: usize = 4;

#[derive(Resource)]
struct StatusTimers {
    status: Timer,
    depth_map: Timer,
}

impl Default for StatusTimers {
    fn default() -> Self {
        Self {
            status: Timer::from_seconds(1.0, TimerMode::Repeating),
            depth_map: Timer::from_seconds(DEPTH_MAP_PERIOD, TimerMode::Repeating),
        }
    }
}

/// Adds the fluid grid, the terrain and the siege to an app that already has
/// its time and scheduling plugins.
pub fn add_simulation(app: &mut App, scenario: Scenario) {
    info!(
        "Loading scenario '{}': {}x{} cells of {} units",
        scenario.name, scenario.fluid.grid_size, scenario.fluid.grid_size, scenario.fluid.cell_size
    );

    app.insert_resource(scenario.terrain().into_source())
        .add_plugins(FluidPlugin::new(scenario.fluid.clone()))
        .add_plugins(SiegePlugin::new(scenario.siege))
        .init_resource::<StatusTimers>()
        .add_systems(
            Update,
            (log_siege_status, exit_when_finished)
                .chain()
                .in_set(SiegeUpdateSet::Diagnostics),
        );
}

/// Builds the server app.
///
/// A `manual_step` app advances exactly one fixed step per `update` and is
/// meant to be driven by [`run_ticks`]. Otherwise the app runs in real time at
/// [`TICKS_PER_SECOND`].
pub fn build_app(scenario: Scenario, manual_step: bool) -> App {
    let step = Duration::from_secs_f32(scenario.fluid.step_interval);
    let mut app = App::new();

    if manual_step {
        app.add_plugins(MinimalPlugins)
            .insert_resource(TimeUpdateStrategy::ManualDuration(step));
    } else {
        app.add_plugins(
            MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(Duration::from_secs_f64(
                1.0 / TICKS_PER_SECOND as f64,
            ))),
        );
        app.add_plugins(FrameTimeDiagnosticsPlugin::default());
        app.add_plugins(LogDiagnosticsPlugin::default());
    }
    app.add_plugins(bevy::log::LogPlugin::default());

    add_simulation(&mut app, scenario);
    app
}

/// Runs `ticks` fixed steps as fast as possible, stopping early when the
/// siege ends.
pub fn run_ticks(app: &mut App, ticks: u64) -> AppExit {
    app.finish();
    app.cleanup();

    // Startup runs here; the first frame has no elapsed time.
    app.update();
    for _ in 0..ticks {
        app.update();
        if let Some(exit) = app.should_exit() {
            return exit;
        }
    }

    if let Some(siege) = app.world().get_resource::<SiegeWorld>() {
        info!("Stopped after {} ticks. {}", ticks, siege.status_line());
    }
    AppExit::Success
}

pub fn run(scenario: Scenario, ticks: Option<u64>) -> AppExit {
    match ticks {
        Some(ticks) => {
            let mut app = build_app(scenario, true);
            run_ticks(&mut app, ticks)
        }
        None => build_app(scenario, false).run(),
    }
}

fn log_siege_status(
    time: Res<Time>,
    mut timers: ResMut<StatusTimers>,
    siege: Res<SiegeWorld>,
    grid: Res<FluidGrid>,
    telemetry: Res<FluidTelemetry>,
) {
    if timers.status.tick(time.delta()).just_finished() {
        info!("{}", telemetry.summary());
        info!("{}", siege.status_line());
    }

    if grid.config().debug_overlay && timers.depth_map.tick(time.delta()).just_finished() {
        info!(
            "Fluid depth at t={:.1}s:\n{}",
            siege.elapsed(),
            ascii_depth_map(&grid, DEPTH_MAP_STRIDE)
        );
    }
}

fn exit_when_finished(siege: Res<SiegeWorld>, mut exit: EventWriter<AppExit>) {
    if siege.is_finished() {
        info!("Siege over after {:.1}s. {}", siege.elapsed(), siege.status_line());
        exit.write(AppExit::Success);
    }
}
