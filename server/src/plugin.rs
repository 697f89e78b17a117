use bevy::prelude::*;
use siege_shared::fluid::FluidGrid;
use siege_shared::sets::{SiegeFixedUpdateSet, SiegeUpdateSet};

use crate::siege::{SiegeNotification, SiegeSetup, SiegeWorld};

/// Notifications from the siege, republished as bevy events each frame.
#[derive(Event, Debug, Clone, PartialEq)]
pub struct SiegeEvent(pub SiegeNotification);

/// Runs the siege against the [`FluidGrid`] inserted by the fluid plugin.
///
/// Gameplay effects run in [`SiegeFixedUpdateSet::Effects`], so within a
/// fixed tick every effect lands before the flow step.
pub struct SiegePlugin {
    pub setup: SiegeSetup,
}

impl SiegePlugin {
    pub fn new(setup: SiegeSetup) -> Self {
        Self { setup }
    }
}

impl Plugin for SiegePlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(SiegeWorld::new(self.setup.clone()))
            .add_event::<SiegeEvent>()
            .configure_sets(
                Update,
                (SiegeUpdateSet::Notifications, SiegeUpdateSet::Diagnostics).chain(),
            )
            // Terrain is baked in Startup.
            .add_systems(PostStartup, begin_siege)
            .add_systems(
                FixedUpdate,
                advance_siege.in_set(SiegeFixedUpdateSet::Effects),
            )
            .add_systems(
                Update,
                publish_siege_notifications.in_set(SiegeUpdateSet::Notifications),
            );
    }
}

fn begin_siege(mut siege: ResMut<SiegeWorld>, mut grid: ResMut<FluidGrid>) {
    siege.begin(&mut grid);
}

fn advance_siege(time: Res<Time<Fixed>>, mut siege: ResMut<SiegeWorld>, mut grid: ResMut<FluidGrid>) {
    let dt = time.delta_secs();
    siege.advance(dt, &mut grid);
}

fn publish_siege_notifications(
    mut siege: ResMut<SiegeWorld>,
    mut events: EventWriter<SiegeEvent>,
) {
    for notification in siege.drain_notifications() {
        match &notification {
            SiegeNotification::WaveStateChanged(state) => info!("Siege state: {:?}", state),
            SiegeNotification::WaveNumberChanged { current, total } => {
                info!("Wave {}/{}", current, total)
            }
            SiegeNotification::BasinTriggered { total_volume } => {
                info!("Basin sources opened at volume {:.0}", total_volume)
            }
            SiegeNotification::TownDestroyed => warn!("Town hall destroyed"),
            SiegeNotification::TowerDestroyed { id, kind } => {
                info!("{:?} {:?} destroyed", kind, id)
            }
            other => debug!("Siege: {:?}", other),
        }
        events.write(SiegeEvent(notification));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::SourceSetup;
    use crate::waves::{WaveConfig, WaveSettings, WaveState};
    use bevy::time::TimeUpdateStrategy;
    use siege_shared::fluid::{FluidConfig, FluidPlugin};
    use std::time::Duration;

    fn test_app(setup: SiegeSetup) -> App {
        let config = FluidConfig {
            grid_size: 16,
            cell_size: 10.0,
            origin: Some(Vec2::ZERO),
            ..Default::default()
        };
        let step = Duration::from_secs_f32(config.step_interval);
        let mut app = App::new();
        app.add_plugins(MinimalPlugins)
            .add_plugins(FluidPlugin::new(config))
            .add_plugins(SiegePlugin::new(setup))
            .insert_resource(TimeUpdateStrategy::ManualDuration(step));
        app
    }

    #[derive(Resource, Default)]
    struct Seen(Vec<SiegeNotification>);

    fn record(mut events: EventReader<SiegeEvent>, mut seen: ResMut<Seen>) {
        seen.0.extend(events.read().map(|e| e.0.clone()));
    }

    #[test]
    fn test_siege_starts_after_bake() {
        let mut app = test_app(SiegeSetup::default());
        app.update();

        assert!(app.world().resource::<FluidGrid>().is_terrain_baked());
        let siege = app.world().resource::<SiegeWorld>();
        assert!(siege.is_started());
        assert_eq!(siege.wave_state(), WaveState::BuildPhase);
    }

    #[test]
    fn test_sources_fill_grid_through_fixed_update() {
        let mut app = test_app(SiegeSetup {
            town_hall: None,
            sources: vec![SourceSetup {
                position: Vec3::new(75.0, 0.0, 75.0),
                ..Default::default()
            }],
            waves: WaveSettings {
                waves: vec![WaveConfig::new(1, 1.0, 60.0, false)],
                build_phase_duration: 0.1,
                ..Default::default()
            },
            ..Default::default()
        });
        app.init_resource::<Seen>()
            .add_systems(Update, record.after(SiegeUpdateSet::Notifications));

        for _ in 0..40 {
            app.update();
        }

        assert!(app.world().resource::<FluidGrid>().total_volume() > 0.0);
        let seen = &app.world().resource::<Seen>().0;
        assert!(seen.contains(&SiegeNotification::WaveStateChanged(WaveState::WaveActive)));
        assert!(seen.contains(&SiegeNotification::WaveNumberChanged { current: 1, total: 1 }));
    }
}
