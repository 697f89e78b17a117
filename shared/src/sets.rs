use bevy::prelude::*;

/// Ordering of the work done inside one fixed tick.
///
/// Gameplay effects mutate the grid first, then the flow step consumes those
/// mutations, then read-only telemetry observes the result.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum SiegeFixedUpdateSet {
    Effects,
    FluidStep,
    Telemetry,
}

/// Per-frame work that is not tied to the simulation clock.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum SiegeUpdateSet {
    Notifications,
    Diagnostics,
}
