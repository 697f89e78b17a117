/// Fixed simulation rate of the fluid step and gameplay effects.
pub const TICKS_PER_SECOND: u64 = 30;

/// Cells per side of the fluid grid.
pub const GRID_SIZE: usize = 128;

/// World units covered by one cell edge.
pub const CELL_WORLD_SIZE: f32 = 100.0;

/// Fraction of the surface difference moved toward a lower neighbor per step.
pub const DEFAULT_FLOW_RATE: f32 = 0.25;

/// Upper bound on the per-neighbor transfer, as a fraction of the difference.
/// Keeps two cells from overshooting each other in a single step.
pub const DEFAULT_OSCILLATION_CLAMP: f32 = 0.5;

/// Seconds between flow steps.
pub const DEFAULT_STEP_INTERVAL: f32 = 1.0 / TICKS_PER_SECOND as f32;

/// Volumes at or below this are treated as dry by the flow step.
pub const MIN_FLUID_VOLUME: f32 = 1.0e-4;

/// Height the terrain probe starts from.
pub const TERRAIN_PROBE_TOP: f32 = 100_000.0;

/// Height the terrain probe gives up at.
pub const TERRAIN_PROBE_BOTTOM: f32 = -100_000.0;

