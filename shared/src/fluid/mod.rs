//! Heightfield fluid simulation.
//!
//! A fixed square grid of cells, each holding baked terrain height and a
//! fluid depth. Fluid flows downhill between orthogonal neighbors once per
//! fixed step. Gameplay code reads and mutates the grid only through
//! [`FluidGrid`].

mod bake;
mod cell;
mod config;
mod coords;
mod flow;
mod grid;
mod plugin;
mod radius;
pub mod telemetry;

pub use bake::{BakeReport, FlatProbe, HeightfieldProbe, TerrainProbe};
pub use cell::FluidCell;
pub use config::{FluidConfig, MAX_GRID_SIZE};
pub use coords::{centered_origin, horizontal, GridMapper};
pub use flow::{FlowStepStats, LATERAL_NEIGHBORS};
pub use grid::FluidGrid;
pub use plugin::{FluidDebugOverlay, FluidPlugin, LastFlowStep, TerrainSource};
pub use radius::{cells_in_radius, CellInRadius};
pub use telemetry::{FluidTelemetry, GridSummary};
