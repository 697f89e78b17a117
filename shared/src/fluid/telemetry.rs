//! Read-only instrumentation of the fluid grid.
//!
//! Nothing in this module mutates simulation state. It turns the grid and the
//! per-step counters into numbers a HUD, a log line or a renderer can use.
//!
//! ## Settled Detection
//! The grid is considered settled once the volume moved per step has stayed
//! under a threshold for a number of consecutive steps. Any step above the
//! threshold resets the count. This is reported only; stepping never stops.

use bevy::prelude::*;

use super::flow::FlowStepStats;
use super::grid::FluidGrid;
use crate::constants::MIN_FLUID_VOLUME;

// ============================================================================
// Configuration Constants
// ============================================================================

/// Consecutive calm steps before the grid is reported as settled.
pub const MIN_CALM_STEPS_TO_SETTLE: u32 = 60;

/// Volume moved per step at or below which a step counts as calm.
pub const CALM_VOLUME_THRESHOLD: f32 = 0.05;

/// Depth mapped to the hottest overlay color.
pub const OVERLAY_MAX_DEPTH: f32 = 300.0;

/// Alpha of overlay boxes.
pub const OVERLAY_ALPHA: u8 = 180;

/// Overlay boxes cover this fraction of the cell's half-width.
pub const OVERLAY_FOOTPRINT: f32 = 0.45;

/// Characters used by [`ascii_depth_map`], shallow to deep.
const DEPTH_RAMP: &[u8] = b".:-=+*#%@";

// ============================================================================
// Stability Tracking
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowActivity {
    /// Fluid moved noticeably in a recent step.
    #[default]
    Flowing,
    /// Fluid has been calm long enough to call the grid settled.
    Settled,
}

#[derive(Debug, Clone, Default)]
pub struct StabilityTracker {
    pub state: FlowActivity,
    pub calm_steps: u32,
}

impl StabilityTracker {
    /// Feeds one step's counters. Returns true when the state changed.
    pub fn record(&mut self, stats: &FlowStepStats) -> bool {
        let calm = stats.volume_moved <= CALM_VOLUME_THRESHOLD;
        let previous = self.state;

        if calm {
            self.calm_steps = self.calm_steps.saturating_add(1);
            if self.calm_steps >= MIN_CALM_STEPS_TO_SETTLE {
                self.state = FlowActivity::Settled;
            }
        } else {
            self.calm_steps = 0;
            self.state = FlowActivity::Flowing;
        }

        previous != self.state
    }

    pub fn is_settled(&self) -> bool {
        self.state == FlowActivity::Settled
    }
}

// ============================================================================
// Telemetry Resource
// ============================================================================

/// Aggregate readout of the grid after the most recent step.
#[derive(Resource, Debug, Clone, Default)]
pub struct FluidTelemetry {
    pub steps: u64,
    pub last_step: FlowStepStats,
    pub total_volume: f32,
    pub wet_cells: usize,
    pub frozen_cells: usize,
    pub blocked_cells: usize,
    pub max_depth: f32,
    pub stability: StabilityTracker,
}

impl FluidTelemetry {
    /// Samples the grid after a step.
    pub fn observe(&mut self, grid: &FluidGrid, stats: FlowStepStats) {
        self.steps += 1;
        self.last_step = stats;

        let summary = GridSummary::of(grid);
        self.total_volume = summary.total_volume;
        self.wet_cells = summary.wet_cells;
        self.frozen_cells = summary.frozen_cells;
        self.blocked_cells = summary.blocked_cells;
        self.max_depth = summary.max_depth;

        if self.stability.record(&stats) {
            log::debug!(
                "[FLUID TELEMETRY] Grid is now {:?} after {} steps",
                self.stability.state,
                self.steps
            );
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "Fluid: {:.1} volume, {} wet cells, max depth {:.1}, {} frozen, {} blocked, {:?}",
            self.total_volume,
            self.wet_cells,
            self.max_depth,
            self.frozen_cells,
            self.blocked_cells,
            self.stability.state
        )
    }
}

/// One pass over the grid collecting aggregate counts.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GridSummary {
    pub total_volume: f32,
    pub wet_cells: usize,
    pub frozen_cells: usize,
    pub blocked_cells: usize,
    pub max_depth: f32,
}

impl GridSummary {
    pub fn of(grid: &FluidGrid) -> Self {
        let mut summary = Self::default();
        let mut total = 0.0f64;
        for cell in grid.cells() {
            total += cell.fluid_volume() as f64;
            if cell.is_wet() {
                summary.wet_cells += 1;
            }
            if cell.is_frozen() {
                summary.frozen_cells += 1;
            }
            if cell.is_blocked() {
                summary.blocked_cells += 1;
            }
            summary.max_depth = summary.max_depth.max(cell.fluid_volume());
        }
        summary.total_volume = total as f32;
        summary
    }
}

// ============================================================================
// Debug Overlay
// ============================================================================

/// Box drawn over one wet cell by a debug renderer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DebugCellBox {
    pub center: Vec3,
    pub half_extents: Vec3,
    /// RGBA, blue when shallow shading to red when deep.
    pub color: [u8; 4],
}

/// Color for a fluid depth: blue at zero, red at [`OVERLAY_MAX_DEPTH`].
pub fn depth_color(depth: f32) -> [u8; 4] {
    let t = (depth / OVERLAY_MAX_DEPTH).clamp(0.0, 1.0);
    [
        (t * 255.0).round() as u8,
        0,
        ((1.0 - t) * 255.0).round() as u8,
        OVERLAY_ALPHA,
    ]
}

/// Boxes for every cell holding fluid, sized by depth.
pub fn debug_boxes(grid: &FluidGrid) -> Vec<DebugCellBox> {
    let half_width = grid.cell_size() * OVERLAY_FOOTPRINT;
    grid.cells()
        .iter()
        .enumerate()
        .filter(|(_, cell)| cell.fluid_volume() >= MIN_FLUID_VOLUME)
        .map(|(index, cell)| {
            let coords = grid.mapper().index_to_cell(index);
            let base = grid.cell_to_world(coords.x, coords.y);
            let half_height = (cell.fluid_volume() * 0.5).max(1.0);
            DebugCellBox {
                center: Vec3::new(base.x, cell.terrain_height() + half_height, base.z),
                half_extents: Vec3::new(half_width, half_height, half_width),
                color: depth_color(cell.fluid_volume()),
            }
        })
        .collect()
}

// ============================================================================
// Renderer Export
// ============================================================================

/// Surface heights in row-major order, one per cell. Matches the layout of a
/// single-channel height texture.
pub fn surface_heights(grid: &FluidGrid) -> Vec<f32> {
    grid.cells().iter().map(|c| c.surface_height()).collect()
}

/// Per-cell `[velocity.x, velocity.y, depth, 1.0]`, matching an RGBA flow
/// texture.
pub fn flow_field(grid: &FluidGrid) -> Vec<[f32; 4]> {
    grid.cells()
        .iter()
        .map(|c| {
            let v = c.flow_velocity();
            [v.x, v.y, c.fluid_volume(), 1.0]
        })
        .collect()
}

/// Downsampled text picture of fluid depth, one row per line. Blocked cells
/// print as `|`, frozen cells as `~`, dry cells as a space.
pub fn ascii_depth_map(grid: &FluidGrid, stride: usize) -> String {
    let stride = stride.max(1);
    let size = grid.size();
    let mut out = String::with_capacity((size / stride + 1) * (size / stride + 1));

    for y in (0..size).step_by(stride) {
        for x in (0..size).step_by(stride) {
            let Some(cell) = grid.cell(x as i32, y as i32) else {
                continue;
            };
            let glyph = if cell.is_blocked() {
                '|'
            } else if cell.is_frozen() {
                '~'
            } else if !cell.is_wet() {
                ' '
            } else {
                let t = (cell.fluid_volume() / OVERLAY_MAX_DEPTH).clamp(0.0, 1.0);
                let slot = (t * (DEPTH_RAMP.len() - 1) as f32).round() as usize;
                DEPTH_RAMP[slot] as char
            };
            out.push(glyph);
        }
        out.push('\n');
    }
    out
}
