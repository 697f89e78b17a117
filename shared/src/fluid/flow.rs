//! Per-tick lateral flow of the fluid heightfield.
//!
//! Fluid moves between orthogonal neighbors according to the difference in
//! their surface heights. The step is split into a compute pass that only
//! writes the delta buffer and an apply pass that commits it, so the result
//! does not depend on the order cells are visited in.
//!
//! ## Design Principles
//! - Flow is driven by surface height differences
//! - Volume is conserved: a cell never sends more than it holds
//! - A single transfer never exceeds a fixed fraction of the difference,
//!   which keeps neighbors from overshooting each other
//! - Frozen and blocked cells take no part in flow
//!
//! ## Algorithm
//! For each wet, unfrozen, unblocked cell we compute a tentative transfer to
//! each lower, open neighbor (`min(diff * flow_rate, diff * clamp)`). If the
//! transfers add up to more than the cell's volume they are scaled down to
//! exactly the volume. Transfers are accumulated, then applied to every cell
//! with a floor at zero.

use bevy::math::IVec2;

use super::grid::FluidGrid;

/// Orthogonal neighbor offsets in visiting order: +x, -x, +y, -y.
pub const LATERAL_NEIGHBORS: [IVec2; 4] = [
    IVec2::new(1, 0),
    IVec2::new(-1, 0),
    IVec2::new(0, 1),
    IVec2::new(0, -1),
];

/// Counters for one flow step.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FlowStepStats {
    /// Cells that were allowed to emit fluid.
    pub active_cells: usize,
    /// Individual neighbor transfers recorded.
    pub transfers: usize,
    /// Cells whose outflow had to be scaled down to their volume.
    pub clamped_cells: usize,
    /// Total volume that changed cells this step.
    pub volume_moved: f32,
}

impl FlowStepStats {
    /// Returns true if nothing moved this step.
    pub fn is_idle(&self) -> bool {
        self.transfers == 0
    }
}

impl FluidGrid {
    /// Advances the simulation by one fixed step.
    pub fn step(&mut self) -> FlowStepStats {
        let size = self.size() as i32;
        let flow_rate = self.config().flow_rate;
        let clamp = self.config().oscillation_clamp;
        let mut stats = FlowStepStats::default();

        let mut deltas = std::mem::take(&mut self.deltas);
        deltas.iter_mut().for_each(|d| *d = 0.0);

        {
            let cells = self.cells();
            let mut outflows = [(0usize, 0.0f32); 4];

            for y in 0..size {
                for x in 0..size {
                    let index = (y * size + x) as usize;
                    let cell = &cells[index];
                    if !cell.can_emit() {
                        continue;
                    }
                    stats.active_cells += 1;

                    let surface = cell.surface_height();
                    let mut count = 0;
                    let mut total = 0.0f32;

                    for offset in LATERAL_NEIGHBORS {
                        let nx = x + offset.x;
                        let ny = y + offset.y;
                        if nx < 0 || ny < 0 || nx >= size || ny >= size {
                            continue;
                        }
                        let neighbor_index = (ny * size + nx) as usize;
                        let neighbor = &cells[neighbor_index];
                        if !neighbor.can_receive() {
                            continue;
                        }

                        let diff = surface - neighbor.surface_height();
                        if diff <= 0.0 {
                            continue;
                        }

                        let transfer = (diff * flow_rate).min(diff * clamp);
                        outflows[count] = (neighbor_index, transfer);
                        count += 1;
                        total += transfer;
                    }

                    if count == 0 || total <= 0.0 {
                        continue;
                    }

                    let volume = cell.fluid_volume();
                    if total > volume {
                        let scale = volume / total;
                        for (_, transfer) in outflows[..count].iter_mut() {
                            *transfer *= scale;
                        }
                        total = volume;
                        stats.clamped_cells += 1;
                    }

                    deltas[index] -= total;
                    for &(neighbor_index, transfer) in &outflows[..count] {
                        deltas[neighbor_index] += transfer;
                    }
                    stats.transfers += count;
                    stats.volume_moved += total;
                }
            }
        }

        for (cell, delta) in self.cells_mut().iter_mut().zip(deltas.iter()) {
            if *delta != 0.0 {
                let volume = cell.fluid_volume() + delta;
                cell.set_fluid_volume(volume);
            }
        }
        self.deltas = deltas;

        log::trace!(
            "[FLUID STEP] {} active cells, {} transfers, {} clamped, {:.3} moved",
            stats.active_cells,
            stats.transfers,
            stats.clamped_cells,
            stats.volume_moved
        );

        stats
    }
}
