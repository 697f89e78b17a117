//! The fluid grid store and its spatial API.
//!
//! `FluidGrid` owns every cell and the per-step delta buffer. It is the only
//! writer of cell state: sources, towers, the player and the flow step all go
//! through the methods here. Invalid coordinates and non-positive amounts are
//! silent no-ops so gameplay callers never need error handling.

use bevy::prelude::*;

use super::cell::FluidCell;
use super::config::FluidConfig;
use super::coords::GridMapper;
use super::radius::{cells_in_radius, CellInRadius};

#[derive(Resource, Debug, Clone)]
pub struct FluidGrid {
    config: FluidConfig,
    mapper: GridMapper,
    cells: Vec<FluidCell>,
    /// Net volume change per cell for the step in progress.
    pub(crate) deltas: Vec<f32>,
    terrain_baked: bool,
}

impl Default for FluidGrid {
    fn default() -> Self {
        Self::new(FluidConfig::default())
    }
}

impl FluidGrid {
    /// Allocates a dry, flat grid. The grid is never resized afterwards.
    pub fn new(config: FluidConfig) -> Self {
        let mapper = config.mapper();
        let count = mapper.cell_count();
        Self {
            config,
            mapper,
            cells: vec![FluidCell::default(); count],
            deltas: vec![0.0; count],
            terrain_baked: false,
        }
    }

    #[inline]
    pub fn config(&self) -> &FluidConfig {
        &self.config
    }

    #[inline]
    pub fn mapper(&self) -> &GridMapper {
        &self.mapper
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.mapper.size()
    }

    #[inline]
    pub fn cell_size(&self) -> f32 {
        self.mapper.cell_size()
    }

    /// Read-only view of every cell in row-major order.
    #[inline]
    pub fn cells(&self) -> &[FluidCell] {
        &self.cells
    }

    pub(crate) fn cells_mut(&mut self) -> &mut [FluidCell] {
        &mut self.cells
    }

    pub fn cell(&self, x: i32, y: i32) -> Option<&FluidCell> {
        if self.mapper.is_valid_cell(x, y) {
            Some(&self.cells[self.mapper.cell_index(x, y)])
        } else {
            None
        }
    }

    fn cell_mut(&mut self, x: i32, y: i32) -> Option<&mut FluidCell> {
        if self.mapper.is_valid_cell(x, y) {
            let index = self.mapper.cell_index(x, y);
            Some(&mut self.cells[index])
        } else {
            None
        }
    }

    /// Cell under a world position, if it lies on the grid.
    pub fn cell_at(&self, world_pos: Vec3) -> Option<&FluidCell> {
        let cell = self.mapper.world_to_cell(world_pos);
        self.cell(cell.x, cell.y)
    }

    #[inline]
    pub fn world_to_cell(&self, world_pos: Vec3) -> IVec2 {
        self.mapper.world_to_cell(world_pos)
    }

    #[inline]
    pub fn cell_to_world(&self, x: i32, y: i32) -> Vec3 {
        self.mapper.cell_to_world(x, y)
    }

    #[inline]
    pub fn is_valid_cell(&self, x: i32, y: i32) -> bool {
        self.mapper.is_valid_cell(x, y)
    }

    #[inline]
    pub fn cell_index(&self, x: i32, y: i32) -> usize {
        self.mapper.cell_index(x, y)
    }

    pub fn is_terrain_baked(&self) -> bool {
        self.terrain_baked
    }

    pub(crate) fn mark_terrain_baked(&mut self) {
        self.terrain_baked = true;
    }

    /// Overwrites the terrain height of one cell. Used by baking and tests.
    pub(crate) fn set_terrain_height(&mut self, x: i32, y: i32, height: f32) {
        if let Some(cell) = self.cell_mut(x, y) {
            cell.set_terrain_height(height);
        }
    }

    /// Fluid surface height at a world position, or 0 off the grid.
    pub fn height_at(&self, world_pos: Vec3) -> f32 {
        self.cell_at(world_pos)
            .map(FluidCell::surface_height)
            .unwrap_or(0.0)
    }

    /// Fluid depth at a world position, or 0 off the grid.
    pub fn depth_at(&self, world_pos: Vec3) -> f32 {
        self.cell_at(world_pos)
            .map(FluidCell::fluid_volume)
            .unwrap_or(0.0)
    }

    /// Adds fluid to a single cell.
    pub fn add_volume(&mut self, x: i32, y: i32, amount: f32) {
        if amount.is_nan() || amount <= 0.0 {
            return;
        }
        if let Some(cell) = self.cell_mut(x, y) {
            let volume = cell.fluid_volume() + amount;
            cell.set_fluid_volume(volume);
        }
    }

    /// Removes up to `amount` of fluid from the wet cells within `radius`,
    /// taking the same fraction from each cell.
    pub fn remove_in_radius(&mut self, world_pos: Vec3, radius: f32, amount: f32) {
        if amount.is_nan() || amount <= 0.0 {
            return;
        }

        let wet: Vec<CellInRadius> = cells_in_radius(&self.mapper, world_pos, radius)
            .into_iter()
            .filter(|c| self.cells[c.index].fluid_volume() > 0.0)
            .collect();

        let total: f32 = wet.iter().map(|c| self.cells[c.index].fluid_volume()).sum();
        if total <= 0.0 {
            return;
        }

        let keep = 1.0 - (amount / total).min(1.0);
        for c in &wet {
            let cell = &mut self.cells[c.index];
            let volume = cell.fluid_volume() * keep;
            cell.set_fluid_volume(volume);
        }

        log::trace!(
            "[FLUID GRID] Removed {:.2} of {:.2} across {} cells",
            total.min(amount),
            total,
            wet.len()
        );
    }

    /// Pushes a uniform force with linear falloff onto wet cells.
    pub fn apply_force(&mut self, center: Vec3, radius: f32, force: Vec2) {
        for c in cells_in_radius(&self.mapper, center, radius) {
            let falloff = c.falloff(radius);
            let cell = &mut self.cells[c.index];
            if !cell.is_wet() {
                continue;
            }
            cell.add_flow_velocity(force * falloff);
        }
    }

    /// Pushes wet cells away from `center` with linear falloff.
    pub fn apply_radial_force(&mut self, center: Vec3, radius: f32, strength: f32) {
        for c in cells_in_radius(&self.mapper, center, radius) {
            let falloff = c.falloff(radius);
            let cell = &mut self.cells[c.index];
            if !cell.is_wet() {
                continue;
            }
            cell.add_flow_velocity(c.offset.normalize_or_zero() * strength * falloff);
        }
    }

    /// Sets or clears the frozen flag on every cell within `radius`.
    /// Returns the number of cells touched.
    pub fn set_frozen(&mut self, center: Vec3, radius: f32, frozen: bool) -> usize {
        let cells = cells_in_radius(&self.mapper, center, radius);
        for c in &cells {
            self.cells[c.index].set_frozen(frozen);
        }
        cells.len()
    }

    /// Marks a single cell as an impassable barrier, or clears it.
    pub fn set_blocked(&mut self, x: i32, y: i32, blocked: bool) {
        if let Some(cell) = self.cell_mut(x, y) {
            cell.set_blocked(blocked);
        }
    }

    /// Sum of all fluid on the grid.
    pub fn total_volume(&self) -> f32 {
        self.cells
            .iter()
            .map(|cell| cell.fluid_volume() as f64)
            .sum::<f64>() as f32
    }

    /// Sum of fluid within `radius` of a world position.
    pub fn volume_in_radius(&self, center: Vec3, radius: f32) -> f32 {
        cells_in_radius(&self.mapper, center, radius)
            .iter()
            .map(|c| self.cells[c.index].fluid_volume())
            .sum()
    }
}
