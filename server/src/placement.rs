//! Tower placement rules.
//!
//! Placement snaps to the center of the cell under the requested point and
//! sits on the baked terrain. A site is rejected when it lies off the grid,
//! the tower is unaffordable, the ground is too steep, the cell is already
//! walled off, or too much fluid is standing there.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use siege_shared::fluid::FluidGrid;
use thiserror::Error;

use crate::economy::ResourceLedger;
use crate::towers::TowerKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementRules {
    /// Deepest fluid a tower may be built in.
    pub max_fluid_for_placement: f32,
    /// Minimum dot product between the ground normal and straight up.
    pub min_slope_dot: f32,
}

impl Default for PlacementRules {
    fn default() -> Self {
        Self {
            max_fluid_for_placement: 5.0,
            min_slope_dot: 0.87,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PlacementError {
    #[error("site is outside the grid")]
    OutOfBounds,
    #[error("not enough currency")]
    Unaffordable,
    #[error("ground is too steep")]
    TooSteep,
    #[error("site is flooded")]
    Flooded,
    #[error("site is blocked")]
    Blocked,
}

/// Checks a site and returns the snapped build position.
pub fn validate_placement(
    grid: &FluidGrid,
    rules: &PlacementRules,
    ledger: &ResourceLedger,
    kind: TowerKind,
    position: Vec3,
) -> Result<Vec3, PlacementError> {
    let coords = grid.world_to_cell(position);
    let cell = grid
        .cell(coords.x, coords.y)
        .ok_or(PlacementError::OutOfBounds)?;

    if !ledger.can_afford(kind.stats().build_cost) {
        return Err(PlacementError::Unaffordable);
    }
    if terrain_normal(grid, coords).dot(Vec3::Y) < rules.min_slope_dot {
        return Err(PlacementError::TooSteep);
    }
    if cell.fluid_volume() > rules.max_fluid_for_placement {
        return Err(PlacementError::Flooded);
    }
    if cell.is_blocked() {
        return Err(PlacementError::Blocked);
    }

    let center = grid.cell_to_world(coords.x, coords.y);
    Ok(Vec3::new(center.x, cell.terrain_height(), center.z))
}

/// Ground normal at a cell from central differences of baked terrain.
/// Falls back to one-sided differences at the grid edge.
pub fn terrain_normal(grid: &FluidGrid, coords: IVec2) -> Vec3 {
    let height = |x: i32, y: i32| grid.cell(x, y).map(|c| c.terrain_height());
    let Some(here) = height(coords.x, coords.y) else {
        return Vec3::Y;
    };

    let slope = |minus: Option<f32>, plus: Option<f32>| -> f32 {
        let cell = grid.cell_size();
        match (minus, plus) {
            (Some(m), Some(p)) => (p - m) / (2.0 * cell),
            (None, Some(p)) => (p - here) / cell,
            (Some(m), None) => (here - m) / cell,
            (None, None) => 0.0,
        }
    };

    let dx = slope(
        height(coords.x - 1, coords.y),
        height(coords.x + 1, coords.y),
    );
    let dz = slope(
        height(coords.x, coords.y - 1),
        height(coords.x, coords.y + 1),
    );
    Vec3::new(-dx, 1.0, -dz).normalize()
}
