//! One-time terrain sampling.
//!
//! Before the first flow step every cell is given the height of the static
//! environment under its center. The environment is anything implementing
//! [`TerrainProbe`]; a miss leaves the cell at height zero.

use bevy::prelude::*;

use super::grid::FluidGrid;
use crate::constants::{TERRAIN_PROBE_BOTTOM, TERRAIN_PROBE_TOP};

/// A vertical line trace against static geometry.
pub trait TerrainProbe {
    /// Traces straight down from `start` to `end_height` and returns the
    /// height of the first surface hit.
    fn probe(&self, start: Vec3, end_height: f32) -> Option<f32>;
}

/// A horizontal plane at a fixed height.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatProbe {
    pub height: f32,
}

impl TerrainProbe for FlatProbe {
    fn probe(&self, start: Vec3, end_height: f32) -> Option<f32> {
        within_trace(self.height, start.y, end_height)
    }
}

/// Heightfield defined by a function of the horizontal position.
/// Returning `None` models a hole in the geometry.
pub struct HeightfieldProbe<F> {
    sample: F,
}

impl<F> HeightfieldProbe<F>
where
    F: Fn(Vec2) -> Option<f32>,
{
    pub fn new(sample: F) -> Self {
        Self { sample }
    }
}

impl<F> TerrainProbe for HeightfieldProbe<F>
where
    F: Fn(Vec2) -> Option<f32>,
{
    fn probe(&self, start: Vec3, end_height: f32) -> Option<f32> {
        let height = (self.sample)(Vec2::new(start.x, start.z))?;
        within_trace(height, start.y, end_height)
    }
}

fn within_trace(height: f32, top: f32, bottom: f32) -> Option<f32> {
    (height.is_finite() && height <= top && height >= bottom).then_some(height)
}

/// Result of a bake pass.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BakeReport {
    pub cells: usize,
    pub misses: usize,
    pub min_height: f32,
    pub max_height: f32,
}

impl FluidGrid {
    /// Samples the terrain height under every cell.
    ///
    /// Only the first call has any effect; the terrain is static for the
    /// lifetime of the grid.
    pub fn bake_terrain(&mut self, probe: &dyn TerrainProbe) -> Option<BakeReport> {
        if self.is_terrain_baked() {
            log::warn!("[TERRAIN BAKE] Terrain already baked, ignoring request");
            return None;
        }

        let size = self.size() as i32;
        let mut report = BakeReport {
            min_height: f32::INFINITY,
            max_height: f32::NEG_INFINITY,
            ..Default::default()
        };

        for y in 0..size {
            for x in 0..size {
                let center = self.cell_to_world(x, y);
                let start = Vec3::new(center.x, TERRAIN_PROBE_TOP, center.z);
                let height = match probe.probe(start, TERRAIN_PROBE_BOTTOM) {
                    Some(height) => height,
                    None => {
                        report.misses += 1;
                        0.0
                    }
                };
                self.set_terrain_height(x, y, height);
                report.cells += 1;
                report.min_height = report.min_height.min(height);
                report.max_height = report.max_height.max(height);
            }
        }

        self.mark_terrain_baked();
        log::debug!(
            "[TERRAIN BAKE] Baked {} cells ({} misses), heights {:.1}..{:.1}",
            report.cells,
            report.misses,
            report.min_height,
            report.max_height
        );
        Some(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fluid::test_support::small_grid;

    #[test]
    fn test_flat_probe_bakes_every_cell() {
        let mut grid = small_grid(4);
        let report = grid.bake_terrain(&FlatProbe { height: 25.0 }).unwrap();
        assert_eq!(report.cells, 16);
        assert_eq!(report.misses, 0);
        assert!(grid
            .cells()
            .iter()
            .all(|c| (c.terrain_height() - 25.0).abs() < 1e-6));
        assert!(grid.is_terrain_baked());
    }

    #[test]
    fn test_heightfield_samples_cell_centers() {
        let mut grid = small_grid(4);
        grid.bake_terrain(&HeightfieldProbe::new(|p: Vec2| Some(p.x + p.y)))
            .unwrap();
        // Cell (1, 2) is centered at (15, 25).
        assert!((grid.cell(1, 2).unwrap().terrain_height() - 40.0).abs() < 1e-5);
    }

    #[test]
    fn test_miss_defaults_to_zero() {
        let mut grid = small_grid(4);
        let probe = HeightfieldProbe::new(|p: Vec2| (p.x > 20.0).then_some(80.0));
        let report = grid.bake_terrain(&probe).unwrap();
        assert_eq!(report.misses, 8);
        assert_eq!(grid.cell(0, 0).unwrap().terrain_height(), 0.0);
        assert!((grid.cell(3, 0).unwrap().terrain_height() - 80.0).abs() < 1e-6);
    }

    #[test]
    fn test_geometry_outside_trace_is_missed() {
        let mut grid = small_grid(2);
        let report = grid.bake_terrain(&FlatProbe { height: 250_000.0 }).unwrap();
        assert_eq!(report.misses, 4);
        assert_eq!(grid.cell(1, 1).unwrap().terrain_height(), 0.0);
    }

    #[test]
    fn test_bake_runs_once() {
        let mut grid = small_grid(2);
        grid.bake_terrain(&FlatProbe { height: 10.0 }).unwrap();
        assert!(grid.bake_terrain(&FlatProbe { height: 99.0 }).is_none());
        assert!((grid.cell(0, 0).unwrap().terrain_height() - 10.0).abs() < 1e-6);
    }
}
