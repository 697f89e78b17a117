//! World position to grid cell mapping.
//!
//! The grid lies on the horizontal X/Z plane. Grid `x` follows world X, grid
//! `y` follows world Z, and world Y is height.

use bevy::math::{IVec2, Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Affine map between world space and cell coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridMapper {
    size: usize,
    cell_size: f32,
    origin: Vec2,
}

impl GridMapper {
    pub fn new(size: usize, cell_size: f32, origin: Vec2) -> Self {
        Self {
            size,
            cell_size,
            origin,
        }
    }

    /// Mapper whose grid is centered on the world origin.
    pub fn centered(size: usize, cell_size: f32) -> Self {
        Self::new(size, cell_size, centered_origin(size, cell_size))
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    #[inline]
    pub fn origin(&self) -> Vec2 {
        self.origin
    }

    /// Number of cells in the grid.
    #[inline]
    pub fn cell_count(&self) -> usize {
        self.size * self.size
    }

    /// Cell containing `world_pos`. May lie outside the grid.
    pub fn world_to_cell(&self, world_pos: Vec3) -> IVec2 {
        let local = (horizontal(world_pos) - self.origin) / self.cell_size;
        IVec2::new(local.x.floor() as i32, local.y.floor() as i32)
    }

    /// World-space center of a cell, at height zero.
    pub fn cell_to_world(&self, x: i32, y: i32) -> Vec3 {
        let center = self.cell_center(x, y);
        Vec3::new(center.x, 0.0, center.y)
    }

    /// Horizontal center of a cell.
    #[inline]
    pub fn cell_center(&self, x: i32, y: i32) -> Vec2 {
        self.origin + (Vec2::new(x as f32, y as f32) + Vec2::splat(0.5)) * self.cell_size
    }

    #[inline]
    pub fn is_valid_cell(&self, x: i32, y: i32) -> bool {
        let n = self.size as i64;
        (0..n).contains(&(x as i64)) && (0..n).contains(&(y as i64))
    }

    /// Flat row-major index of a cell.
    ///
    /// # Panics
    /// Panics if the coordinates lie outside the grid.
    #[inline]
    pub fn cell_index(&self, x: i32, y: i32) -> usize {
        assert!(
            self.is_valid_cell(x, y),
            "cell ({x}, {y}) outside {n}x{n} grid",
            n = self.size
        );
        y as usize * self.size + x as usize
    }

    /// Inverse of [`cell_index`](Self::cell_index).
    #[inline]
    pub fn index_to_cell(&self, index: usize) -> IVec2 {
        IVec2::new((index % self.size) as i32, (index / self.size) as i32)
    }
}

/// Origin that puts the grid's center on the world origin.
pub fn centered_origin(size: usize, cell_size: f32) -> Vec2 {
    Vec2::splat(-(size as f32) * cell_size * 0.5)
}

/// Projects a world position onto the grid plane.
#[inline]
pub fn horizontal(world_pos: Vec3) -> Vec2 {
    Vec2::new(world_pos.x, world_pos.z)
}
