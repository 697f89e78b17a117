//! Cell enumeration for radius-based effects.
//!
//! Every radius operation on the grid selects cells the same way: take the
//! square of cells `ceil(radius / cell_size)` around the cell under the
//! center, clipped to the grid, then keep those whose center lies within
//! `radius` on the horizontal plane.

use bevy::math::{Vec2, Vec3};

use super::coords::{horizontal, GridMapper};

/// A cell selected by a radius query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellInRadius {
    pub x: i32,
    pub y: i32,
    pub index: usize,
    /// Horizontal distance from the query center to the cell center.
    pub distance: f32,
    /// Horizontal offset from the query center to the cell center.
    pub offset: Vec2,
}

impl CellInRadius {
    /// Linear falloff: 1 at the center, 0 at the rim.
    #[inline]
    pub fn falloff(&self, radius: f32) -> f32 {
        if radius > 0.0 {
            (1.0 - self.distance / radius).max(0.0)
        } else {
            1.0
        }
    }
}

/// Collects the cells whose centers lie within `radius` of `center`.
pub fn cells_in_radius(mapper: &GridMapper, center: Vec3, radius: f32) -> Vec<CellInRadius> {
    if !radius.is_finite() || radius < 0.0 {
        return Vec::new();
    }

    let center_2d = horizontal(center);
    let center_cell = mapper.world_to_cell(center);
    let radius_sq = radius * radius;

    // Clip the bounding square to the grid. Far-off centers saturate to the
    // i32 limits, so the bounds are computed in i64.
    let last = mapper.size() as i64 - 1;
    let reach = (radius / mapper.cell_size()).ceil() as i64;
    let span = |c: i32| {
        let c = c as i64;
        (c.saturating_sub(reach).max(0), c.saturating_add(reach).min(last))
    };
    let (min_x, max_x) = span(center_cell.x);
    let (min_y, max_y) = span(center_cell.y);

    let mut selected = Vec::new();
    for y in min_y..=max_y {
        for x in min_x..=max_x {
            let (x, y) = (x as i32, y as i32);
            let offset = mapper.cell_center(x, y) - center_2d;
            let distance_sq = offset.length_squared();
            if distance_sq > radius_sq {
                continue;
            }

            selected.push(CellInRadius {
                x,
                y,
                index: mapper.cell_index(x, y),
                distance: distance_sq.sqrt(),
                offset,
            });
        }
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapper() -> GridMapper {
        GridMapper::new(10, 10.0, Vec2::ZERO)
    }

    #[test]
    fn test_radius_selects_plus_shape() {
        let m = mapper();
        // Center of cell (5, 5); neighbors are exactly 10 away, diagonals ~14.1.
        let cells = cells_in_radius(&m, Vec3::new(55.0, 0.0, 55.0), 10.0);
        assert_eq!(cells.len(), 5);
        assert!(cells.iter().any(|c| c.x == 5 && c.y == 5 && c.distance == 0.0));
        assert!(cells.iter().all(|c| (c.x - 5).abs() + (c.y - 5).abs() <= 1));
    }

    #[test]
    fn test_radius_clips_to_grid() {
        let m = mapper();
        let cells = cells_in_radius(&m, Vec3::new(5.0, 0.0, 5.0), 25.0);
        assert!(cells.iter().all(|c| c.x >= 0 && c.y >= 0));
        assert!(cells.iter().any(|c| c.x == 2 && c.y == 0));
        assert!(!cells.is_empty());
    }

    #[test]
    fn test_radius_far_outside_grid_is_empty() {
        let m = mapper();
        assert!(cells_in_radius(&m, Vec3::new(-500.0, 0.0, -500.0), 50.0).is_empty());
    }

    #[test]
    fn test_invalid_radius_selects_nothing() {
        let m = mapper();
        assert!(cells_in_radius(&m, Vec3::new(55.0, 0.0, 55.0), -1.0).is_empty());
        assert!(cells_in_radius(&m, Vec3::new(55.0, 0.0, 55.0), f32::NAN).is_empty());
    }

    #[test]
    fn test_zero_radius_hits_exact_center_only() {
        let m = mapper();
        assert_eq!(cells_in_radius(&m, Vec3::new(55.0, 0.0, 55.0), 0.0).len(), 1);
        assert!(cells_in_radius(&m, Vec3::new(51.0, 0.0, 55.0), 0.0).is_empty());
    }

    #[test]
    fn test_falloff_is_linear() {
        let cell = CellInRadius {
            x: 0,
            y: 0,
            index: 0,
            distance: 25.0,
            offset: Vec2::new(25.0, 0.0),
        };
        assert!((cell.falloff(100.0) - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_far_off_grid_center_selects_nothing() {
        let m = mapper();
        assert!(cells_in_radius(&m, Vec3::new(1.0e12, 0.0, 0.0), 10.0).is_empty());
        assert!(cells_in_radius(&m, Vec3::new(-1.0e12, 0.0, -1.0e12), 10.0).is_empty());
    }

    #[test]
    fn test_huge_radius_selects_whole_grid_once() {
        let m = mapper();
        let cells = cells_in_radius(&m, Vec3::new(40.0, 0.0, 40.0), 1.0e6);
        assert_eq!(cells.len(), m.cell_count());

        let mut indices: Vec<usize> = cells.iter().map(|c| c.index).collect();
        indices.sort_unstable();
        indices.dedup();
        assert_eq!(indices.len(), m.cell_count());

        assert_eq!(
            cells_in_radius(&m, Vec3::new(40.0, 0.0, 40.0), f32::MAX).len(),
            m.cell_count()
        );
    }

    #[test]
    fn test_huge_radius_from_far_away_reaches_grid() {
        let m = mapper();
        let cells = cells_in_radius(&m, Vec3::new(1.0e12, 0.0, 50.0), f32::MAX);
        assert_eq!(cells.len(), m.cell_count());
    }
}
