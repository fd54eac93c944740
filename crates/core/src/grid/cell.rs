//! Grid index space: cells, tiles and index windows
//!
//! Latitude never wraps (it clamps at the poles). Longitude wraps around the
//! seam of a global grid unless the boundary is configured as clamped.

use crate::vegetation::VegType;
use std::fmt;
use std::ops::RangeInclusive;

/// A grid point, addressed by (latitude index, longitude index)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cell {
    /// Latitude index (0 = southernmost row)
    pub lat: usize,
    /// Longitude index
    pub lon: usize,
}

impl Cell {
    /// Create a cell from its indices
    #[must_use]
    pub const fn new(lat: usize, lon: usize) -> Self {
        Self { lat, lon }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(lat={}, lon={})", self.lat, self.lon)
    }
}

/// A vegetation slot within a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tile {
    /// Cell holding the tile
    pub cell: Cell,
    /// Vegetation type occupying the slot
    pub veg: VegType,
}

impl Tile {
    /// Create a tile
    #[must_use]
    pub const fn new(cell: Cell, veg: VegType) -> Self {
        Self { cell, veg }
    }
}

/// Behaviour of longitude windows at the grid seam
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LongitudeBoundary {
    /// Indices wrap cyclically (closed band around the globe)
    #[default]
    Periodic,
    /// Indices clamp at the first and last column
    Clamped,
}

impl LongitudeBoundary {
    /// Map a boolean `longitude_wrap` setting to a boundary rule
    #[must_use]
    pub const fn from_wrap(wrap: bool) -> Self {
        if wrap {
            Self::Periodic
        } else {
            Self::Clamped
        }
    }

    /// Longitude indices within `radius` of `center`, each listed once
    ///
    /// Indices are ordered west to east starting from the western edge of the
    /// window. A periodic window wider than the grid covers every column.
    #[must_use]
    pub fn window(self, center: usize, radius: usize, n_lon: usize) -> Vec<usize> {
        if n_lon == 0 {
            return Vec::new();
        }

        match self {
            Self::Periodic => {
                if 2 * radius + 1 >= n_lon {
                    return (0..n_lon).collect();
                }
                let start = (center + n_lon - radius % n_lon) % n_lon;
                (0..=2 * radius).map(|k| (start + k) % n_lon).collect()
            }
            Self::Clamped => clamped_range(center, radius, n_lon).collect(),
        }
    }
}

/// Latitude indices within `radius` of `center`, clamped to the grid
#[must_use]
pub fn latitude_window(center: usize, radius: usize, n_lat: usize) -> RangeInclusive<usize> {
    clamped_range(center, radius, n_lat)
}

fn clamped_range(center: usize, radius: usize, len: usize) -> RangeInclusive<usize> {
    let lo = center.saturating_sub(radius);
    let hi = center.saturating_add(radius).min(len.saturating_sub(1));
    lo..=hi
}

/// Horizontal extent of a grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridShape {
    /// Number of latitude rows
    pub n_lat: usize,
    /// Number of longitude columns
    pub n_lon: usize,
}

impl GridShape {
    /// Create a grid shape
    #[must_use]
    pub const fn new(n_lat: usize, n_lon: usize) -> Self {
        Self { n_lat, n_lon }
    }

    /// Number of cells
    #[must_use]
    pub const fn cell_count(&self) -> usize {
        self.n_lat * self.n_lon
    }

    /// Row-major offset of a cell within one (lat, lon) plane
    #[inline]
    #[must_use]
    pub const fn offset(&self, cell: Cell) -> usize {
        cell.lat * self.n_lon + cell.lon
    }

    /// Cell at a row-major offset
    #[inline]
    #[must_use]
    pub const fn cell_at(&self, offset: usize) -> Cell {
        Cell::new(offset / self.n_lon, offset % self.n_lon)
    }

    /// Whether the cell lies inside the grid
    #[must_use]
    pub const fn contains(&self, cell: Cell) -> bool {
        cell.lat < self.n_lat && cell.lon < self.n_lon
    }

    /// All cells in row-major order
    pub fn cells(&self) -> impl Iterator<Item = Cell> {
        let n_lon = self.n_lon;
        (0..self.n_lat).flat_map(move |lat| (0..n_lon).map(move |lon| Cell::new(lat, lon)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_periodic_window_wraps_at_seam() {
        let cols = LongitudeBoundary::Periodic.window(0, 2, 10);
        assert_eq!(cols, vec![8, 9, 0, 1, 2]);

        let cols = LongitudeBoundary::Periodic.window(9, 1, 10);
        assert_eq!(cols, vec![8, 9, 0]);
    }

    #[test]
    fn test_periodic_window_wider_than_grid_lists_each_column_once() {
        let cols = LongitudeBoundary::Periodic.window(1, 3, 4);
        assert_eq!(cols, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_clamped_window_stops_at_edges() {
        assert_eq!(LongitudeBoundary::Clamped.window(0, 2, 10), vec![0, 1, 2]);
        assert_eq!(LongitudeBoundary::Clamped.window(9, 2, 10), vec![7, 8, 9]);
    }

    #[test]
    fn test_latitude_window_clamps_at_poles() {
        assert_eq!(latitude_window(1, 3, 6), 0..=4);
        assert_eq!(latitude_window(5, 3, 6), 2..=5);
        assert_eq!(latitude_window(2, 0, 6), 2..=2);
    }

    #[test]
    fn test_grid_offsets_round_trip() {
        let shape = GridShape::new(3, 4);
        assert_eq!(shape.cell_count(), 12);
        assert_eq!(shape.offset(Cell::new(2, 1)), 9);
        assert_eq!(shape.cell_at(9), Cell::new(2, 1));
        assert_eq!(shape.cells().count(), 12);
        assert!(!shape.contains(Cell::new(3, 0)));
    }
}
