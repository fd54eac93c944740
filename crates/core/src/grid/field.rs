//! Tiled value arrays
//!
//! Stores one value per (tile slot, cell) as a flat `Vec<f64>` in
//! `(veg, lat, lon)` order, matching the layout of restart tile fields.

use super::cell::{Cell, GridShape};
use crate::error::{RemapError, Result};
use crate::store::NamedArray;
use crate::vegetation::VegType;

/// Axis names of a tiled array
pub const TILED_DIMS: [&str; 3] = ["veg", "lat", "lon"];

/// Field values indexed by tile slot and cell
#[derive(Debug, Clone, PartialEq)]
pub struct TiledField {
    data: Vec<f64>,
    tile_count: usize,
    shape: GridShape,
}

impl TiledField {
    /// Create a field filled with `value`
    #[must_use]
    pub fn with_value(tile_count: usize, shape: GridShape, value: f64) -> Self {
        Self {
            data: vec![value; tile_count * shape.cell_count()],
            tile_count,
            shape,
        }
    }

    /// Wrap existing `(veg, lat, lon)` data
    ///
    /// # Errors
    /// Returns [`RemapError::Shape`] if the data length does not match.
    pub fn from_vec(tile_count: usize, shape: GridShape, data: Vec<f64>) -> Result<Self> {
        let expected = tile_count * shape.cell_count();
        if data.len() != expected {
            return Err(RemapError::shape(format!(
                "tiled field needs {tile_count}x{}x{} = {expected} values, got {}",
                shape.n_lat,
                shape.n_lon,
                data.len()
            )));
        }
        Ok(Self {
            data,
            tile_count,
            shape,
        })
    }

    /// Build from a store array, checking it against the grid
    ///
    /// # Arguments
    /// * `name` - field name, used in error messages
    /// * `array` - store array of shape `(tile_count, n_lat, n_lon)`
    /// * `tile_count` - expected tile axis length
    /// * `shape` - expected horizontal extent
    ///
    /// # Errors
    /// Returns [`RemapError::Shape`] if the array is not `(veg, lat, lon)`
    /// with the expected lengths.
    pub fn from_named(
        name: &str,
        array: &NamedArray,
        tile_count: usize,
        shape: GridShape,
    ) -> Result<Self> {
        array.validate(name)?;

        let expected = [tile_count, shape.n_lat, shape.n_lon];
        if array.shape != expected {
            return Err(RemapError::shape(format!(
                "field '{name}' has shape {:?}, grid expects {:?}",
                array.shape, expected
            )));
        }
        if let Some(dims) = &array.dims {
            if dims.iter().map(String::as_str).ne(TILED_DIMS) {
                return Err(RemapError::shape(format!(
                    "field '{name}' has axes {dims:?}, expected {TILED_DIMS:?}"
                )));
            }
        }

        Self::from_vec(tile_count, shape, array.data.clone())
    }

    /// Convert into a store array with `(veg, lat, lon)` axis names
    #[must_use]
    pub fn into_named(self) -> NamedArray {
        NamedArray {
            shape: vec![self.tile_count, self.shape.n_lat, self.shape.n_lon],
            dims: Some(TILED_DIMS.iter().map(|d| (*d).to_string()).collect()),
            data: self.data,
        }
    }

    #[inline]
    fn index(&self, veg: VegType, cell: Cell) -> usize {
        debug_assert!(veg.index() < self.tile_count && self.shape.contains(cell));
        veg.index() * self.shape.cell_count() + self.shape.offset(cell)
    }

    /// Value at a tile slot
    #[inline]
    #[must_use]
    pub fn get(&self, veg: VegType, cell: Cell) -> f64 {
        self.data[self.index(veg, cell)]
    }

    /// Set the value at a tile slot
    #[inline]
    pub fn set(&mut self, veg: VegType, cell: Cell, value: f64) {
        let idx = self.index(veg, cell);
        self.data[idx] = value;
    }

    /// Number of tile slots per cell
    #[must_use]
    pub fn tile_count(&self) -> usize {
        self.tile_count
    }

    /// Horizontal extent
    #[must_use]
    pub fn shape(&self) -> GridShape {
        self.shape
    }

    /// Raw `(veg, lat, lon)` data
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_is_veg_major() {
        let shape = GridShape::new(2, 3);
        let data: Vec<f64> = (0..12).map(f64::from).collect();
        let field = TiledField::from_vec(2, shape, data).unwrap();

        assert_eq!(field.get(VegType::from_index(0), Cell::new(0, 0)), 0.0);
        assert_eq!(field.get(VegType::from_index(0), Cell::new(1, 2)), 5.0);
        assert_eq!(field.get(VegType::from_index(1), Cell::new(0, 1)), 7.0);
    }

    #[test]
    fn test_from_named_rejects_wrong_grid() {
        let array = NamedArray::new(vec![2, 2, 2], vec![0.0; 8]).unwrap();
        let err = TiledField::from_named("LAI", &array, 2, GridShape::new(2, 3)).unwrap_err();
        assert!(matches!(err, RemapError::Shape(msg) if msg.contains("LAI")));
    }

    #[test]
    fn test_from_named_rejects_transposed_axes() {
        let array = NamedArray::new(vec![2, 2, 2], vec![0.0; 8])
            .unwrap()
            .with_dims(["lat", "lon", "veg"]);
        assert!(TiledField::from_named("LAI", &array, 2, GridShape::new(2, 2)).is_err());
    }

    #[test]
    fn test_named_conversion_keeps_values() {
        let mut field = TiledField::with_value(3, GridShape::new(1, 2), 0.0);
        field.set(VegType::from_index(2), Cell::new(0, 1), 4.5);

        let named = field.clone().into_named();
        assert_eq!(named.shape, vec![3, 1, 2]);
        let back = TiledField::from_named("x", &named, 3, GridShape::new(1, 2)).unwrap();
        assert_eq!(back, field);
    }
}
