//! Vegetation fraction arrays and the old/new fraction grid
//!
//! Fraction data arrives with different axis orders: restart fractions are
//! laid out `(lat, lon, veg)` and new vegetation maps `(time, veg, lat, lon)`.
//! Both are normalised here, by explicit index permutation, to the
//! `(veg, lat, lon)` layout used by [`TiledField`](super::TiledField).

use super::cell::{Cell, GridShape};
use super::field::TILED_DIMS;
use crate::error::{RemapError, Result};
use crate::store::NamedArray;
use crate::vegetation::VegType;
use rayon::prelude::*;
use tracing::{debug, info};

/// Default axis order of old (restart) fraction arrays
pub const OLD_FRACTION_DIMS: [&str; 3] = ["lat", "lon", "veg"];

/// Default axis order of new fraction arrays carrying a time axis
pub const NEW_FRACTION_DIMS: [&str; 4] = ["time", "veg", "lat", "lon"];

/// Which vegetation distribution a query refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Distribution {
    /// Distribution the input field values are keyed to
    Old,
    /// Distribution the output must be valid for
    New,
}

/// Per-cell, per-type vegetation fractions in `(veg, lat, lon)` order
#[derive(Debug, Clone, PartialEq)]
pub struct FractionArray {
    data: Vec<f64>,
    tile_count: usize,
    shape: GridShape,
}

impl FractionArray {
    /// Wrap `(veg, lat, lon)` data
    ///
    /// # Errors
    /// Returns [`RemapError::Shape`] if the data length does not match.
    pub fn from_veg_lat_lon(tile_count: usize, shape: GridShape, data: Vec<f64>) -> Result<Self> {
        let expected = tile_count * shape.cell_count();
        if data.len() != expected {
            return Err(RemapError::shape(format!(
                "fraction array needs {expected} values for {tile_count} types on a {}x{} grid, got {}",
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

    /// Build from a store array, permuting its axes to `(veg, lat, lon)`
    ///
    /// The array's own `dims` take precedence over `default_dims`. A `time`
    /// axis is allowed; its first record is used.
    ///
    /// # Errors
    /// Returns [`RemapError::Shape`] if an axis is missing, unknown, repeated,
    /// or the time axis is empty.
    pub fn from_named(name: &str, array: &NamedArray, default_dims: &[&str]) -> Result<Self> {
        array.validate(name)?;

        let dims: Vec<&str> = match &array.dims {
            Some(dims) => dims.iter().map(String::as_str).collect(),
            None => default_dims.to_vec(),
        };
        if dims.len() != array.shape.len() {
            return Err(RemapError::shape(format!(
                "fraction array '{name}' is {}-dimensional but axes {dims:?} were assumed",
                array.shape.len()
            )));
        }

        // Row-major strides of the source array
        let mut strides = vec![1_usize; dims.len()];
        for axis in (0..dims.len().saturating_sub(1)).rev() {
            strides[axis] = strides[axis + 1] * array.shape[axis + 1];
        }

        let mut veg_axis = None;
        let mut lat_axis = None;
        let mut lon_axis = None;
        for (axis, dim) in dims.iter().enumerate() {
            let slot = match *dim {
                "veg" => &mut veg_axis,
                "lat" => &mut lat_axis,
                "lon" => &mut lon_axis,
                "time" => {
                    if array.shape[axis] == 0 {
                        return Err(RemapError::shape(format!(
                            "fraction array '{name}' has an empty time axis"
                        )));
                    }
                    continue;
                }
                other => {
                    return Err(RemapError::shape(format!(
                        "fraction array '{name}' has unknown axis '{other}'"
                    )))
                }
            };
            if slot.replace(axis).is_some() {
                return Err(RemapError::shape(format!(
                    "fraction array '{name}' repeats axis '{dim}'"
                )));
            }
        }

        let (Some(veg_axis), Some(lat_axis), Some(lon_axis)) = (veg_axis, lat_axis, lon_axis)
        else {
            return Err(RemapError::shape(format!(
                "fraction array '{name}' must have {TILED_DIMS:?} axes, found {dims:?}"
            )));
        };

        let tile_count = array.shape[veg_axis];
        let shape = GridShape::new(array.shape[lat_axis], array.shape[lon_axis]);

        let mut data = Vec::with_capacity(tile_count * shape.cell_count());
        for veg in 0..tile_count {
            for lat in 0..shape.n_lat {
                for lon in 0..shape.n_lon {
                    // Time axis (if any) stays at index 0
                    let src = veg * strides[veg_axis]
                        + lat * strides[lat_axis]
                        + lon * strides[lon_axis];
                    data.push(array.data[src]);
                }
            }
        }

        debug!(
            "Normalised fraction array '{}' from axes {:?} to {}x{}x{}",
            name, dims, tile_count, shape.n_lat, shape.n_lon
        );

        Self::from_veg_lat_lon(tile_count, shape, data)
    }

    /// Convert into a store array with `(veg, lat, lon)` axis names
    #[must_use]
    pub fn to_named(&self) -> NamedArray {
        NamedArray {
            shape: vec![self.tile_count, self.shape.n_lat, self.shape.n_lon],
            dims: Some(TILED_DIMS.iter().map(|d| (*d).to_string()).collect()),
            data: self.data.clone(),
        }
    }

    /// Fraction of `veg` at `cell`
    #[inline]
    #[must_use]
    pub fn fraction(&self, veg: VegType, cell: Cell) -> f64 {
        self.data[veg.index() * self.shape.cell_count() + self.shape.offset(cell)]
    }

    /// Whether `veg` occupies a non-zero fraction of `cell`
    ///
    /// Missing values (NaN) are never active.
    #[inline]
    #[must_use]
    pub fn is_active(&self, veg: VegType, cell: Cell) -> bool {
        self.fraction(veg, cell) > 0.0
    }

    /// Number of vegetation types
    #[must_use]
    pub fn tile_count(&self) -> usize {
        self.tile_count
    }

    /// Horizontal extent
    #[must_use]
    pub fn shape(&self) -> GridShape {
        self.shape
    }
}

/// Read-only view of the old and new vegetation distributions on one grid
#[derive(Debug, Clone)]
pub struct FractionGrid {
    old: FractionArray,
    new: FractionArray,
    land_cells: Vec<Cell>,
}

impl FractionGrid {
    /// Pair the old and new distributions
    ///
    /// # Errors
    /// Returns [`RemapError::Shape`] if the two arrays disagree on the number
    /// of vegetation types or on the latitude/longitude extents.
    pub fn new(old: FractionArray, new: FractionArray) -> Result<Self> {
        if old.shape != new.shape {
            return Err(RemapError::shape(format!(
                "old fractions are {}x{} (lat x lon) but new fractions are {}x{}",
                old.shape.n_lat, old.shape.n_lon, new.shape.n_lat, new.shape.n_lon
            )));
        }
        if old.tile_count != new.tile_count {
            return Err(RemapError::shape(format!(
                "old fractions have {} vegetation types but new fractions have {}",
                old.tile_count, new.tile_count
            )));
        }

        let shape = old.shape;
        let tile_count = old.tile_count;
        let land_cells: Vec<Cell> = (0..shape.cell_count())
            .into_par_iter()
            .map(|offset| shape.cell_at(offset))
            .filter(|&cell| {
                (0..tile_count).any(|v| {
                    let veg = VegType::from_index(v);
                    old.is_active(veg, cell) || new.is_active(veg, cell)
                })
            })
            .collect();

        info!(
            "Fraction grid: {}x{} cells, {} vegetation types, {} land cells",
            shape.n_lat,
            shape.n_lon,
            tile_count,
            land_cells.len()
        );

        Ok(Self {
            old,
            new,
            land_cells,
        })
    }

    fn array(&self, distribution: Distribution) -> &FractionArray {
        match distribution {
            Distribution::Old => &self.old,
            Distribution::New => &self.new,
        }
    }

    /// Fraction of `veg` at `cell` in the given distribution
    #[inline]
    #[must_use]
    pub fn fraction(&self, distribution: Distribution, cell: Cell, veg: VegType) -> f64 {
        self.array(distribution).fraction(veg, cell)
    }

    /// Whether `veg` is active at `cell` in the given distribution
    #[inline]
    #[must_use]
    pub fn is_active(&self, distribution: Distribution, cell: Cell, veg: VegType) -> bool {
        self.array(distribution).is_active(veg, cell)
    }

    /// Vegetation types with non-zero fraction at `cell`, in index order
    #[must_use]
    pub fn active_types(&self, distribution: Distribution, cell: Cell) -> Vec<VegType> {
        let array = self.array(distribution);
        self.veg_types()
            .filter(|&veg| array.is_active(veg, cell))
            .collect()
    }

    /// Whether `cell` has any non-zero fraction in the given distribution
    #[must_use]
    pub fn is_land(&self, distribution: Distribution, cell: Cell) -> bool {
        let array = self.array(distribution);
        self.veg_types().any(|veg| array.is_active(veg, cell))
    }

    /// Cells that are land in at least one distribution, in row-major order
    #[must_use]
    pub fn land_cells(&self) -> &[Cell] {
        &self.land_cells
    }

    /// All vegetation types on the tile axis
    pub fn veg_types(&self) -> impl Iterator<Item = VegType> {
        (0..self.old.tile_count).map(VegType::from_index)
    }

    /// Number of tile slots per cell
    #[must_use]
    pub fn tile_count(&self) -> usize {
        self.old.tile_count
    }

    /// Horizontal extent
    #[must_use]
    pub fn shape(&self) -> GridShape {
        self.old.shape
    }

    /// The new distribution, for writing back alongside remapped fields
    #[must_use]
    pub fn new_fractions(&self) -> &FractionArray {
        &self.new
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn array(tile_count: usize, n_lat: usize, n_lon: usize, data: Vec<f64>) -> FractionArray {
        FractionArray::from_veg_lat_lon(tile_count, GridShape::new(n_lat, n_lon), data).unwrap()
    }

    #[test]
    fn test_lat_lon_veg_is_permuted() {
        // 1 lat x 2 lon x 3 veg, values encode (lon, veg) as lon*10 + veg
        let named = NamedArray::new(vec![1, 2, 3], vec![0.0, 1.0, 2.0, 10.0, 11.0, 12.0]).unwrap();
        let fractions = FractionArray::from_named("frac", &named, &OLD_FRACTION_DIMS).unwrap();

        assert_eq!(fractions.tile_count(), 3);
        assert_eq!(fractions.shape(), GridShape::new(1, 2));
        assert_eq!(fractions.fraction(VegType::from_index(2), Cell::new(0, 1)), 12.0);
        assert_eq!(fractions.fraction(VegType::from_index(1), Cell::new(0, 0)), 1.0);
    }

    #[test]
    fn test_time_axis_uses_first_record() {
        // 2 time x 1 veg x 1 lat x 2 lon
        let named = NamedArray::new(vec![2, 1, 1, 2], vec![0.5, 1.0, 9.0, 9.0]).unwrap();
        let fractions = FractionArray::from_named("fraction", &named, &NEW_FRACTION_DIMS).unwrap();

        assert_eq!(fractions.fraction(VegType::from_index(0), Cell::new(0, 0)), 0.5);
        assert_eq!(fractions.fraction(VegType::from_index(0), Cell::new(0, 1)), 1.0);
    }

    #[test]
    fn test_explicit_dims_override_default() {
        let named = NamedArray::new(vec![2, 1, 1], vec![0.3, 0.7])
            .unwrap()
            .with_dims(["veg", "lat", "lon"]);
        let fractions = FractionArray::from_named("f", &named, &OLD_FRACTION_DIMS).unwrap();
        assert_eq!(fractions.tile_count(), 2);
        assert_eq!(fractions.fraction(VegType::from_index(1), Cell::new(0, 0)), 0.7);
    }

    #[test]
    fn test_missing_or_unknown_axes_rejected() {
        let named = NamedArray::new(vec![2, 2], vec![0.0; 4])
            .unwrap()
            .with_dims(["lat", "lon"]);
        assert!(FractionArray::from_named("f", &named, &OLD_FRACTION_DIMS).is_err());

        let named = NamedArray::new(vec![1, 1, 1], vec![1.0])
            .unwrap()
            .with_dims(["lat", "lon", "depth"]);
        assert!(FractionArray::from_named("f", &named, &OLD_FRACTION_DIMS).is_err());

        let named = NamedArray::new(vec![0, 1, 1, 1], vec![]).unwrap();
        assert!(FractionArray::from_named("f", &named, &NEW_FRACTION_DIMS).is_err());
    }

    #[test]
    fn test_grid_rejects_mismatched_extents() {
        let old = array(1, 2, 2, vec![1.0; 4]);
        let new = array(1, 2, 3, vec![1.0; 6]);
        assert!(matches!(
            FractionGrid::new(old, new),
            Err(RemapError::Shape(_))
        ));

        let old = array(2, 1, 1, vec![0.5, 0.5]);
        let new = array(1, 1, 1, vec![1.0]);
        assert!(FractionGrid::new(old, new).is_err());
    }

    #[test]
    fn test_land_and_active_types() {
        // 2 types on a 1x3 grid: cell 0 old-only land, cell 1 new-only, cell 2 ocean
        let old = array(2, 1, 3, vec![0.6, 0.0, 0.0, 0.4, 0.0, f64::NAN]);
        let new = array(2, 1, 3, vec![0.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
        let grid = FractionGrid::new(old, new).unwrap();

        assert_eq!(grid.land_cells(), &[Cell::new(0, 0), Cell::new(0, 1)]);
        assert!(grid.is_land(Distribution::Old, Cell::new(0, 0)));
        assert!(!grid.is_land(Distribution::New, Cell::new(0, 0)));
        assert!(grid.is_land(Distribution::New, Cell::new(0, 1)));
        assert!(!grid.is_land(Distribution::Old, Cell::new(0, 2)));

        assert_eq!(
            grid.active_types(Distribution::Old, Cell::new(0, 0)),
            vec![VegType::from_index(0), VegType::from_index(1)]
        );
        assert_eq!(
            grid.active_types(Distribution::New, Cell::new(0, 1)),
            vec![VegType::from_index(1)]
        );
        assert_eq!(grid.fraction(Distribution::Old, Cell::new(0, 0), VegType::from_index(1)), 0.4);
    }
}
