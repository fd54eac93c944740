//! Vegetation types and the new → old source mapping
//!
//! Configuration documents number vegetation types from 1, the way land-surface
//! modellers talk about them. Internally every [`VegType`] is a 0-based index
//! into the tile axis of the fraction and field arrays.

use crate::error::{RemapError, Result};
use rustc_hash::FxHashSet;
use std::collections::BTreeMap;
use std::fmt;

/// Default number of tile slots per grid cell
pub const MAX_TILES: usize = 17;

/// Vegetation type (plant functional type), stored as a 0-based tile index
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VegType(usize);

impl VegType {
    /// Create from a 0-based tile index
    #[must_use]
    pub const fn from_index(index: usize) -> Self {
        Self(index)
    }

    /// Create from the 1-based number used in configuration
    ///
    /// Returns `None` for 0, which has no meaning in 1-based numbering.
    #[must_use]
    pub fn from_one_based(number: usize) -> Option<Self> {
        number.checked_sub(1).map(Self)
    }

    /// 0-based tile index
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }

    /// 1-based number, as written in configuration and logs
    #[must_use]
    pub const fn number(self) -> usize {
        self.0 + 1
    }
}

impl fmt::Display for VegType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Static lookup from each new vegetation type to the old types that are
/// valid analogues for it
///
/// Types without an explicit entry map to themselves only. Every entry is
/// non-empty and free of duplicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VegetationSourceMap {
    sources: Vec<Vec<VegType>>,
}

impl VegetationSourceMap {
    /// Identity mapping over `tile_count` types
    #[must_use]
    pub fn identity(tile_count: usize) -> Self {
        Self {
            sources: (0..tile_count)
                .map(|i| vec![VegType::from_index(i)])
                .collect(),
        }
    }

    /// Build from 1-based configuration entries
    ///
    /// # Arguments
    /// * `entries` - new type number → old type numbers
    /// * `tile_count` - number of tile slots; all numbers must lie in `1..=tile_count`
    ///
    /// # Errors
    /// Returns [`RemapError::Config`] for a number outside `1..=tile_count`
    /// or an empty source list.
    pub fn from_config(entries: &BTreeMap<i64, Vec<i64>>, tile_count: usize) -> Result<Self> {
        let mut map = Self::identity(tile_count);

        for (&new_number, old_numbers) in entries {
            let new_type = checked_veg_type(new_number, tile_count, "vegetation_map key")?;

            if old_numbers.is_empty() {
                return Err(RemapError::config(format!(
                    "vegetation_map entry for type {new_number} has no source types"
                )));
            }

            let mut seen = FxHashSet::default();
            let mut sources = Vec::with_capacity(old_numbers.len());
            for &old_number in old_numbers {
                let old_type = checked_veg_type(
                    old_number,
                    tile_count,
                    &format!("vegetation_map source for type {new_number}"),
                )?;
                if seen.insert(old_type) {
                    sources.push(old_type);
                }
            }

            map.sources[new_type.index()] = sources;
        }

        Ok(map)
    }

    /// Old types considered valid sources for `new_type`
    ///
    /// # Panics
    /// Panics if `new_type` is outside the tile count the map was built for.
    #[must_use]
    pub fn sources_for(&self, new_type: VegType) -> &[VegType] {
        &self.sources[new_type.index()]
    }

    /// Number of vegetation types covered by the map
    #[must_use]
    pub fn tile_count(&self) -> usize {
        self.sources.len()
    }

    /// Whether `new_type` has a non-identity source set
    #[must_use]
    pub fn is_remapped(&self, new_type: VegType) -> bool {
        self.sources_for(new_type) != [new_type]
    }
}

fn checked_veg_type(number: i64, tile_count: usize, what: &str) -> Result<VegType> {
    usize::try_from(number)
        .ok()
        .filter(|&n| n <= tile_count)
        .and_then(VegType::from_one_based)
        .ok_or_else(|| {
            RemapError::config(format!(
                "{what} {number} is outside the valid range 1..={tile_count}"
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(pairs: &[(i64, &[i64])]) -> BTreeMap<i64, Vec<i64>> {
        pairs.iter().map(|(k, v)| (*k, v.to_vec())).collect()
    }

    #[test]
    fn test_one_based_conversion() {
        assert_eq!(VegType::from_one_based(1), Some(VegType::from_index(0)));
        assert_eq!(VegType::from_one_based(0), None);
        assert_eq!(VegType::from_index(9).number(), 10);
        assert_eq!(VegType::from_index(9).to_string(), "10");
    }

    #[test]
    fn test_unconfigured_types_map_to_themselves() {
        let map = VegetationSourceMap::from_config(&entries(&[(10, &[6, 7, 9])]), MAX_TILES)
            .unwrap();

        let tree = VegType::from_index(0);
        assert_eq!(map.sources_for(tree), &[tree]);
        assert!(!map.is_remapped(tree));
    }

    #[test]
    fn test_configured_entry_is_zero_based_internally() {
        let map = VegetationSourceMap::from_config(&entries(&[(10, &[6, 7, 9])]), MAX_TILES)
            .unwrap();

        let sources = map.sources_for(VegType::from_one_based(10).unwrap());
        let indices: Vec<usize> = sources.iter().map(|v| v.index()).collect();
        assert_eq!(indices, vec![5, 6, 8]);
    }

    #[test]
    fn test_duplicate_sources_are_collapsed() {
        let map =
            VegetationSourceMap::from_config(&entries(&[(3, &[2, 2, 1, 2])]), MAX_TILES).unwrap();
        let sources = map.sources_for(VegType::from_one_based(3).unwrap());
        assert_eq!(
            sources,
            &[VegType::from_index(1), VegType::from_index(0)]
        );
    }

    #[test]
    fn test_out_of_range_types_rejected() {
        assert!(VegetationSourceMap::from_config(&entries(&[(18, &[1])]), MAX_TILES).is_err());
        assert!(VegetationSourceMap::from_config(&entries(&[(0, &[1])]), MAX_TILES).is_err());
        assert!(VegetationSourceMap::from_config(&entries(&[(5, &[-1])]), MAX_TILES).is_err());
        assert!(VegetationSourceMap::from_config(&entries(&[(5, &[40])]), MAX_TILES).is_err());
    }

    #[test]
    fn test_empty_source_list_rejected() {
        let err = VegetationSourceMap::from_config(&entries(&[(5, &[])]), MAX_TILES).unwrap_err();
        assert!(matches!(err, RemapError::Config(_)));
    }
}
