//! Remapping configuration
//!
//! Configuration is a JSON document; every check runs when it is loaded, so a
//! [`RemapConfig`] that exists is always valid.
//!
//! ```json
//! {
//!   "per_cell": ["SOIL TEMPERATURE LAYER 1"],
//!   "per_tile": ["LEAF CARBON POOL"],
//!   "vegetation_map": { "10": [6, 7, 9] },
//!   "search_radius": 2,
//!   "latitude_band": 8,
//!   "minimum_tiles": 1
//! }
//! ```
//!
//! Unknown keys are ignored. `minimum_points` is accepted as an alias of
//! `minimum_tiles`.
//!
//! YAML configurations written for older tooling must be converted to JSON
//! before use. YAML allows bare integer keys (`10: [6, 7, 9]`), which JSON
//! does not: `vegetation_map` keys must be quoted (`"10": [6, 7, 9]`).
//!
//! Field names are kept as written. They are matched against the field store
//! when the remap runs (see [`crate::naming::find_field`]).

use crate::error::{RemapError, Result};
use crate::grid::LongitudeBoundary;
use crate::search::SearchParams;
use crate::vegetation::{VegetationSourceMap, MAX_TILES};
use rustc_hash::FxHashSet;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::info;

/// Default half-width of the local search box, in cells
pub const DEFAULT_SEARCH_RADIUS: i64 = 2;
/// Default half-width of the latitude search band, in rows
pub const DEFAULT_LATITUDE_BAND: i64 = 8;
/// Default minimum number of source tiles for a search stage to succeed
pub const DEFAULT_MINIMUM_TILES: i64 = 1;
/// Default name of the old fraction array in the input store
pub const DEFAULT_OLD_FRACTION_FIELD: &str = "FRACTIONS OF SURFACE TYPES";
/// Default name of the fraction array in the new vegetation document
pub const DEFAULT_NEW_FRACTION_FIELD: &str = "fraction";

/// Document layout; numeric fields are signed so negative values surface as
/// configuration errors rather than parse errors
#[derive(Debug, Deserialize)]
struct RawConfig {
    per_cell: Option<Vec<String>>,
    per_tile: Option<Vec<String>>,
    #[serde(default)]
    vegetation_map: BTreeMap<i64, Vec<i64>>,
    search_radius: Option<i64>,
    latitude_band: Option<i64>,
    #[serde(alias = "minimum_points")]
    minimum_tiles: Option<i64>,
    #[serde(default)]
    fill_all: bool,
    tile_count: Option<i64>,
    longitude_wrap: Option<bool>,
    #[serde(default)]
    zero_inactive_tiles: bool,
    old_fraction_field: Option<String>,
    new_fraction_field: Option<String>,
}

/// Validated remapping parameters
#[derive(Debug, Clone)]
pub struct RemapConfig {
    per_cell: Vec<String>,
    per_tile: Vec<String>,
    vegetation_map: VegetationSourceMap,
    search_radius: usize,
    latitude_band: usize,
    minimum_tiles: usize,
    longitude_boundary: LongitudeBoundary,
    fill_all: bool,
    zero_inactive_tiles: bool,
    tile_count: usize,
    old_fraction_field: String,
    new_fraction_field: String,
}

impl RemapConfig {
    /// Start building a configuration for the given field lists
    pub fn builder(per_cell: Vec<String>, per_tile: Vec<String>) -> RemapConfigBuilder {
        RemapConfigBuilder::new(per_cell, per_tile)
    }

    /// Parse and validate a configuration document
    ///
    /// # Errors
    /// Returns [`RemapError::Parse`] for malformed JSON and
    /// [`RemapError::Config`] for missing mandatory keys or invalid values.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let raw: RawConfig = serde_json::from_str(text).map_err(|source| RemapError::Parse {
            what: "remap configuration".to_string(),
            source,
        })?;

        let per_cell = raw
            .per_cell
            .ok_or_else(|| RemapError::config("missing mandatory key 'per_cell'"))?;
        let per_tile = raw
            .per_tile
            .ok_or_else(|| RemapError::config("missing mandatory key 'per_tile'"))?;

        let mut builder = Self::builder(per_cell, per_tile)
            .vegetation_map(raw.vegetation_map)
            .fill_all(raw.fill_all)
            .zero_inactive_tiles(raw.zero_inactive_tiles);
        if let Some(radius) = raw.search_radius {
            builder = builder.search_radius(radius);
        }
        if let Some(band) = raw.latitude_band {
            builder = builder.latitude_band(band);
        }
        if let Some(minimum) = raw.minimum_tiles {
            builder = builder.minimum_tiles(minimum);
        }
        if let Some(count) = raw.tile_count {
            builder = builder.tile_count(count);
        }
        if let Some(wrap) = raw.longitude_wrap {
            builder = builder.longitude_wrap(wrap);
        }
        if let Some(name) = raw.old_fraction_field {
            builder = builder.old_fraction_field(name);
        }
        if let Some(name) = raw.new_fraction_field {
            builder = builder.new_fraction_field(name);
        }

        builder.build()
    }

    /// Load and validate a configuration file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| RemapError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json_str(&contents)?;

        info!(
            "Loaded remap config from {}: {} per-cell, {} per-tile fields, radius={}, band={}, minimum_tiles={}, fill_all={}",
            path.display(),
            config.per_cell.len(),
            config.per_tile.len(),
            config.search_radius,
            config.latitude_band,
            config.minimum_tiles,
            config.fill_all
        );

        Ok(config)
    }

    /// Turn on filling of every tile slot (the command-line `--fill-all`)
    pub fn enable_fill_all(&mut self) {
        self.fill_all = true;
    }

    /// Vegetation-agnostic fields, filled by fraction-weighted average
    #[must_use]
    pub fn per_cell(&self) -> &[String] {
        &self.per_cell
    }

    /// Vegetation-specific fields, filled by tiered search
    #[must_use]
    pub fn per_tile(&self) -> &[String] {
        &self.per_tile
    }

    /// New → old vegetation type sources
    #[must_use]
    pub fn vegetation_map(&self) -> &VegetationSourceMap {
        &self.vegetation_map
    }

    /// Parameters of the tiered tile search
    #[must_use]
    pub fn search_params(&self) -> SearchParams {
        SearchParams {
            search_radius: self.search_radius,
            latitude_band: self.latitude_band,
            minimum_tiles: self.minimum_tiles,
            longitude_boundary: self.longitude_boundary,
        }
    }

    /// Whether inactive tile slots are filled as well
    #[must_use]
    pub fn fill_all(&self) -> bool {
        self.fill_all
    }

    /// Whether inactive per-tile slots are zeroed when not filling all tiles
    #[must_use]
    pub fn zero_inactive_tiles(&self) -> bool {
        self.zero_inactive_tiles
    }

    /// Number of tile slots per cell
    #[must_use]
    pub fn tile_count(&self) -> usize {
        self.tile_count
    }

    /// Name of the old fraction array in the input store
    #[must_use]
    pub fn old_fraction_field(&self) -> &str {
        &self.old_fraction_field
    }

    /// Name of the fraction array in the new vegetation document
    #[must_use]
    pub fn new_fraction_field(&self) -> &str {
        &self.new_fraction_field
    }
}

/// Builder for [`RemapConfig`], validated by [`RemapConfigBuilder::build`]
#[derive(Debug, Clone)]
pub struct RemapConfigBuilder {
    per_cell: Vec<String>,
    per_tile: Vec<String>,
    vegetation_map: BTreeMap<i64, Vec<i64>>,
    search_radius: i64,
    latitude_band: i64,
    minimum_tiles: i64,
    longitude_wrap: bool,
    fill_all: bool,
    zero_inactive_tiles: bool,
    tile_count: i64,
    old_fraction_field: String,
    new_fraction_field: String,
}

impl RemapConfigBuilder {
    fn new(per_cell: Vec<String>, per_tile: Vec<String>) -> Self {
        Self {
            per_cell,
            per_tile,
            vegetation_map: BTreeMap::new(),
            search_radius: DEFAULT_SEARCH_RADIUS,
            latitude_band: DEFAULT_LATITUDE_BAND,
            minimum_tiles: DEFAULT_MINIMUM_TILES,
            longitude_wrap: true,
            fill_all: false,
            zero_inactive_tiles: false,
            tile_count: MAX_TILES as i64,
            old_fraction_field: DEFAULT_OLD_FRACTION_FIELD.to_string(),
            new_fraction_field: DEFAULT_NEW_FRACTION_FIELD.to_string(),
        }
    }

    /// 1-based new type → 1-based old source types
    pub fn vegetation_map(mut self, entries: BTreeMap<i64, Vec<i64>>) -> Self {
        self.vegetation_map = entries;
        self
    }

    /// Half-width of the local search box, in cells
    pub fn search_radius(mut self, radius: i64) -> Self {
        self.search_radius = radius;
        self
    }

    /// Half-width of the latitude band, in rows
    pub fn latitude_band(mut self, band: i64) -> Self {
        self.latitude_band = band;
        self
    }

    /// Minimum tiles for a search stage to succeed
    pub fn minimum_tiles(mut self, minimum: i64) -> Self {
        self.minimum_tiles = minimum;
        self
    }

    /// Whether longitude windows wrap at the grid seam
    pub fn longitude_wrap(mut self, wrap: bool) -> Self {
        self.longitude_wrap = wrap;
        self
    }

    /// Fill every tile slot rather than only new active ones
    pub fn fill_all(mut self, fill_all: bool) -> Self {
        self.fill_all = fill_all;
        self
    }

    /// Zero per-tile slots inactive in the new distribution
    pub fn zero_inactive_tiles(mut self, zero: bool) -> Self {
        self.zero_inactive_tiles = zero;
        self
    }

    /// Number of tile slots per cell
    pub fn tile_count(mut self, count: i64) -> Self {
        self.tile_count = count;
        self
    }

    /// Name of the old fraction array in the input store
    pub fn old_fraction_field(mut self, name: impl Into<String>) -> Self {
        self.old_fraction_field = name.into();
        self
    }

    /// Name of the fraction array in the new vegetation document
    pub fn new_fraction_field(mut self, name: impl Into<String>) -> Self {
        self.new_fraction_field = name.into();
        self
    }

    /// Validate and produce the configuration
    ///
    /// # Errors
    /// Returns [`RemapError::Config`] if a numeric parameter is out of range,
    /// a field is listed twice, or the vegetation map is invalid.
    pub fn build(self) -> Result<RemapConfig> {
        let search_radius = non_negative("search_radius", self.search_radius)?;
        let latitude_band = non_negative("latitude_band", self.latitude_band)?;
        if self.minimum_tiles < 1 {
            return Err(RemapError::config(format!(
                "minimum_tiles must be at least 1, got {}",
                self.minimum_tiles
            )));
        }
        let minimum_tiles = non_negative("minimum_tiles", self.minimum_tiles)?;
        if self.tile_count < 1 {
            return Err(RemapError::config(format!(
                "tile_count must be at least 1, got {}",
                self.tile_count
            )));
        }
        let tile_count = non_negative("tile_count", self.tile_count)?;

        let mut seen = FxHashSet::default();
        for name in self.per_cell.iter().chain(&self.per_tile) {
            if !seen.insert(name.as_str()) {
                return Err(RemapError::config(format!(
                    "field '{name}' is listed more than once across per_cell and per_tile"
                )));
            }
        }

        let vegetation_map = VegetationSourceMap::from_config(&self.vegetation_map, tile_count)?;

        Ok(RemapConfig {
            per_cell: self.per_cell,
            per_tile: self.per_tile,
            vegetation_map,
            search_radius,
            latitude_band,
            minimum_tiles,
            longitude_boundary: LongitudeBoundary::from_wrap(self.longitude_wrap),
            fill_all: self.fill_all,
            zero_inactive_tiles: self.zero_inactive_tiles,
            tile_count,
            old_fraction_field: self.old_fraction_field,
            new_fraction_field: self.new_fraction_field,
        })
    }
}

fn non_negative(key: &str, value: i64) -> Result<usize> {
    usize::try_from(value)
        .map_err(|_| RemapError::config(format!("{key} must not be negative, got {value}")))
}
