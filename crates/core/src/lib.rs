//! Vegetation Remapping Core Library
//!
//! Adjusts land-surface restart fields after the vegetation distribution of a
//! climate model grid has changed. Field values keyed to the old
//! per-cell-per-type vegetation fractions are carried over to the new ones.
//!
//! ## Fill policies
//!
//! - Per-cell fields receive the old-fraction-weighted average of the cell's
//!   tile values in every tile slot
//! - Per-tile fields receive the mean of the nearest matching old tiles, found
//!   by a tiered search (exact cell, local box, latitude band, whole grid)
//!
//! New vegetation types can be seeded from other old types via a configurable
//! source map.
//!
//! ## Configuration
//!
//! [`RemapConfig`] is read from JSON. YAML configurations from older tooling
//! need converting first, with integer `vegetation_map` keys quoted
//! (`"10": [6, 7, 9]`).

// Error taxonomy
pub mod error;

// Grid model and vegetation types
pub mod grid;
pub mod vegetation;

// Remapping engine
pub mod config;
pub mod remap;
pub mod search;

// Field store and pipeline
pub mod naming;
pub mod pipeline;
pub mod store;

// Re-export core types
pub use error::{RemapError, Result};
pub use grid::{Cell, Distribution, FractionArray, FractionGrid, GridShape, Tile, TiledField};
pub use vegetation::{VegType, VegetationSourceMap, MAX_TILES};

// Re-export engine types
pub use config::RemapConfig;
pub use remap::{FailurePolicy, FieldCategory, FieldRemapper, FillPlan, RemapOutput, RemapReport};
pub use search::{
    RowSums, SearchParams, SearchResult, SearchStage, StageMatch, TieredTileSearch, TileSelection,
};

// Re-export store and pipeline entry points
pub use naming::{escape_field_name, find_field, restore_field_names, unescape_field_name};
pub use pipeline::{run_remap, RemapRun, PREVIOUS_YEAR_FRACTION_FIELD};
pub use store::{FieldStore, NamedArray};
