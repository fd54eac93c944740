//! Grid-based data: index space, fraction distributions and tiled fields

pub mod cell;
pub mod field;
pub mod fraction;

// Re-export main types
pub use cell::{latitude_window, Cell, GridShape, LongitudeBoundary, Tile};
pub use field::{TiledField, TILED_DIMS};
pub use fraction::{
    Distribution, FractionArray, FractionGrid, NEW_FRACTION_DIMS, OLD_FRACTION_DIMS,
};
