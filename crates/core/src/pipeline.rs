//! End-to-end remap of a field store
//!
//! Loads both vegetation distributions, remaps every configured field and
//! assembles the output store handed to the restart merge step.

use crate::config::RemapConfig;
use crate::error::{RemapError, Result};
use crate::grid::{FractionArray, FractionGrid, NEW_FRACTION_DIMS, OLD_FRACTION_DIMS, TILED_DIMS};
use crate::remap::{FailurePolicy, FieldRemapper, RemapReport};
use crate::store::FieldStore;
use tracing::info;

/// Output name of the previous-year fractions, set equal to the new ones so
/// that no land-use change is triggered on restart
pub const PREVIOUS_YEAR_FRACTION_FIELD: &str = "PREVIOUS YEAR SURF FRACTIONS (TILES)";

/// Result of [`run_remap`]
#[derive(Debug)]
pub struct RemapRun {
    /// Remapped fields plus the new fraction arrays
    pub output: FieldStore,
    /// Run statistics
    pub report: RemapReport,
    /// Fields that could not be remapped (keep-going mode only)
    pub failures: Vec<RemapError>,
}

/// Load the old and new distributions into a [`FractionGrid`]
///
/// Old fractions are read from `input` under the configured old fraction
/// name, new fractions from `new_vegetation` under the configured new name.
/// A 3-D new fraction array without axis names is taken as `(veg, lat, lon)`.
///
/// # Errors
/// Returns [`RemapError::FieldNotFound`] if a fraction array is missing and
/// [`RemapError::Shape`] if the arrays cannot be normalised or disagree.
pub fn build_fraction_grid(
    config: &RemapConfig,
    input: &FieldStore,
    new_vegetation: &FieldStore,
) -> Result<FractionGrid> {
    let old_name = config.old_fraction_field();
    let old = FractionArray::from_named(old_name, input.require(old_name)?, &OLD_FRACTION_DIMS)?;

    let new_name = config.new_fraction_field();
    let new_array = new_vegetation.require(new_name)?;
    let new_dims: &[&str] = if new_array.shape.len() == TILED_DIMS.len() {
        &TILED_DIMS
    } else {
        &NEW_FRACTION_DIMS
    };
    let new = FractionArray::from_named(new_name, new_array, new_dims)?;

    FractionGrid::new(old, new)
}

/// Remap every configured field of `input` onto the new distribution
///
/// Configured names are matched as written, then in store form (see
/// [`crate::naming::find_field`]). The output store holds each remapped field
/// under its store name, and the new fractions under both the old fraction
/// name and [`PREVIOUS_YEAR_FRACTION_FIELD`].
///
/// # Errors
/// Returns configuration, shape and missing-field errors; with
/// [`FailurePolicy::KeepGoing`] per-field failures are returned in
/// [`RemapRun::failures`] instead.
pub fn run_remap(
    config: &RemapConfig,
    input: &FieldStore,
    new_vegetation: &FieldStore,
    policy: FailurePolicy,
) -> Result<RemapRun> {
    let grid = build_fraction_grid(config, input, new_vegetation)?;
    let remapper = FieldRemapper::new(&grid, config)?;
    let remapped = remapper.remap_store(input, policy)?;

    let mut output: FieldStore = remapped
        .fields
        .into_iter()
        .map(|(name, field)| (name, field.into_named()))
        .collect();
    let fractions = grid.new_fractions().to_named();
    output.insert(PREVIOUS_YEAR_FRACTION_FIELD, fractions.clone());
    output.insert(config.old_fraction_field(), fractions);

    info!(
        "Output store holds {} arrays ({} remapped fields)",
        output.len(),
        remapped.report.fields_remapped
    );

    Ok(RemapRun {
        output,
        report: remapped.report,
        failures: remapped.failures,
    })
}
