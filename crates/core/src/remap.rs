//! Field remapping onto the new vegetation distribution
//!
//! Two fill policies, chosen by the field's configured category:
//!
//! - **Per-cell** fields are vegetation-agnostic. Every slot of a land cell gets
//!   the old-fraction-weighted average of the old tile values at that cell.
//! - **Per-tile** fields are vegetation-specific. Each slot to fill gets the
//!   unweighted mean of the tiles found by [`TieredTileSearch`], or 0.0 when no
//!   source tile exists anywhere.
//!
//! The tiered search depends only on (cell, vegetation type), so it is run once
//! into a [`FillPlan`] that every per-tile field reuses. Plan entries hold a
//! compact [`StageMatch`]; band and global matches are averaged from per-row
//! sums taken once per field.

use crate::config::RemapConfig;
use crate::error::{RemapError, Result};
use crate::grid::{Cell, Distribution, FractionGrid, TiledField};
use crate::naming::find_field;
use crate::search::{SearchStage, StageMatch, TieredTileSearch};
use crate::store::FieldStore;
use crate::vegetation::VegType;
use rayon::prelude::*;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Fill policy category of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldCategory {
    /// Vegetation-agnostic, filled by fraction-weighted average
    PerCell,
    /// Vegetation-specific, filled by tiered search
    PerTile,
}

/// What to do when a configured field cannot be remapped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Check every field before any work and stop at the first failure
    #[default]
    FailFast,
    /// Remap every field that can be, and report the rest
    KeepGoing,
}

/// One tile slot to fill and where its value comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    /// Cell being filled
    pub cell: Cell,
    /// New vegetation type (tile slot) being filled
    pub veg: VegType,
    /// Winning stage and its tiles; empty means zero-fill
    pub result: StageMatch,
}

/// Search results for every per-tile slot to fill, shared across fields
#[derive(Debug, Clone, Default)]
pub struct FillPlan {
    entries: Vec<PlanEntry>,
    cleared: Vec<(Cell, VegType)>,
}

impl FillPlan {
    /// Slots to fill, in row-major cell order then type order
    #[must_use]
    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    /// Slots inactive in the new distribution that are set to 0.0
    #[must_use]
    pub fn cleared(&self) -> &[(Cell, VegType)] {
        &self.cleared
    }

    /// Entry for a slot, if the plan fills it
    #[must_use]
    pub fn entry(&self, cell: Cell, veg: VegType) -> Option<&PlanEntry> {
        self.entries
            .binary_search_by(|e| (e.cell, e.veg).cmp(&(cell, veg)))
            .ok()
            .map(|i| &self.entries[i])
    }
}

/// Summary statistics of a remap run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemapReport {
    /// Plan entries resolved at each stage, indexed by [`SearchStage::ordinal`]
    pub stage_counts: [usize; 4],
    /// Plan entries with no source tile anywhere (zero-filled)
    pub zero_filled: usize,
    /// Zero-filled cells per new vegetation type
    pub zero_filled_types: BTreeMap<VegType, usize>,
    /// Land cells where per-cell averaging was skipped (no old vegetation)
    pub cells_without_old_vegetation: usize,
    /// Fields successfully remapped
    pub fields_remapped: usize,
}

impl RemapReport {
    fn from_plan(plan: &FillPlan) -> Self {
        let mut report = Self::default();
        for entry in &plan.entries {
            if entry.result.is_empty() {
                report.zero_filled += 1;
                *report.zero_filled_types.entry(entry.veg).or_insert(0) += 1;
            } else {
                report.stage_counts[entry.result.stage.ordinal()] += 1;
            }
        }
        report
    }

    /// Plan entries resolved at `stage`
    #[must_use]
    pub fn resolved_at(&self, stage: SearchStage) -> usize {
        self.stage_counts[stage.ordinal()]
    }
}

/// Remapped fields plus the failures and statistics of the run
#[derive(Debug)]
pub struct RemapOutput {
    /// Remapped fields, per-cell first, each in configured order
    pub fields: Vec<(String, TiledField)>,
    /// Fields that could not be remapped (only with [`FailurePolicy::KeepGoing`])
    pub failures: Vec<RemapError>,
    /// Run statistics
    pub report: RemapReport,
}

/// Applies the per-cell and per-tile fill policies over a fraction grid
#[derive(Debug)]
pub struct FieldRemapper<'a> {
    grid: &'a FractionGrid,
    config: &'a RemapConfig,
    search: TieredTileSearch<'a>,
}

impl<'a> FieldRemapper<'a> {
    /// Create a remapper for `grid` under `config`
    ///
    /// # Errors
    /// Returns [`RemapError::Shape`] if the grid's vegetation axis does not
    /// match the configured tile count.
    pub fn new(grid: &'a FractionGrid, config: &'a RemapConfig) -> Result<Self> {
        if grid.tile_count() != config.tile_count() {
            return Err(RemapError::shape(format!(
                "fraction grid has {} vegetation types but the configuration expects {}",
                grid.tile_count(),
                config.tile_count()
            )));
        }
        let search = TieredTileSearch::new(grid, config.vegetation_map(), config.search_params())?;

        let remapped: Vec<usize> = grid
            .veg_types()
            .filter(|&veg| config.vegetation_map().is_remapped(veg))
            .map(VegType::number)
            .collect();
        if !remapped.is_empty() {
            debug!("Vegetation types with non-identity sources: {:?}", remapped);
        }

        Ok(Self {
            grid,
            config,
            search,
        })
    }

    /// Search engine used for per-tile fields
    #[must_use]
    pub fn search(&self) -> &TieredTileSearch<'a> {
        &self.search
    }

    /// Configured category of a field, if it is configured at all
    #[must_use]
    pub fn category(&self, name: &str) -> Option<FieldCategory> {
        if self.config.per_cell().iter().any(|n| n == name) {
            Some(FieldCategory::PerCell)
        } else if self.config.per_tile().iter().any(|n| n == name) {
            Some(FieldCategory::PerTile)
        } else {
            None
        }
    }

    /// Tile slots to fill at `cell`
    ///
    /// Every slot with `fill_all`, otherwise only the types active in the new
    /// distribution.
    fn slots_to_fill(&self, cell: Cell) -> Vec<VegType> {
        if self.config.fill_all() {
            self.grid.veg_types().collect()
        } else {
            self.grid.active_types(Distribution::New, cell)
        }
    }

    /// Run the tiered search for every per-tile slot to fill
    #[must_use]
    pub fn plan(&self) -> FillPlan {
        let clear_inactive = !self.config.fill_all() && self.config.zero_inactive_tiles();

        let per_cell: Vec<(Vec<PlanEntry>, Vec<(Cell, VegType)>)> = self
            .grid
            .land_cells()
            .par_iter()
            .map(|&cell| {
                let entries = self
                    .slots_to_fill(cell)
                    .into_iter()
                    .map(|veg| PlanEntry {
                        cell,
                        veg,
                        result: self.search.locate(cell, veg),
                    })
                    .collect();
                let cleared = if clear_inactive {
                    self.grid
                        .veg_types()
                        .filter(|&veg| !self.grid.is_active(Distribution::New, cell, veg))
                        .map(|veg| (cell, veg))
                        .collect()
                } else {
                    Vec::new()
                };
                (entries, cleared)
            })
            .collect();

        let mut plan = FillPlan::default();
        for (entries, cleared) in per_cell {
            plan.entries.extend(entries);
            plan.cleared.extend(cleared);
        }

        debug!(
            "Fill plan: {} slots to fill, {} slots to clear",
            plan.entries.len(),
            plan.cleared.len()
        );
        plan
    }

    /// Old-fraction-weighted average of `field` at `cell`
    ///
    /// Returns `None` when the cell has no old vegetation, so there is nothing
    /// to weight.
    #[must_use]
    pub fn weighted_average(&self, field: &TiledField, cell: Cell) -> Option<f64> {
        let (weighted, total) = self
            .grid
            .active_types(Distribution::Old, cell)
            .into_iter()
            .map(|veg| {
                let fraction = self.grid.fraction(Distribution::Old, cell, veg);
                (fraction * field.get(veg, cell), fraction)
            })
            .fold((0.0, 0.0), |(ws, fs), (w, f)| (ws + w, fs + f));

        (total > 0.0).then(|| weighted / total)
    }

    /// Apply the per-cell policy to `field`
    ///
    /// Land cells receive the weighted average in every slot; other cells,
    /// and land cells without old vegetation, keep their input values.
    /// Returns the new field and the number of skipped land cells.
    #[must_use]
    pub fn remap_per_cell(&self, field: &TiledField) -> (TiledField, usize) {
        let averages: Vec<(Cell, Option<f64>)> = self
            .grid
            .land_cells()
            .par_iter()
            .map(|&cell| (cell, self.weighted_average(field, cell)))
            .collect();

        let mut out = field.clone();
        let mut skipped = 0;
        for (cell, average) in averages {
            match average {
                Some(value) => {
                    for veg in self.grid.veg_types() {
                        out.set(veg, cell, value);
                    }
                }
                None => skipped += 1,
            }
        }
        (out, skipped)
    }

    /// Apply the per-tile policy to `field` using a precomputed plan
    ///
    /// Slots outside the plan keep their input values, except cleared slots.
    #[must_use]
    pub fn remap_per_tile(&self, plan: &FillPlan, field: &TiledField) -> TiledField {
        let mut out = field.clone();
        let sums = self.search.row_sums(field);
        for entry in &plan.entries {
            // Means are taken over the input field, never the partially written output
            let value = entry.result.mean(&sums, field).unwrap_or(0.0);
            out.set(entry.veg, entry.cell, value);
        }
        for &(cell, veg) in &plan.cleared {
            out.set(veg, cell, 0.0);
        }
        out
    }

    /// Remap every configured field found in `store`
    ///
    /// Names are resolved with [`find_field`]; remapped fields are returned
    /// under the store key that matched, and missing fields are reported under
    /// their configured name.
    ///
    /// # Errors
    /// With [`FailurePolicy::FailFast`], returns [`RemapError::FieldsNotFound`]
    /// before any work if configured fields are missing, or the first shape
    /// error among the fields. With [`FailurePolicy::KeepGoing`] those errors
    /// are collected into [`RemapOutput::failures`] instead.
    pub fn remap_store(&self, store: &FieldStore, policy: FailurePolicy) -> Result<RemapOutput> {
        let requested: Vec<(&str, FieldCategory)> = self
            .config
            .per_cell()
            .iter()
            .map(|n| (n.as_str(), FieldCategory::PerCell))
            .chain(
                self.config
                    .per_tile()
                    .iter()
                    .map(|n| (n.as_str(), FieldCategory::PerTile)),
            )
            .collect();

        let mut found = Vec::with_capacity(requested.len());
        let mut missing = Vec::new();
        for (name, category) in requested {
            match find_field(store, name) {
                Some((key, array)) => {
                    if key != name {
                        debug!("Field '{}' found as '{}'", name, key);
                    }
                    found.push((key, category, array));
                }
                None => missing.push(name.to_string()),
            }
        }

        let mut failures = Vec::new();
        if !missing.is_empty() {
            match policy {
                FailurePolicy::FailFast => return Err(RemapError::FieldsNotFound(missing)),
                FailurePolicy::KeepGoing => {
                    failures.extend(
                        missing
                            .iter()
                            .map(|name| RemapError::FieldNotFound { name: name.clone() }),
                    );
                }
            }
        }

        let shape = self.grid.shape();
        let tile_count = self.grid.tile_count();
        let mut loaded = Vec::with_capacity(found.len());
        for (name, category, array) in found {
            match TiledField::from_named(&name, array, tile_count, shape) {
                Ok(field) => loaded.push((name, category, field)),
                Err(err) if policy == FailurePolicy::KeepGoing => failures.push(err),
                Err(err) => return Err(err),
            }
        }

        let plan = if loaded
            .iter()
            .any(|(_, category, _)| *category == FieldCategory::PerTile)
        {
            self.plan()
        } else {
            FillPlan::default()
        };
        let mut report = RemapReport::from_plan(&plan);
        self.log_plan(&report);

        let remapped: Vec<(String, TiledField, usize)> = loaded
            .into_par_iter()
            .map(|(name, category, field)| {
                debug!("Remapping {:?} field '{}'", category, name);
                let (out, skipped) = match category {
                    FieldCategory::PerCell => self.remap_per_cell(&field),
                    FieldCategory::PerTile => (self.remap_per_tile(&plan, &field), 0),
                };
                (name, out, skipped)
            })
            .collect();

        let mut fields = Vec::with_capacity(remapped.len());
        for (name, field, skipped) in remapped {
            if skipped > 0 {
                debug!(
                    "Field '{}': {} land cells without old vegetation kept their input values",
                    name, skipped
                );
            }
            report.cells_without_old_vegetation = report.cells_without_old_vegetation.max(skipped);
            fields.push((name, field));
        }
        report.fields_remapped = fields.len();

        info!(
            "Remapped {} fields ({} failed)",
            report.fields_remapped,
            failures.len()
        );

        Ok(RemapOutput {
            fields,
            failures,
            report,
        })
    }

    fn log_plan(&self, report: &RemapReport) {
        if report.stage_counts.iter().sum::<usize>() + report.zero_filled == 0 {
            return;
        }
        info!(
            "Tile search resolved {} slots at exact cell, {} in local box, {} in latitude band, {} globally; {} zero-filled",
            report.resolved_at(SearchStage::ExactCell),
            report.resolved_at(SearchStage::LocalBox),
            report.resolved_at(SearchStage::LatitudeBand),
            report.resolved_at(SearchStage::Global),
            report.zero_filled
        );
        for (veg, cells) in &report.zero_filled_types {
            warn!(
                "No source tiles anywhere for vegetation type {} (sources {:?}); zero-filled at {} cells",
                veg,
                self.config
                    .vegetation_map()
                    .sources_for(*veg)
                    .iter()
                    .map(|v| v.number())
                    .collect::<Vec<_>>(),
                cells
            );
        }
    }
}
