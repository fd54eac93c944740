//! Tiered spatial/taxonomic search for source tiles
//!
//! For a target cell and a new vegetation type, source tiles are old-distribution
//! tiles whose type is one of the configured analogues and whose old fraction is
//! non-zero. Four windows are tried in order, each containing the previous one:
//!
//! 1. the target cell itself
//! 2. a box of `search_radius` cells around it
//! 3. every column of the rows within `latitude_band` of it
//! 4. every land cell
//!
//! The first stage finding at least `minimum_tiles` tiles wins and its full set
//! is returned. If even the global stage falls short, whatever it found is
//! returned; an empty global result means there is no source data anywhere.

use crate::error::{RemapError, Result};
use crate::grid::{
    latitude_window, Cell, Distribution, FractionGrid, LongitudeBoundary, Tile, TiledField,
};
use crate::vegetation::{VegType, VegetationSourceMap};
use std::fmt;
use std::ops::RangeInclusive;

/// Tunable search parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchParams {
    /// Half-width of the local box, in cells
    pub search_radius: usize,
    /// Half-width of the latitude band, in rows
    pub latitude_band: usize,
    /// Tiles a stage must find to succeed (at least 1)
    pub minimum_tiles: usize,
    /// Seam behaviour of longitude windows
    pub longitude_boundary: LongitudeBoundary,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            search_radius: 2,
            latitude_band: 8,
            minimum_tiles: 1,
            longitude_boundary: LongitudeBoundary::Periodic,
        }
    }
}

/// One of the four search windows, in the order they are tried
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SearchStage {
    /// The target cell only
    ExactCell,
    /// Box of `search_radius` around the target cell
    LocalBox,
    /// Rows within `latitude_band`, all longitudes
    LatitudeBand,
    /// Every land cell
    Global,
}

impl SearchStage {
    /// All stages in search order
    pub const ALL: [Self; 4] = [
        Self::ExactCell,
        Self::LocalBox,
        Self::LatitudeBand,
        Self::Global,
    ];

    /// Position in the search order (0-3)
    #[must_use]
    pub const fn ordinal(self) -> usize {
        match self {
            Self::ExactCell => 0,
            Self::LocalBox => 1,
            Self::LatitudeBand => 2,
            Self::Global => 3,
        }
    }
}

impl fmt::Display for SearchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ExactCell => "exact cell",
            Self::LocalBox => "local box",
            Self::LatitudeBand => "latitude band",
            Self::Global => "global",
        };
        f.write_str(name)
    }
}

/// Source tiles found by a search, and the stage that found them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    /// Stage that produced the tiles
    pub stage: SearchStage,
    /// Matching old-distribution tiles; empty only for a global failure
    pub tiles: Vec<Tile>,
}

impl SearchResult {
    /// Whether no source tile exists anywhere
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Number of source tiles
    #[must_use]
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    /// Unweighted arithmetic mean of `field` over the source tiles
    ///
    /// Returns `None` for an empty result.
    #[must_use]
    pub fn mean(&self, field: &TiledField) -> Option<f64> {
        if self.tiles.is_empty() {
            return None;
        }
        Some(sum_over(&self.tiles, field) / self.tiles.len() as f64)
    }
}

/// Where the tiles of a winning stage come from
///
/// Band and global selections point into per-row tile lists held by the
/// search rather than copying them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TileSelection {
    /// Tiles listed one by one (exact cell and local box)
    Listed(Vec<Tile>),
    /// Every matching tile of whole latitude rows, plus local-box tiles from
    /// rows outside them
    Rows {
        /// Latitude rows taken in full
        rows: RangeInclusive<usize>,
        /// Box tiles outside `rows`
        extra: Vec<Tile>,
    },
    /// Every matching tile on the grid
    Global,
}

/// Compact search outcome: the winning stage and where its tiles are
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageMatch {
    /// Stage that met the threshold, or [`SearchStage::Global`]
    pub stage: SearchStage,
    /// New vegetation type searched for
    pub new_type: VegType,
    /// Tiles of the stage
    pub selection: TileSelection,
    len: usize,
}

impl StageMatch {
    /// Number of source tiles
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether no source tile exists anywhere
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Unweighted arithmetic mean of `field` over the matched tiles
    ///
    /// `sums` must come from [`TieredTileSearch::row_sums`] for the same
    /// field. Returns `None` for an empty match.
    #[must_use]
    pub fn mean(&self, sums: &RowSums, field: &TiledField) -> Option<f64> {
        if self.len == 0 {
            return None;
        }
        let veg = self.new_type.index();
        let total = match &self.selection {
            TileSelection::Listed(tiles) => sum_over(tiles, field),
            TileSelection::Rows { rows, extra } => {
                sums.rows[veg][rows.clone()].iter().sum::<f64>() + sum_over(extra, field)
            }
            TileSelection::Global => sums.totals[veg],
        };
        Some(total / self.len as f64)
    }
}

/// Per-row sums of one field over every type's matching tiles
#[derive(Debug, Clone)]
pub struct RowSums {
    rows: Vec<Vec<f64>>,
    totals: Vec<f64>,
}

/// Read-only query engine over the old distribution
///
/// Matching tiles are indexed once per (new type, latitude row) at
/// construction; band and global stages are answered from those rows.
#[derive(Debug)]
pub struct TieredTileSearch<'a> {
    grid: &'a FractionGrid,
    sources: &'a VegetationSourceMap,
    params: SearchParams,
    rows: Vec<Vec<Vec<Tile>>>,
    global_len: Vec<usize>,
}

impl<'a> TieredTileSearch<'a> {
    /// Create a search over `grid` using `sources` as the taxonomy
    ///
    /// # Errors
    /// Returns [`RemapError::Config`] if `minimum_tiles` is 0 and
    /// [`RemapError::Shape`] if the source map covers a different number of
    /// vegetation types than the grid.
    pub fn new(
        grid: &'a FractionGrid,
        sources: &'a VegetationSourceMap,
        params: SearchParams,
    ) -> Result<Self> {
        if params.minimum_tiles < 1 {
            return Err(RemapError::config("minimum_tiles must be at least 1"));
        }
        if sources.tile_count() != grid.tile_count() {
            return Err(RemapError::shape(format!(
                "vegetation map covers {} types but the fraction grid has {}",
                sources.tile_count(),
                grid.tile_count()
            )));
        }

        let shape = grid.shape();
        let rows: Vec<Vec<Vec<Tile>>> = grid
            .veg_types()
            .map(|new_type| {
                let wanted = sources.sources_for(new_type);
                (0..shape.n_lat)
                    .map(|lat| {
                        (0..shape.n_lon)
                            .flat_map(move |lon| matching_tiles(grid, wanted, Cell::new(lat, lon)))
                            .collect()
                    })
                    .collect()
            })
            .collect();
        let global_len = rows
            .iter()
            .map(|per_row| per_row.iter().map(Vec::len).sum())
            .collect();

        Ok(Self {
            grid,
            sources,
            params,
            rows,
            global_len,
        })
    }

    /// Search parameters in use
    #[must_use]
    pub fn params(&self) -> SearchParams {
        self.params
    }

    /// Find the winning stage for `new_type` at `cell`
    ///
    /// Stages are tried in order; the first one reaching `minimum_tiles` wins
    /// in full. Otherwise the global stage wins as is, which may hold fewer
    /// than `minimum_tiles` tiles or none at all.
    #[must_use]
    pub fn locate(&self, cell: Cell, new_type: VegType) -> StageMatch {
        for stage in [
            SearchStage::ExactCell,
            SearchStage::LocalBox,
            SearchStage::LatitudeBand,
        ] {
            let selection = self.selection(stage, cell, new_type);
            let len = self.selection_len(new_type, &selection);
            if len >= self.params.minimum_tiles {
                return StageMatch {
                    stage,
                    new_type,
                    selection,
                    len,
                };
            }
        }

        StageMatch {
            stage: SearchStage::Global,
            new_type,
            selection: TileSelection::Global,
            len: self.global_len[new_type.index()],
        }
    }

    /// Find source tiles for `new_type` at `cell`, listing every tile
    #[must_use]
    pub fn search(&self, cell: Cell, new_type: VegType) -> SearchResult {
        let found = self.locate(cell, new_type);
        SearchResult {
            stage: found.stage,
            tiles: self.tiles(new_type, &found.selection),
        }
    }

    /// Source tiles visible from `cell` at one stage, without the threshold test
    ///
    /// Band tiles are listed row by row, followed by box tiles from rows
    /// outside the band.
    #[must_use]
    pub fn stage_tiles(&self, stage: SearchStage, cell: Cell, new_type: VegType) -> Vec<Tile> {
        self.tiles(new_type, &self.selection(stage, cell, new_type))
    }

    /// Sum `field` over every row's matching tiles, for [`StageMatch::mean`]
    #[must_use]
    pub fn row_sums(&self, field: &TiledField) -> RowSums {
        let rows: Vec<Vec<f64>> = self
            .rows
            .iter()
            .map(|per_row| per_row.iter().map(|tiles| sum_over(tiles, field)).collect())
            .collect();
        let totals = rows.iter().map(|per_row| per_row.iter().sum()).collect();
        RowSums { rows, totals }
    }

    fn selection(&self, stage: SearchStage, cell: Cell, new_type: VegType) -> TileSelection {
        let n_lat = self.grid.shape().n_lat;
        let SearchParams {
            search_radius,
            latitude_band,
            ..
        } = self.params;

        match stage {
            SearchStage::ExactCell => TileSelection::Listed(
                matching_tiles(self.grid, self.sources.sources_for(new_type), cell).collect(),
            ),
            SearchStage::LocalBox => TileSelection::Listed(self.box_tiles(
                cell,
                new_type,
                latitude_window(cell.lat, search_radius, n_lat),
            )),
            SearchStage::LatitudeBand => {
                // Rows of the local box that stick out of a narrower band keep
                // their box columns, so this window always contains the box.
                let extra = if search_radius > latitude_band {
                    self.box_tiles(
                        cell,
                        new_type,
                        latitude_window(cell.lat, search_radius, n_lat)
                            .filter(|lat| lat.abs_diff(cell.lat) > latitude_band),
                    )
                } else {
                    Vec::new()
                };
                TileSelection::Rows {
                    rows: latitude_window(cell.lat, latitude_band, n_lat),
                    extra,
                }
            }
            SearchStage::Global => TileSelection::Global,
        }
    }

    fn selection_len(&self, new_type: VegType, selection: &TileSelection) -> usize {
        match selection {
            TileSelection::Listed(tiles) => tiles.len(),
            TileSelection::Rows { rows, extra } => {
                self.rows[new_type.index()][rows.clone()]
                    .iter()
                    .map(Vec::len)
                    .sum::<usize>()
                    + extra.len()
            }
            TileSelection::Global => self.global_len[new_type.index()],
        }
    }

    fn tiles(&self, new_type: VegType, selection: &TileSelection) -> Vec<Tile> {
        let per_row = &self.rows[new_type.index()];
        match selection {
            TileSelection::Listed(tiles) => tiles.clone(),
            TileSelection::Rows { rows, extra } => per_row[rows.clone()]
                .iter()
                .flatten()
                .chain(extra)
                .copied()
                .collect(),
            TileSelection::Global => per_row.iter().flatten().copied().collect(),
        }
    }

    fn box_tiles(
        &self,
        cell: Cell,
        new_type: VegType,
        lats: impl Iterator<Item = usize>,
    ) -> Vec<Tile> {
        let wanted = self.sources.sources_for(new_type);
        let cols = self.params.longitude_boundary.window(
            cell.lon,
            self.params.search_radius,
            self.grid.shape().n_lon,
        );
        let cols = &cols;
        lats.flat_map(|lat| cols.iter().map(move |&lon| Cell::new(lat, lon)))
            .flat_map(|c| matching_tiles(self.grid, wanted, c))
            .collect()
    }
}

fn sum_over(tiles: &[Tile], field: &TiledField) -> f64 {
    tiles.iter().map(|tile| field.get(tile.veg, tile.cell)).sum()
}

/// Old-distribution tiles at `cell` whose type is in `wanted` and active
fn matching_tiles<'g>(
    grid: &'g FractionGrid,
    wanted: &'g [VegType],
    cell: Cell,
) -> impl Iterator<Item = Tile> + 'g {
    wanted
        .iter()
        .filter(move |&&veg| grid.is_active(Distribution::Old, cell, veg))
        .map(move |&veg| Tile::new(cell, veg))
}
