//! Tile addressing
//!
//! Maps geographic coordinates onto a regular latitude/longitude grid whose
//! resolution doubles with every magnification level. Level `n` splits the
//! world into `2^n × 2^n` cells, each `360/2^n` degrees wide and `180/2^n`
//! degrees high.
//!
//! Cell indices are unsigned and clamped to the grid, so requests touching
//! the poles or the anti-meridian never underflow or run past the last cell.

mod types;

pub use types::{
    GeoBox, GeoCoord, Magnification, TileId, MAX_LAT, MAX_LEVEL, MAX_LON, MIN_LAT, MIN_LON,
};

use std::ops::RangeInclusive;
use std::sync::OnceLock;

/// Size of one grid cell in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellDimension {
    pub width: f64,
    pub height: f64,
}

static CELL_DIMENSIONS: OnceLock<[CellDimension; MAX_LEVEL as usize + 1]> = OnceLock::new();

/// Returns the cell dimension for `level`, clamped to [`MAX_LEVEL`].
///
/// Values come from a table computed once on first use.
pub fn cell_dimension(level: u32) -> CellDimension {
    let table = CELL_DIMENSIONS.get_or_init(|| {
        let mut table = [CellDimension {
            width: 360.0,
            height: 180.0,
        }; MAX_LEVEL as usize + 1];
        for (level, cell) in table.iter_mut().enumerate().skip(1) {
            let cells = 2.0_f64.powi(level as i32);
            cell.width = 360.0 / cells;
            cell.height = 180.0 / cells;
        }
        table
    });
    table[level.min(MAX_LEVEL) as usize]
}

/// Number of cells along one axis at `level`.
#[inline]
pub fn cells_per_axis(level: u32) -> u32 {
    1u32 << level.min(MAX_LEVEL)
}

/// Column index of the cell containing longitude `lon`.
#[inline]
pub fn cell_x(level: u32, lon: f64) -> u32 {
    clamp_cell(level, (lon - MIN_LON) / cell_dimension(level).width)
}

/// Row index of the cell containing latitude `lat`.
#[inline]
pub fn cell_y(level: u32, lat: f64) -> u32 {
    clamp_cell(level, (lat - MIN_LAT) / cell_dimension(level).height)
}

fn clamp_cell(level: u32, value: f64) -> u32 {
    let max = cells_per_axis(level) - 1;
    // NaN falls through to 0
    if !(value > 0.0) {
        return 0;
    }
    let cell = value.floor();
    if cell >= f64::from(max) {
        max
    } else {
        cell as u32
    }
}

/// Inclusive cell ranges spanned by `bbox` at `level`.
///
/// A box whose `min.lon` lies east of its `max.lon` crosses the
/// anti-meridian; its x range wraps and is returned as two spans.
fn covering_ranges(level: u32, bbox: &GeoBox) -> (Vec<RangeInclusive<u32>>, RangeInclusive<u32>) {
    let x1 = cell_x(level, bbox.min.lon);
    let x2 = cell_x(level, bbox.max.lon);
    let y1 = cell_y(level, bbox.min.lat);
    let y2 = cell_y(level, bbox.max.lat);

    let last = cells_per_axis(level) - 1;
    let columns = if bbox.min.lon <= bbox.max.lon {
        vec![x1..=x2]
    } else if x1 > x2 {
        vec![x1..=last, 0..=x2]
    } else {
        // Wrapped within one column, so every column is touched
        vec![0..=last]
    };
    (columns, y1.min(y2)..=y1.max(y2))
}

/// Number of tiles [`tiles_covering`] returns for the same arguments.
///
/// Computed without enumerating, so callers can reject oversized requests.
pub fn covering_count(magnification: Magnification, bbox: &GeoBox) -> u64 {
    let (columns, rows) = covering_ranges(magnification.level(), bbox);
    let width: u64 = columns
        .iter()
        .map(|span| u64::from(span.end() - span.start()) + 1)
        .sum();
    width * (u64::from(rows.end() - rows.start()) + 1)
}

/// Enumerates every tile at `magnification` that intersects `bbox`.
///
/// The result covers the inclusive cell range spanned by the box corners,
/// ordered row-major (y outer, x inner), which matches [`TileId`] ordering
/// for a single level. For a box crossing the anti-meridian each row runs
/// from the western column to the last one, then wraps to column 0.
///
/// # Arguments
///
/// * `magnification` - Zoom level selecting the grid resolution
/// * `bbox` - Geographic area to cover
///
/// # Returns
///
/// The covering tile ids, never empty.
pub fn tiles_covering(magnification: Magnification, bbox: &GeoBox) -> Vec<TileId> {
    let level = magnification.level();
    let (columns, rows) = covering_ranges(level, bbox);

    let mut tiles = Vec::new();
    for y in rows {
        for span in &columns {
            tiles.extend(span.clone().map(|x| TileId::new(level, x, y)));
        }
    }
    tiles
}
