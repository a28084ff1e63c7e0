use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::types::{EntityError, Extent, GeoPoint, Raster, SkipReason, XriError, FLOAT_NODATA};

/// How points landing in the same cell combine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Aggregation {
    /// Greatest value wins
    Max,
    /// Arithmetic mean
    Mean,
    /// 1 wherever any point falls
    Presence,
    Sum,
    /// Number of points
    Count,
}

/// Grid definition shared by every rasterization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterParams {
    pub cell_size: f64,
    pub nodata: f32,
    /// Largest grid (rows x cols) a single rasterization may allocate
    pub max_cells: usize,
}

/// 50 million cells, about 800 MB of accumulators
pub const DEFAULT_MAX_CELLS: usize = 50_000_000;

impl Default for RasterParams {
    fn default() -> Self {
        Self {
            cell_size: 1.0,
            nodata: FLOAT_NODATA,
            max_cells: DEFAULT_MAX_CELLS,
        }
    }
}

/// Point-to-grid binning over a fixed extent
#[derive(Debug, Clone)]
pub struct GridSpec {
    pub extent: Extent,
    pub cell_size: f64,
    pub rows: usize,
    pub cols: usize,
}

impl GridSpec {
    pub fn new(extent: Extent, cell_size: f64) -> Result<Self, EntityError> {
        Self::bounded(extent, cell_size, DEFAULT_MAX_CELLS)
    }

    /// Grid over `extent`, refused with `INVALID_GRID_DIMENSIONS` when it
    /// would hold more than `max_cells` cells
    pub fn bounded(extent: Extent, cell_size: f64, max_cells: usize) -> Result<Self, EntityError> {
        if !(cell_size > 0.0) || !cell_size.is_finite() {
            return Err(XriError::InvalidInput(format!("cell size must be positive, got {}", cell_size)).into());
        }
        let (rows, cols) = extent.grid_dims(cell_size);
        if rows == 0 || cols == 0 {
            log::debug!("Degenerate grid {}x{} for extent {:?}", rows, cols, extent);
            return Err(SkipReason::InvalidGridDimensions.into());
        }
        match rows.checked_mul(cols) {
            Some(cells) if cells <= max_cells => {}
            _ => {
                log::warn!(
                    "Grid {}x{} at {} m exceeds {} cells for extent {:?}",
                    rows,
                    cols,
                    cell_size,
                    max_cells,
                    extent
                );
                return Err(SkipReason::InvalidGridDimensions.into());
            }
        }
        Ok(Self {
            extent,
            cell_size,
            rows,
            cols,
        })
    }

    /// (row, col) for a world coordinate; `None` outside the extent.
    ///
    /// Rows count down from the top edge. Points on the max-x or min-y edge
    /// land in the last column/row.
    #[inline]
    pub fn cell_of(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        if !self.extent.contains(x, y) {
            return None;
        }
        let col = ((x - self.extent.min_x) / self.cell_size).floor() as usize;
        let row = ((self.extent.max_y - y) / self.cell_size).floor() as usize;
        Some((row.min(self.rows - 1), col.min(self.cols - 1)))
    }

    pub fn lower_left(&self) -> (f64, f64) {
        (self.extent.min_x, self.extent.max_y - self.rows as f64 * self.cell_size)
    }

    /// World centre of a cell
    pub fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        (
            self.extent.min_x + (col as f64 + 0.5) * self.cell_size,
            self.extent.max_y - (row as f64 + 0.5) * self.cell_size,
        )
    }
}

/// Bin `(x, y, value)` samples into a float raster.
///
/// Out-of-extent samples are dropped. Cells no sample reaches keep `nodata`.
pub fn rasterize_values<I>(
    samples: I,
    extent: Extent,
    params: &RasterParams,
    aggregation: Aggregation,
) -> Result<Raster<f32>, EntityError>
where
    I: IntoIterator<Item = (f64, f64, f64)>,
{
    let grid = GridSpec::bounded(extent, params.cell_size, params.max_cells)?;
    log::debug!(
        "Rasterizing with {:?} onto {}x{} grid at {} m",
        aggregation,
        grid.rows,
        grid.cols,
        grid.cell_size
    );

    let mut acc = Array2::<f64>::zeros((grid.rows, grid.cols));
    let mut counts = Array2::<u32>::zeros((grid.rows, grid.cols));
    let mut binned = 0usize;
    let mut dropped = 0usize;

    for (x, y, value) in samples {
        let Some((row, col)) = grid.cell_of(x, y) else {
            dropped += 1;
            continue;
        };
        binned += 1;
        let n = counts[[row, col]];
        let cell = &mut acc[[row, col]];
        match aggregation {
            Aggregation::Max => {
                if n == 0 || value > *cell {
                    *cell = value;
                }
            }
            Aggregation::Mean => {
                *cell += (value - *cell) / f64::from(n + 1);
            }
            Aggregation::Sum => *cell += value,
            Aggregation::Presence | Aggregation::Count => {}
        }
        counts[[row, col]] = n + 1;
    }

    log::debug!("Binned {} samples, dropped {} outside extent", binned, dropped);

    let mut raster = Raster::filled(grid.rows, grid.cols, params.nodata, grid.cell_size, grid.lower_left());
    ndarray::Zip::from(&mut raster.data)
        .and(&acc)
        .and(&counts)
        .for_each(|out, &value, &n| {
            if n == 0 {
                return;
            }
            *out = match aggregation {
                Aggregation::Presence => 1.0,
                Aggregation::Count => n as f32,
                _ => value as f32,
            };
        });
    Ok(raster)
}

/// Rasterize the `value` field of world points
pub fn rasterize(
    points: &[GeoPoint],
    extent: Extent,
    params: &RasterParams,
    aggregation: Aggregation,
) -> Result<Raster<f32>, EntityError> {
    rasterize_values(points.iter().map(|p| (p.x, p.y, p.value)), extent, params, aggregation)
}

/// Quartic-kernel point density (points per square metre) at cell centres.
///
/// Every cell is computed, so empty areas hold 0 rather than nodata.
pub fn kernel_density(
    points: &[(f64, f64)],
    extent: Extent,
    params: &RasterParams,
    search_radius: f64,
) -> Result<Raster<f32>, EntityError> {
    if !(search_radius > 0.0) {
        return Err(XriError::InvalidInput(format!(
            "search radius must be positive, got {}",
            search_radius
        ))
        .into());
    }
    let grid = GridSpec::bounded(extent, params.cell_size, params.max_cells)?;
    let mut raster = Raster::filled(grid.rows, grid.cols, params.nodata, grid.cell_size, grid.lower_left());
    raster.data.fill(0.0);

    let r2 = search_radius * search_radius;
    let norm = 3.0 / (PI * r2);
    let reach = (search_radius / grid.cell_size).ceil() as isize + 1;

    for &(px, py) in points {
        // Visit only cells whose centres can be within the radius
        let col0 = ((px - extent.min_x) / grid.cell_size).floor() as isize;
        let row0 = ((extent.max_y - py) / grid.cell_size).floor() as isize;
        for row in (row0 - reach).max(0)..=(row0 + reach).min(grid.rows as isize - 1) {
            for col in (col0 - reach).max(0)..=(col0 + reach).min(grid.cols as isize - 1) {
                let (cx, cy) = grid.cell_center(row as usize, col as usize);
                let d2 = (cx - px).powi(2) + (cy - py).powi(2);
                if d2 < r2 {
                    let w = 1.0 - d2 / r2;
                    raster.data[[row as usize, col as usize]] += (norm * w * w) as f32;
                }
            }
        }
    }
    Ok(raster)
}
