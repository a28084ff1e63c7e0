use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// 2D real-valued image (row x column), e.g. temperature or reflectance
pub type ValueImage = Array2<f32>;

/// 2D range image in sensor units (millimetres for the supported sensor)
pub type RangeImage = Array2<u32>;

/// Nodata sentinel for continuous rasters
pub const FLOAT_NODATA: f32 = -9999.0;

/// Nodata sentinel for cluster-id rasters
pub const LABEL_NODATA: i32 = -1;

/// Simple 3D vector for local (sensor frame) point sets
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn sub(&self, other: &Vector3) -> Vector3 {
        Vector3::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    pub fn cross(&self, other: &Vector3) -> Vector3 {
        Vector3::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    pub fn dot(&self, other: &Vector3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn norm(&self) -> f64 {
        self.dot(self).sqrt()
    }
}

/// Point in the fixed planar world system carrying a measured value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub value: f64,
}

impl GeoPoint {
    pub fn new(x: f64, y: f64, z: f64, value: f64) -> Self {
        Self { x, y, z, value }
    }
}

/// Planar (easting, northing) coordinate of an entity's origin
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Origin {
    pub x: f64,
    pub y: f64,
}

impl Origin {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<(f64, f64)> for Origin {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// Translate local points into the world system.
///
/// Only x/y receive the origin offset; z stays in the capture's own height
/// reference because no vertical datum is known for the origin.
pub fn translate_to_world(points: &[Vector3], origin: Origin) -> Vec<Vector3> {
    points
        .iter()
        .map(|p| Vector3::new(p.x + origin.x, p.y + origin.y, p.z))
        .collect()
}

/// Mean position of a point set
pub fn centroid(points: &[Vector3]) -> Option<Vector3> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let (sx, sy, sz) = points
        .iter()
        .fold((0.0, 0.0, 0.0), |(sx, sy, sz), p| (sx + p.x, sy + p.y, sz + p.z));
    Some(Vector3::new(sx / n, sy / n, sz / n))
}

/// Geospatial transformation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    /// GDAL ordering
    pub fn to_array(&self) -> [f64; 6] {
        [
            self.top_left_x,
            self.pixel_width,
            self.rotation_x,
            self.top_left_y,
            self.rotation_y,
            self.pixel_height,
        ]
    }
}

/// Axis-aligned planar extent.
///
/// Containment is closed on every side; points exactly on the max-x or
/// min-y edge are binned into the last column/row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl Extent {
    pub fn new(min_x: f64, max_x: f64, min_y: f64, max_y: f64) -> Self {
        Self { min_x, max_x, min_y, max_y }
    }

    /// Square extent centred on an origin
    pub fn around(origin: Origin, buffer: f64) -> Self {
        Self::new(
            origin.x - buffer,
            origin.x + buffer,
            origin.y - buffer,
            origin.y + buffer,
        )
    }

    /// Bounding box of a point set
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let mut iter = points.into_iter();
        let (x0, y0) = iter.next()?;
        let mut extent = Self::new(x0, x0, y0, y0);
        for (x, y) in iter {
            extent.min_x = extent.min_x.min(x);
            extent.max_x = extent.max_x.max(x);
            extent.min_y = extent.min_y.min(y);
            extent.max_y = extent.max_y.max(y);
        }
        Some(extent)
    }

    pub fn buffered(&self, distance: f64) -> Self {
        Self::new(
            self.min_x - distance,
            self.max_x + distance,
            self.min_y - distance,
            self.max_y + distance,
        )
    }

    /// Grow a degenerate extent to at least `size` on each axis, keeping the
    /// top-left corner fixed
    pub fn with_min_size(&self, size: f64) -> Self {
        let mut extent = *self;
        if extent.max_x - extent.min_x < size {
            extent.max_x = extent.min_x + size;
        }
        if extent.max_y - extent.min_y < size {
            extent.min_y = extent.max_y - size;
        }
        extent
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// (rows, cols) of a grid covering the extent
    pub fn grid_dims(&self, cell_size: f64) -> (usize, usize) {
        let cols = ((self.max_x - self.min_x) / cell_size).ceil();
        let rows = ((self.max_y - self.min_y) / cell_size).ceil();
        (rows.max(0.0) as usize, cols.max(0.0) as usize)
    }
}

/// Dense single-band grid with an explicit nodata sentinel
#[derive(Debug, Clone, PartialEq)]
pub struct Raster<T> {
    pub data: Array2<T>,
    pub nodata: T,
    /// Square cell edge in metres
    pub cell_size: f64,
    /// World coordinate of the lower-left corner
    pub lower_left: (f64, f64),
}

impl<T: Copy + PartialEq> Raster<T> {
    pub fn filled(rows: usize, cols: usize, nodata: T, cell_size: f64, lower_left: (f64, f64)) -> Self {
        Self {
            data: Array2::from_elem((rows, cols), nodata),
            nodata,
            cell_size,
            lower_left,
        }
    }

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    pub fn geo_transform(&self) -> GeoTransform {
        GeoTransform {
            top_left_x: self.lower_left.0,
            pixel_width: self.cell_size,
            rotation_x: 0.0,
            top_left_y: self.lower_left.1 + self.rows() as f64 * self.cell_size,
            rotation_y: 0.0,
            pixel_height: -self.cell_size,
        }
    }

    pub fn is_nodata(&self, row: usize, col: usize) -> bool {
        self.data[[row, col]] == self.nodata
    }

    /// Row-major iterator over populated cells
    pub fn valid_cells(&self) -> impl Iterator<Item = (usize, usize, T)> + '_ {
        self.data
            .indexed_iter()
            .filter(move |(_, v)| **v != self.nodata)
            .map(|((r, c), v)| (r, c, *v))
    }

    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|v| **v != self.nodata).count()
    }

    /// World coordinate of a cell centre
    pub fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        let top = self.lower_left.1 + self.rows() as f64 * self.cell_size;
        (
            self.lower_left.0 + (col as f64 + 0.5) * self.cell_size,
            top - (row as f64 + 0.5) * self.cell_size,
        )
    }

    /// Nearest-neighbour resample to a new cell size over the same extent
    pub fn resample_nearest(&self, cell_size: f64) -> Raster<T> {
        let width = self.cols() as f64 * self.cell_size;
        let height = self.rows() as f64 * self.cell_size;
        let cols = (width / cell_size).ceil().max(1.0) as usize;
        let rows = (height / cell_size).ceil().max(1.0) as usize;

        let top = self.lower_left.1 + height;
        // Anchored at the top-left corner like every other grid
        let lower_left = (self.lower_left.0, top - rows as f64 * cell_size);
        let mut out = Raster::filled(rows, cols, self.nodata, cell_size, lower_left);
        for r in 0..rows {
            for c in 0..cols {
                let x = self.lower_left.0 + (c as f64 + 0.5) * cell_size;
                let y = top - (r as f64 + 0.5) * cell_size;
                let src_c = ((x - self.lower_left.0) / self.cell_size).floor();
                let src_r = ((top - y) / self.cell_size).floor();
                if src_c < 0.0 || src_r < 0.0 {
                    continue;
                }
                let (src_r, src_c) = (src_r as usize, src_c as usize);
                if src_r < self.rows() && src_c < self.cols() {
                    out.data[[r, c]] = self.data[[src_r, src_c]];
                }
            }
        }
        out
    }
}

/// Named per-entity outcomes that are not errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SkipReason {
    EmptyInput,
    NoAboveGroundPoints,
    NoComplexStructures,
    NoPointsInExtent,
    NoVariance,
    InvalidGridDimensions,
    InsufficientPointsForClustering,
    InsufficientValidPixels,
    InsufficientAnomalousPoints,
    NoClustersFound,
}

impl SkipReason {
    pub fn code(&self) -> &'static str {
        match self {
            SkipReason::EmptyInput => "EMPTY_INPUT",
            SkipReason::NoAboveGroundPoints => "NO_ABOVE_GROUND_POINTS",
            SkipReason::NoComplexStructures => "NO_COMPLEX_STRUCTURES",
            SkipReason::NoPointsInExtent => "NO_POINTS_IN_EXTENT",
            SkipReason::NoVariance => "NO_VARIANCE",
            SkipReason::InvalidGridDimensions => "INVALID_GRID_DIMENSIONS",
            SkipReason::InsufficientPointsForClustering => "INSUFFICIENT_POINTS_FOR_CLUSTERING",
            SkipReason::InsufficientValidPixels => "INSUFFICIENT_VALID_PIXELS",
            SkipReason::InsufficientAnomalousPoints => "INSUFFICIENT_ANOMALOUS_POINTS",
            SkipReason::NoClustersFound => "NO_CLUSTERS_FOUND",
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Error types for raster product generation
#[derive(Debug, thiserror::Error)]
pub enum XriError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[cfg(feature = "gdal")]
    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),
}

/// Result type for fallible operations
pub type XriResult<T> = Result<T, XriError>;

/// Why a single entity produced no product
#[derive(Debug, thiserror::Error)]
pub enum EntityError {
    #[error("skipped: {0}")]
    Skip(SkipReason),

    #[error(transparent)]
    Failed(#[from] XriError),
}

impl From<SkipReason> for EntityError {
    fn from(reason: SkipReason) -> Self {
        EntityError::Skip(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extent_grid_dims_round_up() {
        let extent = Extent::new(0.0, 10.5, 0.0, 3.0);
        assert_eq!(extent.grid_dims(1.0), (3, 11));
        assert_eq!(Extent::new(5.0, 5.0, 0.0, 2.0).grid_dims(1.0), (2, 0));
    }

    #[test]
    fn test_geo_transform_top_left() {
        let raster = Raster::filled(4, 2, FLOAT_NODATA, 0.5, (100.0, 200.0));
        let gt = raster.geo_transform();
        assert_eq!(gt.top_left_x, 100.0);
        assert_eq!(gt.top_left_y, 202.0);
        assert_eq!(gt.pixel_height, -0.5);
    }

    #[test]
    fn test_resample_nearest_keeps_extent() {
        let mut raster = Raster::filled(4, 4, LABEL_NODATA, 0.25, (0.0, 0.0));
        raster.data[[0, 0]] = 3;
        raster.data[[3, 3]] = 7;
        let coarse = raster.resample_nearest(0.5);
        assert_eq!(coarse.data.dim(), (2, 2));
        // centre of coarse (0,0) is (0.25, 0.75) -> fine cell (1,1)
        assert_eq!(coarse.data[[0, 0]], LABEL_NODATA);
        let coarse = raster.resample_nearest(1.0);
        assert_eq!(coarse.data.dim(), (1, 1));
        assert_eq!(coarse.lower_left, (0.0, 0.0));

        let uneven = Raster::filled(3, 3, LABEL_NODATA, 0.25, (0.0, 0.0)).resample_nearest(0.5);
        assert_eq!(uneven.data.dim(), (2, 2));
        assert_eq!(uneven.lower_left, (0.0, -0.25));
    }

    #[test]
    fn test_min_size_keeps_top_left() {
        let e = Extent::new(5.0, 5.0, 2.0, 2.0).with_min_size(0.5);
        assert_eq!(e, Extent::new(5.0, 5.5, 1.5, 2.0));
        assert_eq!(e.grid_dims(0.5), (1, 1));
        let wide = Extent::new(0.0, 4.0, 0.0, 3.0);
        assert_eq!(wide.with_min_size(1.0), wide);
    }

    #[test]
    fn test_centroid() {
        let pts = vec![Vector3::new(0.0, 0.0, 0.0), Vector3::new(2.0, 4.0, 6.0)];
        assert_eq!(centroid(&pts), Some(Vector3::new(1.0, 2.0, 3.0)));
        assert_eq!(centroid(&[]), None);
    }

    #[test]
    fn test_skip_reason_codes() {
        assert_eq!(SkipReason::NoVariance.to_string(), "NO_VARIANCE");
        assert_eq!(
            SkipReason::InsufficientPointsForClustering.to_string(),
            "INSUFFICIENT_POINTS_FOR_CLUSTERING"
        );
    }
}
