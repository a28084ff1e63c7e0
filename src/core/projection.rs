use ndarray::Array2;
use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::core::beam_geometry::BeamGeometry;
use crate::types::{GeoPoint, Origin, Vector3, XriError, XriResult};

/// Range-to-metric conversion and validity bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionParams {
    /// Divisor taking sensor range units to metres
    pub range_scale: f64,
    /// Ranges at or above this value (sensor units) are invalid
    pub range_sanity_max: f64,
}

impl Default for ProjectionParams {
    fn default() -> Self {
        Self {
            range_scale: 1000.0,        // millimetres
            range_sanity_max: 100_000.0, // 100 m
        }
    }
}

impl ProjectionParams {
    #[inline]
    pub fn is_valid_range(&self, range: f64) -> bool {
        range > 0.0 && range < self.range_sanity_max
    }
}

/// Local Cartesian offset of a return at `distance` metres along a beam
#[inline]
pub fn local_offset(distance: f64, altitude: f64, azimuth: f64) -> Vector3 {
    let horizontal = distance * altitude.cos();
    Vector3::new(
        horizontal * azimuth.cos(),
        horizontal * azimuth.sin(),
        distance * altitude.sin(),
    )
}

/// Project a panoramic value/range image pair into world points with default parameters
pub fn project<V, R>(
    values: &Array2<V>,
    ranges: &Array2<R>,
    geometry: &BeamGeometry,
    origin: Origin,
    mask: Option<&Array2<bool>>,
) -> XriResult<Vec<GeoPoint>>
where
    V: ToPrimitive + Copy,
    R: ToPrimitive + Copy,
{
    project_with_params(values, ranges, geometry, origin, mask, &ProjectionParams::default())
}

/// Project a panoramic value/range image pair into world points.
///
/// A pixel yields a point when it passes the mask and its range is inside
/// `(0, range_sanity_max)`; every other pixel is dropped without error. Points
/// come out in row-major pixel order. An empty result is valid.
pub fn project_with_params<V, R>(
    values: &Array2<V>,
    ranges: &Array2<R>,
    geometry: &BeamGeometry,
    origin: Origin,
    mask: Option<&Array2<bool>>,
    params: &ProjectionParams,
) -> XriResult<Vec<GeoPoint>>
where
    V: ToPrimitive + Copy,
    R: ToPrimitive + Copy,
{
    if values.dim() != ranges.dim() {
        return Err(XriError::InvalidInput(format!(
            "value image {:?} and range image {:?} differ in shape",
            values.dim(),
            ranges.dim()
        )));
    }
    if let Some(mask) = mask {
        if mask.dim() != values.dim() {
            return Err(XriError::InvalidInput(format!(
                "mask {:?} and value image {:?} differ in shape",
                mask.dim(),
                values.dim()
            )));
        }
    }

    let mut points = Vec::new();
    for ((row, col), range) in ranges.indexed_iter() {
        if let Some(mask) = mask {
            if !mask[[row, col]] {
                continue;
            }
        }
        let range = match range.to_f64() {
            Some(r) if params.is_valid_range(r) => r,
            _ => continue,
        };

        let (altitude, azimuth) = geometry.angle_for(row, col);
        let offset = local_offset(range / params.range_scale, altitude, azimuth);
        let value = values[[row, col]].to_f64().unwrap_or(f64::NAN);

        points.push(GeoPoint::new(
            origin.x + offset.x,
            origin.y + offset.y,
            offset.z,
            value,
        ));
    }

    log::debug!(
        "Projected {} of {} pixels",
        points.len(),
        ranges.len()
    );
    Ok(points)
}

/// Nearest-neighbour resize to `(rows, cols)`, sampling source pixel centres
pub fn resize_nearest<T: Clone>(image: &Array2<T>, shape: (usize, usize)) -> XriResult<Array2<T>> {
    let (src_rows, src_cols) = image.dim();
    let (rows, cols) = shape;
    if src_rows == 0 || src_cols == 0 {
        return Err(XriError::InvalidInput("cannot resize an empty image".to_string()));
    }
    if (rows, cols) == (src_rows, src_cols) {
        return Ok(image.clone());
    }

    let row_scale = src_rows as f64 / rows as f64;
    let col_scale = src_cols as f64 / cols as f64;
    Ok(Array2::from_shape_fn((rows, cols), |(r, c)| {
        let sr = (((r as f64 + 0.5) * row_scale) as usize).min(src_rows - 1);
        let sc = (((c as f64 + 0.5) * col_scale) as usize).min(src_cols - 1);
        image[[sr, sc]].clone()
    }))
}
