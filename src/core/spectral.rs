use ndarray::{Array2, Zip};

use crate::types::{XriError, XriResult};

/// Denominator substituted where red + NIR is zero
const NDVI_EPSILON: f32 = 1e-8;

/// Normalized difference vegetation index from red and near-infrared bands
pub fn ndvi(red: &Array2<f32>, nir: &Array2<f32>) -> XriResult<Array2<f32>> {
    if red.dim() != nir.dim() {
        return Err(XriError::InvalidInput(format!(
            "red band {:?} and NIR band {:?} differ in shape",
            red.dim(),
            nir.dim()
        )));
    }

    Ok(Zip::from(red).and(nir).map_collect(|&r, &n| {
        let denominator = n + r;
        let denominator = if denominator == 0.0 { NDVI_EPSILON } else { denominator };
        (n - r) / denominator
    }))
}
