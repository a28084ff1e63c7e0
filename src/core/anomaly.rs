use ndarray::Array2;
use num_traits::Float;
use serde::{Deserialize, Serialize};

use crate::types::{EntityError, SkipReason};

/// Z-score anomaly thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyParams {
    /// |z| above which a pixel is anomalous
    pub zscore_threshold: f64,
}

impl Default for AnomalyParams {
    fn default() -> Self {
        Self {
            zscore_threshold: 1.5,
        }
    }
}

/// Per-pixel deviation scores and the thresholded mask
#[derive(Debug, Clone)]
pub struct AnomalyResult<F> {
    pub scores: Array2<F>,
    pub mask: Array2<bool>,
    pub mean: f64,
    pub std_dev: f64,
    /// Finite pixels that entered the statistics
    pub valid_count: usize,
}

impl<F> AnomalyResult<F> {
    pub fn anomalous_count(&self) -> usize {
        self.mask.iter().filter(|m| **m).count()
    }
}

/// Mean and population standard deviation over finite entries
pub fn finite_stats<F: Float>(values: &Array2<F>) -> Option<(f64, f64, usize)> {
    let (sum, count) = values
        .iter()
        .filter_map(|v| v.to_f64())
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if count == 0 {
        return None;
    }
    let mean = sum / count as f64;
    let var = values
        .iter()
        .filter_map(|v| v.to_f64())
        .filter(|v| v.is_finite())
        .map(|v| (v - mean) * (v - mean))
        .sum::<f64>()
        / count as f64;
    Some((mean, var.sqrt(), count))
}

/// Count of finite pixels
pub fn finite_count<F: Float>(values: &Array2<F>) -> usize {
    values.iter().filter(|v| v.is_finite()).count()
}

/// Z-score every pixel and mark those beyond `threshold`.
///
/// Statistics ignore non-finite pixels. Scores that come out non-finite
/// (missing pixels) are set to zero so they never count as anomalous.
pub fn anomaly_mask<F: Float>(values: &Array2<F>, threshold: f64) -> Result<AnomalyResult<F>, EntityError> {
    let (mean, std_dev, valid_count) = finite_stats(values).ok_or(SkipReason::NoVariance)?;
    if std_dev == 0.0 || !std_dev.is_finite() {
        return Err(SkipReason::NoVariance.into());
    }
    log::debug!(
        "Anomaly statistics: mean {:.4}, std {:.4} over {} pixels",
        mean,
        std_dev,
        valid_count
    );

    let scores = values.mapv(|v| {
        let z = v.to_f64().map(|v| (v - mean) / std_dev).unwrap_or(f64::NAN);
        if z.is_finite() {
            F::from(z).unwrap_or_else(F::zero)
        } else {
            F::zero()
        }
    });
    let mask = scores.mapv(|z| z.abs().to_f64().map_or(false, |z| z > threshold));

    Ok(AnomalyResult {
        scores,
        mask,
        mean,
        std_dev,
        valid_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_scores_and_mask() {
        let values = array![[1.0f32, 1.0, 1.0], [1.0, 1.0, 10.0]];
        let result = anomaly_mask(&values, 1.5).unwrap();
        assert_eq!(result.valid_count, 6);
        assert!(result.mask[[1, 2]]);
        assert_eq!(result.anomalous_count(), 1);
        // mean 2.5, population std sqrt(11.25)
        assert_relative_eq!(result.scores[[1, 2]], (7.5 / 11.25f64.sqrt()) as f32, epsilon = 1e-5);
    }

    #[test]
    fn test_nan_ignored_and_scored_zero() {
        let values = array![[f32::NAN, 0.0], [2.0, 4.0]];
        let result = anomaly_mask(&values, 1.0).unwrap();
        assert_eq!(result.valid_count, 3);
        assert_eq!(result.scores[[0, 0]], 0.0);
        assert!(!result.mask[[0, 0]]);
        assert_relative_eq!(result.mean, 2.0);
    }

    #[test]
    fn test_constant_image_has_no_variance() {
        let values = Array2::<f32>::from_elem((3, 3), 4.2);
        assert!(matches!(
            anomaly_mask(&values, 1.5),
            Err(EntityError::Skip(SkipReason::NoVariance))
        ));
    }

    #[test]
    fn test_all_missing_has_no_variance() {
        let values = Array2::<f64>::from_elem((2, 2), f64::NAN);
        assert!(matches!(
            anomaly_mask(&values, 1.5),
            Err(EntityError::Skip(SkipReason::NoVariance))
        ));
        assert_eq!(finite_count(&values), 0);
    }
}
