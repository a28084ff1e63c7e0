use std::path::Path;

use crate::core::pipeline::PipelineConfig;
use crate::types::{XriError, XriResult};

impl PipelineConfig {
    /// Parse a configuration document; absent fields keep their defaults
    pub fn from_json_str(json: &str) -> XriResult<Self> {
        let config: PipelineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> XriResult<Self> {
        log::info!("Loading pipeline configuration: {}", path.as_ref().display());
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// Reject parameter combinations no pipeline can run with
    pub fn validate(&self) -> XriResult<()> {
        let positive = [
            ("output.cell_size", self.output.cell_size),
            ("thermal_grid_resolution", self.thermal_grid_resolution),
            ("density_search_radius", self.density_search_radius),
            ("projection.range_scale", self.projection.range_scale),
            ("plane_strip.distance_threshold", self.plane_strip.distance_threshold),
        ];
        for (name, value) in positive {
            if !(value > 0.0) || !value.is_finite() {
                return Err(XriError::Configuration(format!("{} must be positive, got {}", name, value)));
            }
        }
        if self.plane_strip.ransac_n < 3 {
            return Err(XriError::Configuration(format!(
                "plane_strip.ransac_n must be at least 3, got {}",
                self.plane_strip.ransac_n
            )));
        }
        let eps = self.clustering.eps_cells;
        if self.clustering.min_samples == 0 || !(eps >= 0.0) || !eps.is_finite() {
            return Err(XriError::Configuration(format!(
                "clustering needs min_samples >= 1 and a finite eps_cells >= 0, got {} and {}",
                self.clustering.min_samples, eps
            )));
        }
        if self.output.max_cells == 0 {
            return Err(XriError::Configuration("output.max_cells must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clustering::CellMetric;
    use crate::core::rasterize::Aggregation;

    #[test]
    fn test_partial_document_keeps_defaults() {
        let config = PipelineConfig::from_json_str(
            r#"{"clustering": {"eps_cells": 3, "metric": "chebyshev"}, "plane_strip": {"seed": 7}}"#,
        )
        .unwrap();
        assert_eq!(config.clustering.eps_cells, 3.0);
        assert_eq!(config.clustering.min_samples, 10);
        assert_eq!(config.clustering.metric, CellMetric::Chebyshev);
        assert_eq!(config.plane_strip.seed, Some(7));
        assert_eq!(config.plane_strip.num_passes, 5);
        assert_eq!(config.vegetation_buffer, 150.0);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = PipelineConfig::from_json_str(r#"{"output": {"cell_size": 0}}"#).unwrap_err();
        assert!(matches!(err, XriError::Configuration(_)));
        let err = PipelineConfig::from_json_str(r#"{"plane_strip": {"ransac_n": 2}}"#).unwrap_err();
        assert!(matches!(err, XriError::Configuration(_)));
    }

    #[test]
    fn test_non_finite_cluster_radius_rejected() {
        let mut config = PipelineConfig::default();
        config.clustering.eps_cells = f64::INFINITY;
        assert!(matches!(config.validate(), Err(XriError::Configuration(_))));
        config.clustering.eps_cells = f64::NAN;
        assert!(matches!(config.validate(), Err(XriError::Configuration(_))));
    }

    #[test]
    fn test_unknown_aggregation_fails_at_parse() {
        let parsed: Result<Aggregation, _> = serde_json::from_str(r#""MEDIAN""#);
        assert!(parsed.is_err());
        let parsed: Aggregation = serde_json::from_str(r#""MAX""#).unwrap();
        assert_eq!(parsed, Aggregation::Max);
    }
}
