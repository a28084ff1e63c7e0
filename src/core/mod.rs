//! Core LiDAR raster processing modules

pub mod beam_geometry;
pub mod projection;
pub mod plane_strip;
pub mod anomaly;
pub mod rasterize;
pub mod clustering;
pub mod spectral;
pub mod pipeline;
pub mod batch;

// Re-export main types
pub use beam_geometry::{BeamGeometry, BeamIntrinsics};
pub use projection::{project, project_with_params, resize_nearest, ProjectionParams};
pub use plane_strip::{strip_planes, Plane, PlaneStripParams, PlaneStripResult, PlaneStripper, StrippedPlane};
pub use anomaly::{anomaly_mask, AnomalyParams, AnomalyResult};
pub use rasterize::{kernel_density, rasterize, rasterize_values, Aggregation, GridSpec, RasterParams};
pub use clustering::{cluster_cells, cluster_raster, CellMetric, ClusterLabeling, ClusterParams, NOISE};
pub use spectral::ndvi;
pub use pipeline::{
    reflectance_anomalies, site_centroid, surface_model, thermal_anomalies, vegetation_index,
    vegetation_structure, PipelineConfig, ReflectanceAnomalyProduct, ThermalAnomalyProduct,
    VegetationProduct,
};
pub use batch::{run_batch, split_skip, BatchReport, EntityOutcome};
