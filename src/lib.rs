//! xri: geo-anchored rasters from panoramic LiDAR captures
//!
//! Panoramic range and value images are projected into a planar map frame
//! using the scanner's beam intrinsics, filtered (planar-surface stripping,
//! z-score anomalies) and binned onto fixed-resolution grids, optionally
//! clustered in grid space.

pub mod types;
pub mod io;
pub mod core;

#[cfg(feature = "python")]
mod python;

// Re-export main types
pub use types::{
    EntityError, Extent, GeoPoint, GeoTransform, Origin, Raster, SkipReason, Vector3, XriError,
    XriResult, FLOAT_NODATA, LABEL_NODATA,
};
pub use crate::core::{BeamGeometry, BeamIntrinsics, PipelineConfig};
