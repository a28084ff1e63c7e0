//! Input and output: sensor metadata, configuration and GeoTIFF products

pub mod intrinsics;
pub mod config;
#[cfg(feature = "gdal")]
pub mod geotiff;

pub use intrinsics::{load_beam_geometry, load_intrinsics, parse_intrinsics};
#[cfg(feature = "gdal")]
pub use geotiff::write_geotiff;
