//! Per-entity raster product pipelines
//!
//! Each pipeline consumes one capture (a local point set or a panoramic image
//! set plus its planar origin) and yields one product, or the reason it was
//! skipped.

use ndarray::Array2;
use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

use crate::core::anomaly::{anomaly_mask, finite_count, AnomalyParams};
use crate::core::beam_geometry::BeamGeometry;
use crate::core::clustering::{cluster_raster, ClusterParams};
use crate::core::plane_strip::{PlaneStripParams, PlaneStripper, StrippedPlane};
use crate::core::projection::{project_with_params, resize_nearest, ProjectionParams};
use crate::core::rasterize::{kernel_density, rasterize, rasterize_values, Aggregation, RasterParams};
use crate::core::spectral::ndvi;
use crate::types::{
    centroid, translate_to_world, EntityError, Extent, GeoPoint, Origin, Raster, SkipReason, Vector3,
};

/// Every tunable of the product pipelines
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub projection: ProjectionParams,
    pub plane_strip: PlaneStripParams,
    pub anomaly: AnomalyParams,
    pub clustering: ClusterParams,
    /// Cell size and nodata of the emitted products
    pub output: RasterParams,
    /// Half-width of the vegetation raster around the origin (m)
    pub vegetation_buffer: f64,
    /// Finite pixels a thermal image needs before anomalies are sought
    pub thermal_min_valid_pixels: usize,
    /// Cell size of the grid thermal clusters are found on (m)
    pub thermal_grid_resolution: f64,
    /// Kernel density search radius for reflectance anomalies (m)
    pub density_search_radius: f64,
    pub reflectance_min_points: usize,
    /// Planar coordinate system of every output
    pub epsg: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            projection: ProjectionParams::default(),
            plane_strip: PlaneStripParams::default(),
            anomaly: AnomalyParams::default(),
            clustering: ClusterParams::default(),
            output: RasterParams::default(),
            vegetation_buffer: 150.0,
            thermal_min_valid_pixels: 100,
            thermal_grid_resolution: 0.25,
            density_search_radius: 5.0,
            reflectance_min_points: 2,
            epsg: 27700, // British National Grid
        }
    }
}

/// Height of non-planar structure above local ground
#[derive(Debug, Clone)]
pub struct VegetationProduct {
    pub heights: Raster<f32>,
    pub planes: Vec<StrippedPlane>,
    pub structure_points: usize,
}

/// Cluster ids of thermal anomalies on the output grid
#[derive(Debug, Clone)]
pub struct ThermalAnomalyProduct {
    pub clusters: Raster<i32>,
    /// Same labels at the clustering resolution
    pub fine_clusters: Raster<i32>,
    pub n_clusters: usize,
    pub anomalous_points: usize,
}

#[derive(Debug, Clone)]
pub struct ReflectanceAnomalyProduct {
    pub density: Raster<f32>,
    pub anomalous_points: usize,
}

fn conform_ranges<'a, R: Clone>(ranges: &'a Array2<R>, shape: (usize, usize)) -> Result<Cow<'a, Array2<R>>, EntityError> {
    if ranges.dim() == shape {
        Ok(Cow::Borrowed(ranges))
    } else {
        log::debug!("Resizing range image {:?} -> {:?}", ranges.dim(), shape);
        Ok(Cow::Owned(resize_nearest(ranges, shape)?))
    }
}

/// Bounding box of the points, at least one cell wide and tall
fn points_extent(points: &[GeoPoint], cell_size: f64) -> Option<Extent> {
    Extent::from_points(points.iter().map(|p| (p.x, p.y))).map(|e| e.with_min_size(cell_size))
}

/// Structural vegetation heights from a local point cloud.
///
/// Ground and dominant planes are stripped, the residual is moved to the
/// world frame and the tallest return per cell is kept, measured from the
/// capture's lowest point.
pub fn vegetation_structure(
    points_local: &[Vector3],
    origin: Origin,
    config: &PipelineConfig,
) -> Result<VegetationProduct, EntityError> {
    log::info!("Vegetation structure for {} local points", points_local.len());

    let strip = PlaneStripper::new(config.plane_strip.clone()).strip_planes(points_local)?;
    let world = translate_to_world(&strip.remaining, origin);
    let extent = Extent::around(origin, config.vegetation_buffer);
    let ground_z = strip.ground_z;

    let heights = rasterize_values(
        world.iter().map(|p| (p.x, p.y, p.z - ground_z)),
        extent,
        &config.output,
        Aggregation::Max,
    )?;
    if heights.valid_count() == 0 {
        return Err(SkipReason::NoPointsInExtent.into());
    }

    Ok(VegetationProduct {
        heights,
        planes: strip.planes,
        structure_points: world.len(),
    })
}

/// Surface model: highest z per cell over the capture's footprint.
///
/// A capture with a single point, or points along one line, still yields a
/// grid one cell across.
pub fn surface_model(
    points_local: &[Vector3],
    origin: Origin,
    config: &PipelineConfig,
) -> Result<Raster<f32>, EntityError> {
    if points_local.is_empty() {
        return Err(SkipReason::EmptyInput.into());
    }
    let world = translate_to_world(points_local, origin);
    let extent = Extent::from_points(world.iter().map(|p| (p.x, p.y)))
        .ok_or(SkipReason::EmptyInput)?
        .with_min_size(config.output.cell_size);
    rasterize_values(
        world.iter().map(|p| (p.x, p.y, p.z)),
        extent,
        &config.output,
        Aggregation::Max,
    )
}

/// World centroid of a capture
pub fn site_centroid(points_local: &[Vector3], origin: Origin) -> Result<Vector3, EntityError> {
    let world = translate_to_world(points_local, origin);
    centroid(&world).ok_or_else(|| SkipReason::EmptyInput.into())
}

/// Clustered thermal anomalies.
///
/// Anomalous pixels are projected, gridded at the clustering resolution,
/// clustered in cell space and written as ids from 1 on the output grid.
pub fn thermal_anomalies<R>(
    temperature: &Array2<f32>,
    ranges: &Array2<R>,
    origin: Origin,
    geometry: &BeamGeometry,
    config: &PipelineConfig,
) -> Result<ThermalAnomalyProduct, EntityError>
where
    R: ToPrimitive + Copy,
{
    log::info!("Thermal anomalies for {:?} image", temperature.dim());
    let ranges = conform_ranges(ranges, temperature.dim())?;

    let valid = finite_count(temperature);
    if valid < config.thermal_min_valid_pixels {
        log::debug!("{} finite pixels, need {}", valid, config.thermal_min_valid_pixels);
        return Err(SkipReason::InsufficientValidPixels.into());
    }

    let anomalies = anomaly_mask(temperature, config.anomaly.zscore_threshold)?;
    let points = project_with_params(
        temperature,
        &*ranges,
        geometry,
        origin,
        Some(&anomalies.mask),
        &config.projection,
    )?;
    if points.len() < config.clustering.min_samples {
        return Err(SkipReason::InsufficientPointsForClustering.into());
    }

    let extent = points_extent(&points, config.thermal_grid_resolution).ok_or(SkipReason::EmptyInput)?;
    let grid_params = RasterParams {
        cell_size: config.thermal_grid_resolution,
        ..config.output.clone()
    };
    let grid = rasterize(&points, extent, &grid_params, Aggregation::Max)?;

    let labeling = cluster_raster(&grid, &config.clustering)?;
    if labeling.n_clusters == 0 {
        return Err(SkipReason::NoClustersFound.into());
    }

    let fine_clusters = labeling.to_raster(grid.rows(), grid.cols(), grid.cell_size, grid.lower_left);
    let clusters = fine_clusters.resample_nearest(config.output.cell_size);
    log::info!(
        "{} thermal clusters from {} anomalous points ({} noise cells)",
        labeling.n_clusters,
        points.len(),
        labeling.noise_count()
    );

    Ok(ThermalAnomalyProduct {
        clusters,
        fine_clusters,
        n_clusters: labeling.n_clusters,
        anomalous_points: points.len(),
    })
}

/// Kernel density of reflectance anomalies
pub fn reflectance_anomalies<R>(
    reflectance: &Array2<f32>,
    ranges: &Array2<R>,
    origin: Origin,
    geometry: &BeamGeometry,
    config: &PipelineConfig,
) -> Result<ReflectanceAnomalyProduct, EntityError>
where
    R: ToPrimitive + Copy,
{
    log::info!("Reflectance anomalies for {:?} image", reflectance.dim());
    let ranges = conform_ranges(ranges, reflectance.dim())?;

    let anomalies = anomaly_mask(reflectance, config.anomaly.zscore_threshold)?;
    let points = project_with_params(
        &anomalies.scores,
        &*ranges,
        geometry,
        origin,
        Some(&anomalies.mask),
        &config.projection,
    )?;
    if points.len() < config.reflectance_min_points.max(1) {
        return Err(SkipReason::InsufficientAnomalousPoints.into());
    }

    let extent = points_extent(&points, config.output.cell_size)
        .ok_or(SkipReason::EmptyInput)?
        .buffered(config.density_search_radius);
    let xy: Vec<(f64, f64)> = points.iter().map(|p| (p.x, p.y)).collect();
    let density = kernel_density(&xy, extent, &config.output, config.density_search_radius)?;

    Ok(ReflectanceAnomalyProduct {
        density,
        anomalous_points: points.len(),
    })
}

/// Mean NDVI per cell
pub fn vegetation_index<R>(
    red: &Array2<f32>,
    nir: &Array2<f32>,
    ranges: &Array2<R>,
    origin: Origin,
    geometry: &BeamGeometry,
    config: &PipelineConfig,
) -> Result<Raster<f32>, EntityError>
where
    R: ToPrimitive + Copy,
{
    let nir = conform_ranges(nir, red.dim())?;
    let ranges = conform_ranges(ranges, red.dim())?;
    let index = ndvi(red, &*nir)?;

    let points = project_with_params(&index, &*ranges, geometry, origin, None, &config.projection)?;
    let extent = points_extent(&points, config.output.cell_size).ok_or(SkipReason::EmptyInput)?;
    rasterize(&points, extent, &config.output, Aggregation::Mean)
}
