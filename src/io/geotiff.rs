use gdal::raster::{Buffer, GdalType};
use gdal::spatial_ref::SpatialRef;
use gdal::DriverManager;
use num_traits::ToPrimitive;
use std::path::Path;

use crate::types::{Raster, XriError, XriResult};

/// Save a raster as a single-band GeoTIFF in the given EPSG system
pub fn write_geotiff<T, P>(raster: &Raster<T>, output_path: P, epsg: u32) -> XriResult<()>
where
    T: GdalType + Copy + PartialEq + ToPrimitive,
    P: AsRef<Path>,
{
    log::info!("Saving raster as GeoTIFF: {}", output_path.as_ref().display());

    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let (height, width) = raster.data.dim();

    let mut dataset = driver.create_with_band_type::<T, _>(
        output_path.as_ref(),
        width as isize,
        height as isize,
        1,
    )?;

    dataset.set_geo_transform(&raster.geo_transform().to_array())?;
    dataset.set_spatial_ref(&SpatialRef::from_epsg(epsg)?)?;

    let mut rasterband = dataset.rasterband(1)?;
    let flat_data: Vec<T> = raster.data.iter().copied().collect();
    let buffer = Buffer::new((width, height), flat_data);
    rasterband.write((0, 0), (width, height), &buffer)?;

    let nodata = raster
        .nodata
        .to_f64()
        .ok_or_else(|| XriError::Processing("nodata value not representable as f64".to_string()))?;
    rasterband.set_no_data_value(Some(nodata))?;

    log::debug!("Wrote {}x{} raster, nodata {}", width, height, nodata);
    Ok(())
}
