//! Python bindings for the raster building blocks

use ndarray::Array2;
use numpy::{PyReadonlyArray2, ToPyArray};
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;

use crate::core::anomaly::anomaly_mask as zscore_mask;
use crate::core::batch::split_skip;
use crate::core::beam_geometry::{BeamGeometry, BeamIntrinsics};
use crate::core::clustering::{cluster_raster, CellMetric, ClusterParams};
use crate::core::plane_strip::{PlaneStripParams, PlaneStripper};
use crate::core::projection::project;
use crate::core::rasterize::{rasterize_values, Aggregation, RasterParams};
use crate::types::{EntityError, Extent, Origin, Vector3, XriError};

fn to_py_err(e: XriError) -> PyErr {
    match e {
        XriError::Configuration(_) | XriError::InvalidInput(_) => PyValueError::new_err(e.to_string()),
        _ => PyRuntimeError::new_err(e.to_string()),
    }
}

/// Build the `(value, skip)` pair returned to Python: `(value, None)` on
/// success, `(None, "REASON_CODE")` on a named skip; failures raise
fn with_skip<T, F>(py: Python, result: Result<T, EntityError>, convert: F) -> PyResult<PyObject>
where
    F: FnOnce(T) -> PyResult<PyObject>,
{
    match split_skip(result).map_err(to_py_err)? {
        Ok(value) => {
            let value = convert(value)?;
            Ok((value, py.None()).into_py(py))
        }
        Err(reason) => {
            log::info!("Skipped: {}", reason);
            Ok((py.None(), reason.code()).into_py(py))
        }
    }
}

fn parse_aggregation(name: &str) -> PyResult<Aggregation> {
    serde_json::from_value(serde_json::Value::String(name.to_uppercase()))
        .map_err(|_| PyValueError::new_err(format!("Invalid aggregation: {}", name)))
}

/// Project a value image into an (N, 4) array of x, y, z, value
#[pyfunction]
#[pyo3(signature = (values, ranges, beam_altitude_angles, beam_azimuth_angles, origin, mask=None))]
fn project_image(
    py: Python,
    values: PyReadonlyArray2<f32>,
    ranges: PyReadonlyArray2<u32>,
    beam_altitude_angles: Vec<f64>,
    beam_azimuth_angles: Vec<f64>,
    origin: (f64, f64),
    mask: Option<PyReadonlyArray2<bool>>,
) -> PyResult<PyObject> {
    let geometry = BeamGeometry::new(&BeamIntrinsics {
        beam_altitude_angles,
        beam_azimuth_angles,
    })
    .map_err(to_py_err)?;
    let mask = mask.map(|m| m.as_array().to_owned());
    let points = project(
        &values.as_array().to_owned(),
        &ranges.as_array().to_owned(),
        &geometry,
        Origin::from(origin),
        mask.as_ref(),
    )
    .map_err(to_py_err)?;

    let flat: Vec<f64> = points.iter().flat_map(|p| [p.x, p.y, p.z, p.value]).collect();
    let table = Array2::from_shape_vec((points.len(), 4), flat).map_err(|e| to_py_err(e.into()))?;
    Ok(table.to_pyarray(py).into())
}

/// Z-score anomaly mask as `(dict, None)`, or `(None, "NO_VARIANCE")`
#[pyfunction]
#[pyo3(signature = (values, threshold=1.5))]
fn anomaly_mask(py: Python, values: PyReadonlyArray2<f32>, threshold: f64) -> PyResult<PyObject> {
    let result = zscore_mask(&values.as_array().to_owned(), threshold);
    with_skip(py, result, |result| {
        let out = PyDict::new(py);
        out.set_item("scores", result.scores.to_pyarray(py))?;
        out.set_item("mask", result.mask.to_pyarray(py))?;
        out.set_item("mean", result.mean)?;
        out.set_item("std", result.std_dev)?;
        Ok(out.into())
    })
}

/// Bin (N, 3) x, y, value samples onto a grid over `extent` = (min_x, max_x, min_y, max_y)
#[pyfunction]
#[pyo3(signature = (samples, extent, cell_size=1.0, aggregation="MAX", nodata=-9999.0))]
fn rasterize_points(
    py: Python,
    samples: PyReadonlyArray2<f64>,
    extent: (f64, f64, f64, f64),
    cell_size: f64,
    aggregation: &str,
    nodata: f32,
) -> PyResult<PyObject> {
    let samples = samples.as_array();
    if samples.ncols() < 3 {
        return Err(PyValueError::new_err("samples must have x, y, value columns"));
    }
    let aggregation = parse_aggregation(aggregation)?;
    let extent = Extent::new(extent.0, extent.1, extent.2, extent.3);
    let params = RasterParams {
        cell_size,
        nodata,
        ..RasterParams::default()
    };

    let rows = samples.rows().into_iter().map(|r| (r[0], r[1], r[2]));
    with_skip(py, rasterize_values(rows, extent, &params, aggregation), |raster| {
        let out = PyDict::new(py);
        out.set_item("data", raster.data.to_pyarray(py))?;
        out.set_item("geo_transform", raster.geo_transform().to_array().to_vec())?;
        Ok(out.into())
    })
}

/// Cluster the valid cells of a grid; labels from 1, noise and empty cells -1
#[pyfunction]
#[pyo3(signature = (grid, nodata=-9999.0, eps_cells=5.0, min_samples=10, metric="euclidean"))]
fn cluster_grid(
    py: Python,
    grid: PyReadonlyArray2<f32>,
    nodata: f32,
    eps_cells: f64,
    min_samples: usize,
    metric: &str,
) -> PyResult<PyObject> {
    let metric = match metric.to_lowercase().as_str() {
        "euclidean" => CellMetric::Euclidean,
        "chebyshev" => CellMetric::Chebyshev,
        _ => return Err(PyValueError::new_err(format!("Invalid metric: {}", metric))),
    };
    let raster = crate::types::Raster {
        data: grid.as_array().to_owned(),
        nodata,
        cell_size: 1.0,
        lower_left: (0.0, 0.0),
    };
    let params = ClusterParams {
        eps_cells,
        min_samples,
        metric,
    };
    with_skip(py, cluster_raster(&raster, &params), |labeling| {
        let labels = labeling.to_raster(raster.rows(), raster.cols(), 1.0, (0.0, 0.0));
        Ok(labels.data.to_pyarray(py).into())
    })
}

/// Strip ground and dominant planes from an (N, 3) local point cloud
#[pyfunction]
#[pyo3(signature = (points, num_passes=5, distance_threshold=0.2, seed=None))]
fn strip_planes(
    py: Python,
    points: PyReadonlyArray2<f64>,
    num_passes: usize,
    distance_threshold: f64,
    seed: Option<u64>,
) -> PyResult<PyObject> {
    let points = points.as_array();
    if points.ncols() < 3 {
        return Err(PyValueError::new_err("points must have x, y, z columns"));
    }
    let cloud: Vec<Vector3> = points.rows().into_iter().map(|r| Vector3::new(r[0], r[1], r[2])).collect();
    let stripper = PlaneStripper::new(PlaneStripParams {
        num_passes,
        distance_threshold,
        seed,
        ..PlaneStripParams::default()
    });
    with_skip(py, stripper.strip_planes(&cloud), |result| {
        let flat: Vec<f64> = result.remaining.iter().flat_map(|p| [p.x, p.y, p.z]).collect();
        let table = Array2::from_shape_vec((result.remaining.len(), 3), flat).map_err(|e| to_py_err(e.into()))?;
        Ok(table.to_pyarray(py).into())
    })
}

/// Python module definition
#[pymodule]
fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(project_image, m)?)?;
    m.add_function(wrap_pyfunction!(anomaly_mask, m)?)?;
    m.add_function(wrap_pyfunction!(rasterize_points, m)?)?;
    m.add_function(wrap_pyfunction!(cluster_grid, m)?)?;
    m.add_function(wrap_pyfunction!(strip_planes, m)?)?;
    Ok(())
}
