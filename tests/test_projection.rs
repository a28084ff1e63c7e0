use approx::assert_abs_diff_eq;
use ndarray::array;
use xri::core::beam_geometry::{BeamGeometry, BeamIntrinsics};
use xri::core::projection::{project, project_with_params, ProjectionParams};
use xri::types::{Origin, XriError};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn two_by_two_geometry() -> BeamGeometry {
    BeamGeometry::new(&BeamIntrinsics {
        beam_altitude_angles: vec![0.0, 10.0],
        beam_azimuth_angles: vec![0.0, 90.0],
    })
    .expect("valid intrinsics")
}

#[test]
fn test_panorama_projects_valid_ranges_only() {
    init_logging();

    let values = array![[1.0f32, 2.0], [3.0, 4.0]];
    let ranges = array![[1000u32, 2000], [0, 1500]];
    let origin = Origin::new(500000.0, 200000.0);

    let points = project(&values, &ranges, &two_by_two_geometry(), origin, None).unwrap();
    assert_eq!(points.len(), 3, "zero range must not produce a point");

    // straight ahead, 1 m
    assert_abs_diff_eq!(points[0].x, 500001.0, epsilon = 1e-9);
    assert_abs_diff_eq!(points[0].y, 200000.0, epsilon = 1e-9);
    assert_abs_diff_eq!(points[0].z, 0.0, epsilon = 1e-12);
    assert_eq!(points[0].value, 1.0);

    // 90 degrees azimuth, 2 m
    assert_abs_diff_eq!(points[1].x, 500000.0, epsilon = 1e-9);
    assert_abs_diff_eq!(points[1].y, 200002.0, epsilon = 1e-9);
    assert_eq!(points[1].value, 2.0);

    // 10 degrees up, 1.5 m
    let alt = 10f64.to_radians();
    assert_abs_diff_eq!(points[2].y, 200000.0 + 1.5 * alt.cos(), epsilon = 1e-9);
    assert_abs_diff_eq!(points[2].z, 1.5 * alt.sin(), epsilon = 1e-9);
    assert_eq!(points[2].value, 4.0);
}

#[test]
fn test_sanity_limit_is_exclusive() {
    init_logging();

    let geometry = BeamGeometry::new(&BeamIntrinsics {
        beam_altitude_angles: vec![0.0],
        beam_azimuth_angles: vec![0.0, 0.0, 0.0],
    })
    .unwrap();
    let values = array![[1.0f32, 2.0, 3.0]];
    let ranges = array![[99_999u32, 100_000, 250_000]];

    let points = project(&values, &ranges, &geometry, Origin::new(0.0, 0.0), None).unwrap();
    assert_eq!(points.len(), 1);
    assert_abs_diff_eq!(points[0].x, 99.999, epsilon = 1e-9);
}

#[test]
fn test_custom_range_scale() {
    let geometry = two_by_two_geometry();
    let values = array![[5.0f32, 5.0], [5.0, 5.0]];
    let ranges = array![[2.0f64, 0.0], [0.0, 0.0]];
    let params = ProjectionParams {
        range_scale: 1.0,
        range_sanity_max: 10.0,
    };

    let points = project_with_params(&values, &ranges, &geometry, Origin::new(0.0, 0.0), None, &params).unwrap();
    assert_eq!(points.len(), 1);
    assert_abs_diff_eq!(points[0].x, 2.0, epsilon = 1e-12);
}

#[test]
fn test_all_invalid_ranges_yield_empty_set() {
    let values = array![[1.0f32, 2.0], [3.0, 4.0]];
    let ranges = array![[0u32, 0], [0, 0]];
    let points = project(&values, &ranges, &two_by_two_geometry(), Origin::new(0.0, 0.0), None).unwrap();
    assert!(points.is_empty());
}

#[test]
fn test_rows_past_beam_table_reuse_last_angle() {
    let geometry = BeamGeometry::new(&BeamIntrinsics {
        beam_altitude_angles: vec![0.0],
        beam_azimuth_angles: vec![90.0],
    })
    .unwrap();
    let values = array![[1.0f32], [2.0]];
    let ranges = array![[1000u32], [1000]];

    let points = project(&values, &ranges, &geometry, Origin::new(0.0, 0.0), None).unwrap();
    assert_eq!(points.len(), 2);
    assert_abs_diff_eq!(points[0].y, points[1].y, epsilon = 1e-12);
}

#[test]
fn test_mask_shape_mismatch() {
    let values = array![[1.0f32, 2.0], [3.0, 4.0]];
    let ranges = array![[1000u32, 1000], [1000, 1000]];
    let mask = array![[true, true]];
    let result = project(&values, &ranges, &two_by_two_geometry(), Origin::new(0.0, 0.0), Some(&mask));
    assert!(matches!(result, Err(XriError::InvalidInput(_))));
}
