use xri::core::clustering::{cluster_raster, ClusterParams, CellMetric};
use xri::types::{Raster, FLOAT_NODATA, LABEL_NODATA};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Two 4x4 blobs far apart plus one isolated cell
fn two_blob_grid() -> Raster<f32> {
    let mut grid = Raster::filled(25, 25, FLOAT_NODATA, 0.25, (1000.0, 2000.0));
    for r in 0..4 {
        for c in 0..4 {
            grid.data[[r, c]] = 1.0;
            grid.data[[r + 10, c + 10]] = 2.0;
        }
    }
    grid.data[[20, 0]] = 5.0;
    grid
}

fn params() -> ClusterParams {
    ClusterParams {
        eps_cells: 1.5,
        min_samples: 3,
        metric: CellMetric::Euclidean,
    }
}

#[test]
fn test_blobs_become_numbered_clusters() {
    init_logging();

    let grid = two_blob_grid();
    let labeling = cluster_raster(&grid, &params()).unwrap();
    assert_eq!(labeling.n_clusters, 2);
    assert_eq!(labeling.noise_count(), 1);

    let labels = labeling.to_raster(grid.rows(), grid.cols(), grid.cell_size, grid.lower_left);
    assert_eq!(labels.data[[0, 0]], 1);
    assert_eq!(labels.data[[3, 3]], 1);
    assert_eq!(labels.data[[12, 12]], 2);
    assert_eq!(labels.data[[20, 0]], LABEL_NODATA);
    assert_eq!(labels.data[[6, 6]], LABEL_NODATA);
    assert_eq!(labels.geo_transform(), grid.geo_transform());
}

#[test]
fn test_labeling_is_stable_across_runs() {
    let grid = two_blob_grid();
    let first = cluster_raster(&grid, &params()).unwrap();
    for _ in 0..5 {
        let again = cluster_raster(&grid, &params()).unwrap();
        assert_eq!(again.cells, first.cells);
        assert_eq!(again.labels, first.labels);
    }
}

#[test]
fn test_large_radius_merges_blobs() {
    let grid = two_blob_grid();
    let labeling = cluster_raster(
        &grid,
        &ClusterParams {
            eps_cells: 10.0,
            min_samples: 3,
            metric: CellMetric::Chebyshev,
        },
    )
    .unwrap();
    assert_eq!(labeling.n_clusters, 1);
    assert_eq!(labeling.noise_count(), 0);
}
