use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

use crate::types::{EntityError, Raster, SkipReason, XriError, LABEL_NODATA};

/// Label assigned to cells that belong to no cluster
pub const NOISE: i32 = -1;

/// Distance measured between grid cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellMetric {
    Euclidean,
    Chebyshev,
}

impl CellMetric {
    #[inline]
    fn within(&self, dr: isize, dc: isize, eps: f64) -> bool {
        match self {
            CellMetric::Euclidean => ((dr as f64).powi(2) + (dc as f64).powi(2)).sqrt() <= eps,
            CellMetric::Chebyshev => (dr.abs().max(dc.abs()) as f64) <= eps,
        }
    }
}

/// DBSCAN parameters in grid-index units
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterParams {
    /// Neighbourhood radius in cells
    pub eps_cells: f64,
    /// Neighbourhood size (including the cell itself) that makes a core cell
    pub min_samples: usize,
    pub metric: CellMetric,
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            eps_cells: 5.0,
            min_samples: 10,
            metric: CellMetric::Euclidean,
        }
    }
}

/// Cluster labels aligned with the input cells
#[derive(Debug, Clone)]
pub struct ClusterLabeling {
    pub cells: Vec<(usize, usize)>,
    /// Cluster index from 0, or [`NOISE`]
    pub labels: Vec<i32>,
    pub n_clusters: usize,
}

impl ClusterLabeling {
    pub fn noise_count(&self) -> usize {
        self.labels.iter().filter(|l| **l == NOISE).count()
    }

    /// Integer raster of cluster ids numbered from 1; noise and empty cells
    /// hold the raster's nodata value
    pub fn to_raster(&self, rows: usize, cols: usize, cell_size: f64, lower_left: (f64, f64)) -> Raster<i32> {
        let mut raster = Raster::filled(rows, cols, LABEL_NODATA, cell_size, lower_left);
        for (&(r, c), &label) in self.cells.iter().zip(&self.labels) {
            if label != NOISE && r < rows && c < cols {
                raster.data[[r, c]] = label + 1;
            }
        }
        raster
    }
}

/// Density-based clustering over occupied grid cells.
///
/// Cells are `(row, col)` and must be unique. Border cells join the first
/// cluster that reaches them; labels follow discovery order over the input.
pub fn cluster_cells(cells: &[(usize, usize)], params: &ClusterParams) -> Result<ClusterLabeling, EntityError> {
    if !(params.eps_cells >= 0.0) || !params.eps_cells.is_finite() || params.min_samples == 0 {
        return Err(XriError::InvalidInput(format!(
            "invalid clustering parameters: eps {} min_samples {}",
            params.eps_cells, params.min_samples
        ))
        .into());
    }
    if cells.len() < params.min_samples {
        return Err(SkipReason::InsufficientPointsForClustering.into());
    }

    log::info!(
        "Clustering {} cells (eps {} cells, min_samples {})",
        cells.len(),
        params.eps_cells,
        params.min_samples
    );

    let index: HashMap<(usize, usize), usize> = cells.iter().enumerate().map(|(i, &c)| (c, i)).collect();
    // No offset wider than the occupied span can reach another cell
    let span = cells
        .iter()
        .fold(None, |acc: Option<(usize, usize, usize, usize)>, &(r, c)| match acc {
            None => Some((r, r, c, c)),
            Some((r0, r1, c0, c1)) => Some((r0.min(r), r1.max(r), c0.min(c), c1.max(c))),
        })
        .map_or(0, |(r0, r1, c0, c1)| (r1 - r0).max(c1 - c0));
    let reach = params.eps_cells.floor().min(span as f64) as usize;

    // Offset table when it is smaller than the cell list, plain scan otherwise
    let table_size = reach
        .checked_mul(2)
        .and_then(|d| d.checked_add(1))
        .and_then(|side| side.checked_mul(side));
    let offsets: Option<Vec<(isize, isize)>> = match table_size {
        Some(n) if n <= cells.len() => {
            let reach = reach as isize;
            Some(
                (-reach..=reach)
                    .flat_map(|dr| (-reach..=reach).map(move |dc| (dr, dc)))
                    .filter(|&(dr, dc)| params.metric.within(dr, dc, params.eps_cells))
                    .collect(),
            )
        }
        _ => None,
    };
    log::debug!(
        "Neighbour search: {}",
        if offsets.is_some() { "offset table" } else { "cell scan" }
    );

    let neighbours = |i: usize| -> Vec<usize> {
        let (r, c) = cells[i];
        match &offsets {
            Some(offsets) => offsets
                .iter()
                .filter_map(|&(dr, dc)| {
                    let nr = r as isize + dr;
                    let nc = c as isize + dc;
                    if nr < 0 || nc < 0 {
                        return None;
                    }
                    index.get(&(nr as usize, nc as usize)).copied()
                })
                .collect(),
            None => cells
                .iter()
                .enumerate()
                .filter(|&(_, &(nr, nc))| {
                    let dr = nr as isize - r as isize;
                    let dc = nc as isize - c as isize;
                    params.metric.within(dr, dc, params.eps_cells)
                })
                .map(|(j, _)| j)
                .collect(),
        }
    };

    let mut labels = vec![NOISE; cells.len()];
    let mut visited = vec![false; cells.len()];
    let mut n_clusters = 0usize;

    for start in 0..cells.len() {
        if visited[start] {
            continue;
        }
        visited[start] = true;
        let seeds = neighbours(start);
        if seeds.len() < params.min_samples {
            continue;
        }

        let cluster = n_clusters as i32;
        n_clusters += 1;
        labels[start] = cluster;

        let mut queue: VecDeque<usize> = seeds.into_iter().collect();
        while let Some(j) = queue.pop_front() {
            if labels[j] == NOISE {
                labels[j] = cluster;
            }
            if visited[j] {
                continue;
            }
            visited[j] = true;
            let reachable = neighbours(j);
            if reachable.len() >= params.min_samples {
                queue.extend(reachable.into_iter().filter(|&k| !visited[k] || labels[k] == NOISE));
            }
        }
    }

    log::debug!("Found {} clusters", n_clusters);
    Ok(ClusterLabeling {
        cells: cells.to_vec(),
        labels,
        n_clusters,
    })
}

/// Cluster the populated cells of a raster
pub fn cluster_raster<T: Copy + PartialEq>(
    raster: &Raster<T>,
    params: &ClusterParams,
) -> Result<ClusterLabeling, EntityError> {
    let cells: Vec<(usize, usize)> = raster.valid_cells().map(|(r, c, _)| (r, c)).collect();
    cluster_cells(&cells, params)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(eps: f64, min_samples: usize) -> ClusterParams {
        ClusterParams {
            eps_cells: eps,
            min_samples,
            metric: CellMetric::Euclidean,
        }
    }

    #[test]
    fn test_two_blobs_and_noise() {
        let mut cells = Vec::new();
        for r in 0..3 {
            for c in 0..3 {
                cells.push((r, c));
                cells.push((r + 20, c + 20));
            }
        }
        cells.push((10, 40));

        let result = cluster_cells(&cells, &params(1.5, 4)).unwrap();
        assert_eq!(result.n_clusters, 2);
        assert_eq!(*result.labels.last().unwrap(), NOISE);
        assert_eq!(result.labels[0], 0);
        assert_eq!(result.labels[1], 1);
    }

    #[test]
    fn test_chebyshev_reaches_diagonals() {
        let cells = vec![(0, 0), (1, 1), (2, 2)];
        let euclid = cluster_cells(&cells, &params(1.0, 2)).unwrap();
        assert_eq!(euclid.n_clusters, 0);
        let cheb = cluster_cells(
            &cells,
            &ClusterParams {
                metric: CellMetric::Chebyshev,
                ..params(1.0, 2)
            },
        )
        .unwrap();
        assert_eq!(cheb.n_clusters, 1);
        assert!(cheb.labels.iter().all(|l| *l == 0));
    }

    #[test]
    fn test_border_cell_joins_cluster() {
        // Core at (0,1) with neighbours (0,0),(0,2),(1,1); (3,1) is isolated
        let cells = vec![(0, 0), (0, 1), (0, 2), (1, 1), (3, 1)];
        let result = cluster_cells(&cells, &params(1.0, 4)).unwrap();
        assert_eq!(result.labels[..4], [0, 0, 0, 0]);
        assert_eq!(result.labels[4], NOISE);
    }

    #[test]
    fn test_huge_radius_stays_bounded() {
        let cells = vec![(0, 0), (0, 5), (7, 2), (1_000_000, 3)];
        let result = cluster_cells(&cells, &params(1e12, 3)).unwrap();
        assert_eq!(result.n_clusters, 1);
        assert_eq!(result.noise_count(), 0);
    }

    #[test]
    fn test_non_finite_radius_is_invalid() {
        let cells = vec![(0, 0), (0, 1), (1, 0)];
        for eps in [f64::INFINITY, f64::NAN] {
            assert!(matches!(
                cluster_cells(&cells, &params(eps, 2)),
                Err(EntityError::Failed(XriError::InvalidInput(_)))
            ));
        }
    }

    #[test]
    fn test_too_few_cells() {
        let result = cluster_cells(&[(0, 0)], &params(5.0, 10));
        assert!(matches!(
            result,
            Err(EntityError::Skip(SkipReason::InsufficientPointsForClustering))
        ));
    }

    #[test]
    fn test_label_raster_offsets_ids_and_masks_noise() {
        let labeling = ClusterLabeling {
            cells: vec![(0, 0), (0, 1), (1, 1)],
            labels: vec![0, NOISE, 1],
            n_clusters: 2,
        };
        let raster = labeling.to_raster(2, 2, 0.25, (0.0, 0.0));
        assert_eq!(raster.data[[0, 0]], 1);
        assert_eq!(raster.data[[0, 1]], LABEL_NODATA);
        assert_eq!(raster.data[[1, 1]], 2);
        assert_eq!(raster.data[[1, 0]], LABEL_NODATA);
    }
}
