use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::types::{EntityError, SkipReason, Vector3, XriError};

/// Parameters for greedy planar-surface removal
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaneStripParams {
    /// Height above the lowest point below which everything is ground (m)
    pub above_ground_margin: f64,
    /// Minimum above-ground points required to continue
    pub min_above_ground_points: usize,
    /// Max point-to-plane distance for an inlier (m)
    pub distance_threshold: f64,
    /// Points drawn per RANSAC hypothesis
    pub ransac_n: usize,
    /// RANSAC hypotheses per pass
    pub max_iterations: usize,
    /// Planes removed, one per pass
    pub num_passes: usize,
    /// Fixed seed for reproducible sampling; entropy-seeded when absent
    pub seed: Option<u64>,
}

impl Default for PlaneStripParams {
    fn default() -> Self {
        Self {
            above_ground_margin: 2.5,
            min_above_ground_points: 100,
            distance_threshold: 0.2,
            ransac_n: 3,
            max_iterations: 1000,
            num_passes: 5,
            seed: None,
        }
    }
}

/// Plane in Hessian normal form: `normal . p + d = 0`, `|normal| = 1`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    pub normal: Vector3,
    pub d: f64,
}

impl Plane {
    /// Plane through three points, `None` when they are collinear
    pub fn through(a: &Vector3, b: &Vector3, c: &Vector3) -> Option<Plane> {
        let normal = b.sub(a).cross(&c.sub(a));
        Self::from_normal(normal, a)
    }

    /// Least-squares plane through a sample of three or more points
    pub fn fit(points: &[Vector3]) -> Option<Plane> {
        match points.len() {
            0..=2 => None,
            3 => Self::through(&points[0], &points[1], &points[2]),
            n => {
                let n_f = n as f64;
                let (sx, sy, sz) = points
                    .iter()
                    .fold((0.0, 0.0, 0.0), |(x, y, z), p| (x + p.x, y + p.y, z + p.z));
                let centroid = Vector3::new(sx / n_f, sy / n_f, sz / n_f);

                let (mut xx, mut xy, mut xz, mut yy, mut yz, mut zz) = (0.0, 0.0, 0.0, 0.0, 0.0, 0.0);
                for p in points {
                    let r = p.sub(&centroid);
                    xx += r.x * r.x;
                    xy += r.x * r.y;
                    xz += r.x * r.z;
                    yy += r.y * r.y;
                    yz += r.y * r.z;
                    zz += r.z * r.z;
                }

                // Normal along the axis whose cofactor determinant dominates
                let det_x = yy * zz - yz * yz;
                let det_y = xx * zz - xz * xz;
                let det_z = xx * yy - xy * xy;
                let det_max = det_x.max(det_y).max(det_z);
                if det_max <= f64::EPSILON {
                    return None;
                }
                let normal = if det_max == det_x {
                    Vector3::new(det_x, xz * yz - xy * zz, xy * yz - xz * yy)
                } else if det_max == det_y {
                    Vector3::new(xz * yz - xy * zz, det_y, xy * xz - yz * xx)
                } else {
                    Vector3::new(xy * yz - xz * yy, xy * xz - yz * xx, det_z)
                };
                Self::from_normal(normal, &centroid)
            }
        }
    }

    fn from_normal(normal: Vector3, on_plane: &Vector3) -> Option<Plane> {
        let len = normal.norm();
        if !len.is_finite() || len < 1e-12 {
            return None;
        }
        let normal = Vector3::new(normal.x / len, normal.y / len, normal.z / len);
        Some(Plane {
            normal,
            d: -normal.dot(on_plane),
        })
    }

    /// Unsigned point-to-plane distance
    #[inline]
    pub fn distance(&self, p: &Vector3) -> f64 {
        (self.normal.dot(p) + self.d).abs()
    }
}

/// One removed plane
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrippedPlane {
    pub plane: Plane,
    pub inliers: usize,
    /// Points left after this pass
    pub remaining: usize,
}

/// Residual non-planar structure plus a record of every pass
#[derive(Debug, Clone)]
pub struct PlaneStripResult {
    /// Lowest z of the input, the local ground reference
    pub ground_z: f64,
    pub above_ground_count: usize,
    pub planes: Vec<StrippedPlane>,
    pub remaining: Vec<Vector3>,
}

/// Greedy RANSAC planar-surface stripper
pub struct PlaneStripper {
    params: PlaneStripParams,
}

impl PlaneStripper {
    pub fn new(params: PlaneStripParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &PlaneStripParams {
        &self.params
    }

    /// Drop ground, then remove the dominant plane `num_passes` times.
    ///
    /// A pass that cannot form a plane (too few points left, or only
    /// degenerate samples) ends the stripping early.
    pub fn strip_planes(&self, points: &[Vector3]) -> Result<PlaneStripResult, EntityError> {
        let p = &self.params;
        if p.ransac_n < 3 {
            return Err(XriError::Configuration(format!(
                "ransac_n must be at least 3, got {}",
                p.ransac_n
            ))
            .into());
        }
        if points.is_empty() {
            return Err(SkipReason::EmptyInput.into());
        }

        log::info!(
            "Stripping up to {} planes from {} points",
            p.num_passes,
            points.len()
        );

        let ground_z = points.iter().map(|pt| pt.z).fold(f64::INFINITY, f64::min);
        let mut remaining: Vec<Vector3> = points
            .iter()
            .filter(|pt| pt.z > ground_z + p.above_ground_margin)
            .copied()
            .collect();
        let above_ground_count = remaining.len();
        log::debug!(
            "Ground z {:.3}, {} points above {:.2} m margin",
            ground_z,
            above_ground_count,
            p.above_ground_margin
        );

        if above_ground_count < p.min_above_ground_points {
            return Err(SkipReason::NoAboveGroundPoints.into());
        }

        let mut rng = match p.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut planes = Vec::with_capacity(p.num_passes);
        for pass in 0..p.num_passes {
            if remaining.len() < p.ransac_n {
                log::debug!("Pass {}: only {} points left, stopping", pass, remaining.len());
                break;
            }

            let samples: Vec<Vec<usize>> = (0..p.max_iterations)
                .map(|_| rand::seq::index::sample(&mut rng, remaining.len(), p.ransac_n).into_vec())
                .collect();

            let Some((plane, inliers)) = self.best_plane(&remaining, &samples) else {
                log::debug!("Pass {}: no non-degenerate sample, stopping", pass);
                break;
            };

            remaining.retain(|pt| plane.distance(pt) > p.distance_threshold);
            log::debug!(
                "Pass {}: removed {} inliers, {} points remain",
                pass,
                inliers,
                remaining.len()
            );
            planes.push(StrippedPlane {
                plane,
                inliers,
                remaining: remaining.len(),
            });
        }

        if remaining.is_empty() {
            return Err(SkipReason::NoComplexStructures.into());
        }

        Ok(PlaneStripResult {
            ground_z,
            above_ground_count,
            planes,
            remaining,
        })
    }

    /// Highest-support hypothesis; ties go to the earliest trial
    fn best_plane(&self, points: &[Vector3], samples: &[Vec<usize>]) -> Option<(Plane, usize)> {
        self.score_trials(points, samples)
            .map(|(_, plane, inliers)| (plane, inliers))
    }

    fn score_trial(&self, points: &[Vector3], trial: usize, sample: &[usize]) -> Option<(usize, Plane, usize)> {
        let picked: Vec<Vector3> = sample.iter().map(|&i| points[i]).collect();
        let plane = Plane::fit(&picked)?;
        let threshold = self.params.distance_threshold;
        let inliers = points.iter().filter(|pt| plane.distance(pt) <= threshold).count();
        Some((trial, plane, inliers))
    }

    #[cfg(feature = "parallel")]
    fn score_trials(&self, points: &[Vector3], samples: &[Vec<usize>]) -> Option<(usize, Plane, usize)> {
        use rayon::prelude::*;

        samples
            .par_iter()
            .enumerate()
            .filter_map(|(trial, sample)| self.score_trial(points, trial, sample))
            .reduce_with(better_trial)
    }

    #[cfg(not(feature = "parallel"))]
    fn score_trials(&self, points: &[Vector3], samples: &[Vec<usize>]) -> Option<(usize, Plane, usize)> {
        samples
            .iter()
            .enumerate()
            .filter_map(|(trial, sample)| self.score_trial(points, trial, sample))
            .reduce(better_trial)
    }
}

fn better_trial(a: (usize, Plane, usize), b: (usize, Plane, usize)) -> (usize, Plane, usize) {
    if b.2 > a.2 || (b.2 == a.2 && b.0 < a.0) {
        b
    } else {
        a
    }
}

/// Convenience wrapper over [`PlaneStripper::strip_planes`]
pub fn strip_planes(points: &[Vector3], params: &PlaneStripParams) -> Result<PlaneStripResult, EntityError> {
    PlaneStripper::new(params.clone()).strip_planes(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_plane_through_points() {
        let plane = Plane::through(
            &Vector3::new(0.0, 0.0, 2.0),
            &Vector3::new(1.0, 0.0, 2.0),
            &Vector3::new(0.0, 1.0, 2.0),
        )
        .unwrap();
        assert_abs_diff_eq!(plane.normal.z.abs(), 1.0);
        assert_abs_diff_eq!(plane.distance(&Vector3::new(5.0, 5.0, 3.5)), 1.5);
    }

    #[test]
    fn test_collinear_points_have_no_plane() {
        let a = Vector3::new(0.0, 0.0, 0.0);
        let b = Vector3::new(1.0, 1.0, 1.0);
        let c = Vector3::new(2.0, 2.0, 2.0);
        assert!(Plane::through(&a, &b, &c).is_none());
        assert!(Plane::fit(&[a, b, c, Vector3::new(3.0, 3.0, 3.0)]).is_none());
    }

    #[test]
    fn test_least_squares_fit_recovers_tilted_plane() {
        // x + z = 4
        let points: Vec<Vector3> = (0..5)
            .flat_map(|i| (0..5).map(move |j| Vector3::new(i as f64, j as f64, 4.0 - i as f64)))
            .collect();
        let plane = Plane::fit(&points).unwrap();
        for p in &points {
            assert_abs_diff_eq!(plane.distance(p), 0.0, epsilon = 1e-9);
        }
        assert_abs_diff_eq!(plane.normal.y, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_ransac_n_below_three_is_configuration_error() {
        let params = PlaneStripParams {
            ransac_n: 2,
            ..Default::default()
        };
        let result = strip_planes(&[Vector3::new(0.0, 0.0, 0.0)], &params);
        assert!(matches!(
            result,
            Err(EntityError::Failed(XriError::Configuration(_)))
        ));
    }
}
