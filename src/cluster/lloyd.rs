use super::order::ProjectedFeatures;
use crate::error::{FsegError, Result, Stage};
use crate::types::FeatureMatrix;
use log::debug;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// Parameters of the Lloyd refinement.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LloydParams {
    /// Stop once the largest squared per-coordinate center movement drops
    /// below this value.
    pub tolerance: f64,
    /// Iteration cap; reaching it yields a non-convergence warning.
    pub max_iterations: usize,
}

impl Default for LloydParams {
    fn default() -> Self {
        Self {
            tolerance: 1e-5,
            max_iterations: 300,
        }
    }
}

/// Final centers and convergence bookkeeping.
#[derive(Clone, Debug)]
pub struct LloydOutcome {
    /// Centers as columns (`dim × segments`).
    pub centers: DMatrix<f64>,
    pub iterations: usize,
    pub converged: bool,
    /// Largest squared coordinate movement of the last update.
    pub last_delta: f64,
}

#[inline]
fn nearest(point: &[f64], centers: &DMatrix<f64>) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (k, center) in centers.column_iter().enumerate() {
        let dist: f64 = point
            .iter()
            .zip(center.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum();
        if dist < best_dist {
            best_dist = dist;
            best = k;
        }
    }
    best
}

/// Accumulated coordinate sums (column-major `dim × k`) and member counts.
fn accumulate(
    features: &ProjectedFeatures,
    members: &[usize],
    centers: &DMatrix<f64>,
) -> (Vec<f64>, Vec<usize>) {
    let dim = centers.nrows();
    let k = centers.ncols();
    let add = |(mut sums, mut counts): (Vec<f64>, Vec<usize>), &idx: &usize| {
        let point = features.column(idx);
        let c = nearest(point, centers);
        for (s, &v) in sums[c * dim..(c + 1) * dim].iter_mut().zip(point) {
            *s += v;
        }
        counts[c] += 1;
        (sums, counts)
    };
    let empty = || (vec![0.0f64; dim * k], vec![0usize; k]);

    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        members.par_iter().fold(empty, add).reduce(empty, |mut a, b| {
            for (x, y) in a.0.iter_mut().zip(b.0) {
                *x += y;
            }
            for (x, y) in a.1.iter_mut().zip(b.1) {
                *x += y;
            }
            a
        })
    }
    #[cfg(not(feature = "parallel"))]
    {
        members.iter().fold(empty(), add)
    }
}

/// Lloyd iteration over the pixels listed in `members`, starting from
/// `initial` (`dim × segments`, one center per column).
///
/// A center that loses all of its members keeps its previous position.
pub fn lloyd(
    features: &ProjectedFeatures,
    members: &[usize],
    initial: DMatrix<f64>,
    params: &LloydParams,
) -> Result<LloydOutcome> {
    if initial.nrows() != features.dim() {
        return Err(FsegError::invalid(
            Stage::Lloyd,
            format!(
                "centers have {} coordinates, features have {}",
                initial.nrows(),
                features.dim()
            ),
        ));
    }
    if members.is_empty() {
        return Err(FsegError::invalid(Stage::Lloyd, "no pixels to cluster"));
    }

    let dim = initial.nrows();
    let mut centers = initial;
    let mut last_delta = f64::INFINITY;
    let mut iterations = 0;
    let mut converged = false;
    while iterations < params.max_iterations {
        iterations += 1;
        let (sums, counts) = accumulate(features, members, &centers);
        let mut updated = centers.clone();
        for (k, &count) in counts.iter().enumerate() {
            if count == 0 {
                continue;
            }
            let inv = 1.0 / count as f64;
            for d in 0..dim {
                updated[(d, k)] = sums[k * dim + d] * inv;
            }
        }
        last_delta = updated
            .iter()
            .zip(centers.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .fold(0.0, f64::max);
        centers = updated;
        debug!(
            "lloyd iter={} delta={:.3e} counts={:?}",
            iterations, last_delta, counts
        );
        if last_delta < params.tolerance {
            converged = true;
            break;
        }
    }

    Ok(LloydOutcome {
        centers,
        iterations,
        converged,
        last_delta,
    })
}

/// Nearest-center label of every pixel in `members`.
pub fn assign(features: &ProjectedFeatures, members: &[usize], centers: &DMatrix<f64>) -> Vec<u32> {
    members
        .iter()
        .map(|&idx| nearest(features.column(idx), centers) as u32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blobs() -> ProjectedFeatures {
        let mut pts = Vec::new();
        for i in 0..10 {
            let jitter = i as f64 * 0.01;
            pts.extend_from_slice(&[jitter, 0.0]);
            pts.extend_from_slice(&[5.0 + jitter, 5.0]);
        }
        let m = DMatrix::from_column_slice(2, 20, &pts);
        ProjectedFeatures::from_matrix(20, 1, m).unwrap()
    }

    #[test]
    fn converges_to_blob_means() {
        let f = blobs();
        let members: Vec<usize> = (0..20).collect();
        let init = DMatrix::from_column_slice(2, 2, &[1.0, 1.0, 4.0, 4.0]);
        let out = lloyd(&f, &members, init, &LloydParams::default()).unwrap();
        assert!(out.converged);
        assert!((out.centers[(0, 0)] - 0.045).abs() < 1e-9);
        assert!((out.centers[(1, 1)] - 5.0).abs() < 1e-9);
        let labels = assign(&f, &members, &out.centers);
        assert!(labels.iter().step_by(2).all(|&l| l == 0));
        assert!(labels.iter().skip(1).step_by(2).all(|&l| l == 1));
    }

    #[test]
    fn empty_cluster_keeps_its_center() {
        let f = blobs();
        let members: Vec<usize> = (0..20).collect();
        let init = DMatrix::from_column_slice(2, 3, &[0.0, 0.0, 5.0, 5.0, 100.0, 100.0]);
        let out = lloyd(&f, &members, init, &LloydParams::default()).unwrap();
        assert_eq!(out.centers[(0, 2)], 100.0);
        assert_eq!(out.centers[(1, 2)], 100.0);
    }

    #[test]
    fn iteration_cap_reports_non_convergence() {
        let f = blobs();
        let members: Vec<usize> = (0..20).collect();
        let init = DMatrix::from_column_slice(2, 2, &[1.0, 1.0, 4.0, 4.0]);
        let params = LloydParams {
            tolerance: 0.0,
            max_iterations: 2,
        };
        let out = lloyd(&f, &members, init, &params).unwrap();
        assert!(!out.converged);
        assert_eq!(out.iterations, 2);
    }
}
