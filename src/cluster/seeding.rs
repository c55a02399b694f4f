use super::order::ProjectedFeatures;
use crate::error::{FsegError, Result, Stage};
use crate::types::FeatureMatrix;
use log::debug;

#[inline]
fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Index of the first maximum of `values`.
fn argmax(values: &[f64]) -> Option<usize> {
    let mut best = None;
    let mut best_val = f64::NEG_INFINITY;
    for (i, &v) in values.iter().enumerate() {
        if v > best_val {
            best_val = v;
            best = Some(i);
        }
    }
    best
}

/// Greedy farthest-point seeding.
///
/// The first seed is the candidate with the largest squared norm; every
/// following seed maximizes the minimum squared distance to the seeds chosen
/// so far. Returns pixel indices (taken from `candidates`) in selection order.
pub fn farthest_point_seeds(
    features: &ProjectedFeatures,
    candidates: &[usize],
    segments: usize,
) -> Result<Vec<usize>> {
    if candidates.len() < segments {
        return Err(FsegError::invalid(
            Stage::Seeding,
            format!(
                "{} candidate pixels cannot seed {} segments",
                candidates.len(),
                segments
            ),
        ));
    }
    if let Some(&bad) = candidates.iter().find(|&&c| c >= features.len()) {
        return Err(FsegError::invalid(
            Stage::Seeding,
            format!("candidate pixel {bad} is outside the image"),
        ));
    }

    let norms: Vec<f64> = candidates
        .iter()
        .map(|&c| features.column(c).iter().map(|v| v * v).sum())
        .collect();
    let Some(first) = argmax(&norms) else {
        return Ok(Vec::new());
    };
    let mut seeds = Vec::with_capacity(segments);
    seeds.push(candidates[first]);

    let mut min_dist: Vec<f64> = vec![f64::INFINITY; candidates.len()];
    while seeds.len() < segments {
        let newest = features.column(*seeds.last().unwrap_or(&candidates[first]));
        let update = |(d, &c): (&mut f64, &usize)| {
            let dist = squared_distance(features.column(c), newest);
            if dist < *d {
                *d = dist;
            }
        };
        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            min_dist
                .par_iter_mut()
                .zip(candidates.par_iter())
                .for_each(update);
        }
        #[cfg(not(feature = "parallel"))]
        {
            min_dist.iter_mut().zip(candidates.iter()).for_each(update);
        }
        let next = argmax(&min_dist).unwrap_or(first);
        debug!(
            "farthest_point_seeds pick={} pixel={} min_dist={:.6}",
            seeds.len(),
            candidates[next],
            min_dist[next]
        );
        seeds.push(candidates[next]);
    }
    Ok(seeds)
}
