//! Texture edge strength from local feature dissimilarity.
//!
//! For an interior pixel the strength compares the features half a window
//! above against half a window below, and half a window left against half a
//! window right:
//!
//! `e = sqrt(‖f(x, y−ws) − f(x, y+ws)‖² + ‖f(x−ws, y) − f(x+ws, y)‖²)`
//!
//! Pixels closer than `ws` to the border hold [`EDGE_UNDEFINED`]. Low
//! strength marks homogeneous texture, which is where cluster seeds are
//! drawn from.
use crate::error::{FsegError, Result, Stage};
use crate::types::FeatureMatrix;
use log::{debug, warn};

/// Strength of pixels whose offset neighbours fall outside the image.
pub const EDGE_UNDEFINED: f32 = -1.0;

/// Per-pixel edge strength, row-major.
#[derive(Clone, Debug)]
pub struct EdgeStrengthMap {
    pub w: usize,
    pub h: usize,
    pub data: Vec<f32>,
}

impl EdgeStrengthMap {
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.w + x]
    }

    /// Largest defined strength, `None` when no pixel is interior.
    pub fn max(&self) -> Option<f32> {
        self.data
            .iter()
            .copied()
            .filter(|&e| e >= 0.0)
            .fold(None, |acc, e| Some(acc.map_or(e, |m: f32| m.max(e))))
    }

    /// Pixels with `0 ≤ e ≤ fraction · max(e)`, ascending linear index.
    pub fn seed_candidates(&self, fraction: f32) -> Vec<usize> {
        let Some(max) = self.max() else {
            return Vec::new();
        };
        let limit = fraction * max;
        self.data
            .iter()
            .enumerate()
            .filter(|&(_, &e)| e >= 0.0 && e <= limit)
            .map(|(i, _)| i)
            .collect()
    }
}

#[inline]
fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Edge strength of every pixel of a `w × h` feature matrix.
pub fn edge_strength_map<F: FeatureMatrix>(
    features: &F,
    w: usize,
    h: usize,
    half_window: usize,
) -> Result<EdgeStrengthMap> {
    if features.len() != w * h {
        return Err(FsegError::invalid(
            Stage::EdgeMap,
            format!(
                "feature matrix has {} pixels, image is {}x{}",
                features.len(),
                w,
                h
            ),
        ));
    }
    if half_window == 0 {
        return Err(FsegError::invalid(
            Stage::EdgeMap,
            "half window size must be positive",
        ));
    }
    let dim = features.dim();
    let ws = half_window;
    let mut data = vec![EDGE_UNDEFINED; w * h];

    let fill_row = |y: usize, row: &mut [f32]| {
        if y < ws || y + ws >= h {
            return;
        }
        let mut a = vec![0.0f64; dim];
        let mut b = vec![0.0f64; dim];
        for x in ws..w.saturating_sub(ws) {
            features.column_into((y - ws) * w + x, &mut a);
            features.column_into((y + ws) * w + x, &mut b);
            let vertical = squared_distance(&a, &b);
            features.column_into(y * w + x - ws, &mut a);
            features.column_into(y * w + x + ws, &mut b);
            let horizontal = squared_distance(&a, &b);
            row[x] = (vertical + horizontal).sqrt() as f32;
        }
    };
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        data.par_chunks_mut(w.max(1))
            .enumerate()
            .for_each(|(y, row)| fill_row(y, row));
    }
    #[cfg(not(feature = "parallel"))]
    {
        for (y, row) in data.chunks_mut(w.max(1)).enumerate() {
            fill_row(y, row);
        }
    }

    let map = EdgeStrengthMap { w, h, data };
    debug!(
        "edge_strength_map {}x{} ws={} max={:?}",
        w,
        h,
        ws,
        map.max()
    );
    Ok(map)
}

/// Seed candidates of `map`, falling back to every pixel when fewer than
/// `required` qualify. The flag reports whether the fallback was taken.
pub fn candidates_or_all(
    map: &EdgeStrengthMap,
    fraction: f32,
    required: usize,
) -> (Vec<usize>, bool) {
    let candidates = map.seed_candidates(fraction);
    if candidates.len() >= required {
        return (candidates, false);
    }
    warn!(
        "only {} low-edge pixels for {} segments; seeding from all pixels",
        candidates.len(),
        required
    );
    ((0..map.w * map.h).collect(), true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::ProjectedFeatures;
    use nalgebra::DMatrix;

    /// One scalar feature per pixel: 0 left of column `split`, 1 from it on.
    fn step(w: usize, h: usize, split: usize) -> ProjectedFeatures {
        let m = DMatrix::from_fn(1, w * h, |_, i| if i % w < split { 0.0 } else { 1.0 });
        ProjectedFeatures::from_matrix(w, h, m).unwrap()
    }

    #[test]
    fn border_pixels_are_undefined() {
        let f = step(8, 6, 4);
        let map = edge_strength_map(&f, 8, 6, 2).unwrap();
        for y in 0..6 {
            for x in 0..8 {
                let interior = (2..4).contains(&y) && (2..6).contains(&x);
                assert_eq!(map.get(x, y) >= 0.0, interior, "x={x} y={y}");
            }
        }
    }

    #[test]
    fn step_edge_peaks_around_the_boundary() {
        let f = step(10, 5, 5);
        let map = edge_strength_map(&f, 10, 5, 1).unwrap();
        // the horizontal pair straddles the step only at x = 4 and x = 5
        assert_eq!(map.get(4, 2), 1.0);
        assert_eq!(map.get(5, 2), 1.0);
        assert_eq!(map.get(2, 2), 0.0);
        assert_eq!(map.get(7, 2), 0.0);
        let candidates = map.seed_candidates(0.4);
        assert!(candidates.contains(&(2 * 10 + 2)));
        assert!(!candidates.contains(&(2 * 10 + 4)));
        assert!(!candidates.contains(&0));
    }

    #[test]
    fn too_few_candidates_fall_back_to_all_pixels() {
        let f = step(4, 4, 2);
        let map = edge_strength_map(&f, 4, 4, 1).unwrap();
        let (all, fallback) = candidates_or_all(&map, 0.4, 3);
        assert!(fallback);
        assert_eq!(all.len(), 16);
    }
}
