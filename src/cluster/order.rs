//! Segment-count estimation and eigen-subspace projection.
//!
//! The Gram matrix `S = Σ y yᵀ` of the local histograms is small
//! (`dim × dim`, with `dim = bins × channels`) and is decomposed once. Its
//! spectrum drives both the model-order heuristics and the projection basis.
//!
//! Strategies
//! - `EigenSpectrum`: sort eigenvalue magnitudes ascending, accumulate them
//!   and divide by the pixel count (the least-squares error left after
//!   dropping that many components). The segment count is the number of
//!   accumulated values above `omega`.
//! - `SingularEnergy`: singular values of the feature matrix (square roots of
//!   the Gram eigenvalues) in descending order; the segment count is the first
//!   prefix whose normalized energy reaches `1 − omega`.
//!
//! Both results are clamped to `[2, dim]`.
use crate::error::{FsegError, Result, Stage};
use crate::histogram::LocalHistograms;
use crate::types::FeatureMatrix;
use log::debug;
use nalgebra::{DMatrix, SymmetricEigen};
use serde::{Deserialize, Serialize};

/// Lower bound on the number of segments.
pub const MIN_SEGMENTS: usize = 2;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ModelOrderStrategy {
    #[default]
    EigenSpectrum,
    SingularEnergy,
}

/// Pixels per accumulation chunk in the parallel Gram reduction.
const GRAM_CHUNK: usize = 4096;

/// Gram matrix `Σ_j y_j y_jᵀ` of the histogram columns, in double precision.
pub fn gram_matrix(hist: &LocalHistograms) -> DMatrix<f64> {
    let dim = hist.dim;
    let accumulate = |mut acc: Vec<f64>, chunk: &[f32]| {
        for px in chunk.chunks_exact(dim) {
            for (i, &vi) in px.iter().enumerate() {
                if vi == 0.0 {
                    continue;
                }
                let vi = f64::from(vi);
                let row = &mut acc[i * dim..(i + 1) * dim];
                for (a, &vj) in row.iter_mut().zip(px) {
                    *a += vi * f64::from(vj);
                }
            }
        }
        acc
    };

    #[cfg(feature = "parallel")]
    let acc = {
        use rayon::prelude::*;
        hist.as_slice()
            .par_chunks(dim * GRAM_CHUNK)
            .fold(|| vec![0.0f64; dim * dim], accumulate)
            .reduce(
                || vec![0.0f64; dim * dim],
                |mut a, b| {
                    for (x, y) in a.iter_mut().zip(b) {
                        *x += y;
                    }
                    a
                },
            )
    };
    #[cfg(not(feature = "parallel"))]
    let acc = hist
        .as_slice()
        .chunks(dim * GRAM_CHUNK)
        .fold(vec![0.0f64; dim * dim], accumulate);

    DMatrix::from_row_slice(dim, dim, &acc)
}

/// Eigen-decomposition of the Gram matrix with eigenvalues in descending
/// order.
#[derive(Clone, Debug)]
pub struct Spectrum {
    /// Eigenvalues, largest first.
    pub eigenvalues: Vec<f64>,
    /// Eigenvectors as columns, matching `eigenvalues`.
    pub eigenvectors: DMatrix<f64>,
}

impl Spectrum {
    pub fn from_gram(gram: DMatrix<f64>) -> Self {
        let eig = SymmetricEigen::new(gram);
        let mut order: Vec<usize> = (0..eig.eigenvalues.len()).collect();
        order.sort_by(|&a, &b| {
            eig.eigenvalues[b]
                .partial_cmp(&eig.eigenvalues[a])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let eigenvalues = order.iter().map(|&i| eig.eigenvalues[i]).collect();
        let columns: Vec<_> = order
            .iter()
            .map(|&i| eig.eigenvectors.column(i).into_owned())
            .collect();
        Self {
            eigenvalues,
            eigenvectors: DMatrix::from_columns(&columns),
        }
    }

    pub fn dim(&self) -> usize {
        self.eigenvalues.len()
    }

    /// The `count` leading eigenvectors as a `dim × count` basis.
    pub fn basis(&self, count: usize) -> DMatrix<f64> {
        self.eigenvectors.columns(0, count.min(self.dim())).into_owned()
    }
}

/// Estimate the number of segments from the spectrum.
pub fn estimate_segments(
    spectrum: &Spectrum,
    pixels: usize,
    strategy: ModelOrderStrategy,
    omega: f64,
) -> usize {
    let dim = spectrum.dim();
    let raw = match strategy {
        ModelOrderStrategy::EigenSpectrum => {
            let pixels = pixels.max(1) as f64;
            let mut cumulative = 0.0;
            spectrum
                .eigenvalues
                .iter()
                .rev()
                .filter(|&&lambda| {
                    cumulative += lambda.abs();
                    cumulative / pixels > omega
                })
                .count()
        }
        ModelOrderStrategy::SingularEnergy => {
            let singular: Vec<f64> = spectrum
                .eigenvalues
                .iter()
                .map(|&l| l.max(0.0).sqrt())
                .collect();
            let total: f64 = singular.iter().sum();
            if total <= 0.0 {
                MIN_SEGMENTS
            } else {
                let mut cumulative = 0.0;
                singular
                    .iter()
                    .position(|&s| {
                        cumulative += s;
                        cumulative / total >= 1.0 - omega
                    })
                    .map_or(dim, |i| i + 1)
            }
        }
    };
    let segments = raw.clamp(MIN_SEGMENTS, dim.max(MIN_SEGMENTS));
    debug!(
        "estimate_segments strategy={:?} omega={} raw={} clamped={}",
        strategy, omega, raw, segments
    );
    segments
}

/// Histogram features projected onto a low-dimensional basis, one column
/// per pixel.
#[derive(Clone, Debug)]
pub struct ProjectedFeatures {
    pub w: usize,
    pub h: usize,
    data: DMatrix<f64>,
}

impl ProjectedFeatures {
    /// Wrap a `dim × (w·h)` matrix.
    pub fn from_matrix(w: usize, h: usize, data: DMatrix<f64>) -> Result<Self> {
        if data.ncols() != w * h {
            return Err(FsegError::invalid(
                Stage::ModelOrder,
                format!(
                    "projected matrix has {} columns, expected {}",
                    data.ncols(),
                    w * h
                ),
            ));
        }
        Ok(Self { w, h, data })
    }

    #[inline]
    pub fn column(&self, idx: usize) -> &[f64] {
        let dim = self.data.nrows();
        &self.data.as_slice()[idx * dim..(idx + 1) * dim]
    }

    pub fn as_matrix(&self) -> &DMatrix<f64> {
        &self.data
    }
}

impl FeatureMatrix for ProjectedFeatures {
    fn dim(&self) -> usize {
        self.data.nrows()
    }

    fn len(&self) -> usize {
        self.data.ncols()
    }

    fn column_into(&self, idx: usize, out: &mut [f64]) {
        out.copy_from_slice(self.column(idx));
    }
}

/// Project every histogram onto `basis` (`dim × k`): `y1 = basisᵀ y`.
pub fn project(hist: &LocalHistograms, basis: &DMatrix<f64>) -> Result<ProjectedFeatures> {
    if basis.nrows() != hist.dim {
        return Err(FsegError::invalid(
            Stage::ModelOrder,
            format!(
                "basis has {} rows, histograms have {} features",
                basis.nrows(),
                hist.dim
            ),
        ));
    }
    let k = basis.ncols();
    let n = hist.w * hist.h;
    let mut data = DMatrix::<f64>::zeros(k, n);
    let project_column = |idx: usize, out: &mut [f64]| {
        for (d, &v) in hist.feature(idx).iter().enumerate() {
            if v == 0.0 {
                continue;
            }
            let v = f64::from(v);
            for (r, o) in out.iter_mut().enumerate() {
                *o += basis[(d, r)] * v;
            }
        }
    };
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        data.as_mut_slice()
            .par_chunks_mut(k)
            .enumerate()
            .for_each(|(idx, out)| project_column(idx, out));
    }
    #[cfg(not(feature = "parallel"))]
    {
        for (idx, out) in data.as_mut_slice().chunks_mut(k).enumerate() {
            project_column(idx, out);
        }
    }
    ProjectedFeatures::from_matrix(hist.w, hist.h, data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spectrum(values: &[f64]) -> Spectrum {
        Spectrum::from_gram(DMatrix::from_diagonal(&nalgebra::DVector::from_row_slice(
            values,
        )))
    }

    #[test]
    fn spectrum_is_sorted_descending() {
        let s = spectrum(&[1.0, 9.0, 4.0]);
        for (got, want) in s.eigenvalues.iter().zip([9.0, 4.0, 1.0]) {
            assert!((got - want).abs() < 1e-9, "got={got} want={want}");
        }
        // leading eigenvector is the axis of the 9.0 entry
        assert!((s.eigenvectors[(1, 0)].abs() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn eigen_strategy_counts_residuals_above_omega() {
        // 10 pixels; ascending residuals: 0.1, 0.3, 1.3, 5.3, 105.3 -> /10
        let s = spectrum(&[100.0, 4.0, 1.0, 0.2, 0.1]);
        let n = estimate_segments(&s, 10, ModelOrderStrategy::EigenSpectrum, 0.05);
        // 0.01, 0.03, 0.13, 0.53, 10.53 -> three above 0.05
        assert_eq!(n, 3);
    }

    #[test]
    fn singular_strategy_reaches_energy_target() {
        let s = spectrum(&[81.0, 9.0, 0.01, 0.01]);
        // singular values 9, 3, 0.1, 0.1 -> cumulative 0.738, 0.984, ...
        let n = estimate_segments(&s, 100, ModelOrderStrategy::SingularEnergy, 0.05);
        assert_eq!(n, 2);
        let n = estimate_segments(&s, 100, ModelOrderStrategy::SingularEnergy, 0.001);
        assert_eq!(n, 4);
    }

    #[test]
    fn estimate_never_drops_below_two() {
        let s = spectrum(&[5.0, 0.0, 0.0, 0.0]);
        for omega in [0.0, 0.045, 1.0, 1e6] {
            for strategy in [
                ModelOrderStrategy::EigenSpectrum,
                ModelOrderStrategy::SingularEnergy,
            ] {
                let n = estimate_segments(&s, 16, strategy, omega);
                assert!(n >= MIN_SEGMENTS, "strategy={strategy:?} omega={omega} n={n}");
            }
        }
    }
}
