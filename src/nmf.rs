//! Non-negative refinement of the label map.
//!
//! Alternating ridge-regularized least squares with clipping at zero:
//!
//! - `H = max(0, (WᵀW + λI)⁻¹ WᵀY)`
//! - `W = max(0, ((HHᵀ + λI)⁻¹ H Yᵀ)ᵀ)`
//!
//! `Y` holds one local histogram per column. Iteration stops once the RMSE of
//! `Y − WH` changes by less than the tolerance between two iterations, or at
//! the iteration cap. Each pixel is then labelled with the row of `H` holding
//! its largest coefficient.
use crate::cluster::regression::first_argmax;
use crate::error::{FsegError, Result, SegmentationWarning, Stage};
use crate::histogram::LocalHistograms;
use log::{debug, warn};
use nalgebra::DMatrix;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Source of the initial basis `W0`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum NmfInit {
    /// Cluster centers lifted back to histogram space, or manual templates.
    #[default]
    FromTemplates,
    /// Uniform `[0, 1)` entries from a seeded generator.
    Random { seed: u64 },
}

impl FromStr for NmfInit {
    type Err = FsegError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "templates" | "fromtemplates" => Ok(NmfInit::FromTemplates),
            "random" => Ok(NmfInit::Random { seed: 0 }),
            _ => Err(FsegError::UnsupportedOperation {
                name: s.to_string(),
                expected: "templates, random",
            }),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NmfParams {
    pub max_iterations: usize,
    /// Stop when `|rmse − rmse_prev|` drops below this value.
    pub tolerance: f64,
    /// Ridge `λ` added to both normal equations.
    pub ridge: f64,
    pub init: NmfInit,
}

impl Default for NmfParams {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tolerance: 0.1,
            ridge: 0.01,
            init: NmfInit::FromTemplates,
        }
    }
}

#[derive(Clone, Debug)]
pub struct NmfOutcome {
    /// Label per pixel, row-major.
    pub labels: Vec<u32>,
    /// Final basis (`dim × k`).
    pub w: DMatrix<f64>,
    /// Final coefficients (`k × pixels`).
    pub h: DMatrix<f64>,
    /// RMSE after every iteration.
    pub rmse: Vec<f64>,
    pub iterations: usize,
    pub converged: bool,
    pub warnings: Vec<SegmentationWarning>,
}

/// Random `dim × k` basis with entries uniform in `[0, 1)`.
pub fn random_basis<R: Rng>(dim: usize, k: usize, rng: &mut R) -> DMatrix<f64> {
    DMatrix::from_fn(dim, k, |_, _| rng.gen::<f64>())
}

/// Solve `(gram + λI) X = rhs` by Cholesky factorization.
fn ridge_solve(gram: DMatrix<f64>, ridge: f64, rhs: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    let k = gram.nrows();
    let system = gram + DMatrix::<f64>::identity(k, k) * ridge;
    let chol = system.cholesky().ok_or(FsegError::SingularMatrix {
        stage: Stage::Nmf,
        rank: 0,
        size: k,
    })?;
    Ok(chol.solve(rhs))
}

/// Root mean square of `Y − WH`.
fn reconstruction_rmse(y: &DMatrix<f64>, w: &DMatrix<f64>, h: &DMatrix<f64>) -> f64 {
    let dim = y.nrows();
    let n = y.ncols();
    if dim == 0 || n == 0 {
        return 0.0;
    }
    let column_sse = |j: usize| -> f64 {
        let hj = h.column(j);
        (0..dim)
            .map(|i| {
                let approx: f64 = (0..hj.len()).map(|k| w[(i, k)] * hj[k]).sum();
                let d = y[(i, j)] - approx;
                d * d
            })
            .sum()
    };
    #[cfg(feature = "parallel")]
    let sse: f64 = {
        use rayon::prelude::*;
        (0..n).into_par_iter().map(column_sse).sum()
    };
    #[cfg(not(feature = "parallel"))]
    let sse: f64 = (0..n).map(column_sse).sum();
    (sse / (dim * n) as f64).sqrt()
}

/// Label of every column of `h`: row index of its first maximum.
fn column_argmax(h: &DMatrix<f64>) -> Vec<u32> {
    h.column_iter()
        .map(|c| first_argmax(c.iter()) as u32)
        .collect()
}

/// Factorize the histograms starting from `w0` (`dim × k`).
pub fn factorize(
    hist: &LocalHistograms,
    w0: DMatrix<f64>,
    params: &NmfParams,
) -> Result<NmfOutcome> {
    if w0.nrows() != hist.dim {
        return Err(FsegError::invalid(
            Stage::Nmf,
            format!(
                "initial basis has {} rows, histograms have {} features",
                w0.nrows(),
                hist.dim
            ),
        ));
    }
    if w0.ncols() == 0 {
        return Err(FsegError::invalid(Stage::Nmf, "initial basis has no columns"));
    }
    if params.ridge.is_nan() || params.ridge < 0.0 {
        return Err(FsegError::InvalidConfig(format!(
            "nmf ridge must be non-negative, got {}",
            params.ridge
        )));
    }

    let y: DMatrix<f64> = hist.as_matrix().map(f64::from);
    let yt = y.transpose();
    let mut w = w0;
    let mut h = DMatrix::<f64>::zeros(w.ncols(), y.ncols());
    let mut rmse_trace = Vec::new();
    let mut warnings = Vec::new();
    let mut prev: Option<f64> = None;
    let mut converged = false;
    let mut iterations = 0;
    let mut last_delta = f64::INFINITY;

    while iterations < params.max_iterations {
        iterations += 1;
        h = ridge_solve(w.transpose() * &w, params.ridge, &(w.transpose() * &y))?
            .map(|v| v.max(0.0));
        w = ridge_solve(&h * h.transpose(), params.ridge, &(&h * &yt))?
            .map(|v| v.max(0.0))
            .transpose();
        let rmse = reconstruction_rmse(&y, &w, &h);
        rmse_trace.push(rmse);
        debug!("nmf iter={} rmse={:.6}", iterations, rmse);

        if let Some(previous) = prev {
            if rmse > previous {
                let warning = SegmentationWarning::RmseIncreased {
                    iteration: iterations,
                    previous,
                    current: rmse,
                };
                warn!("{warning}");
                warnings.push(warning);
            }
            last_delta = (rmse - previous).abs();
            if last_delta < params.tolerance {
                converged = true;
                break;
            }
        }
        prev = Some(rmse);
    }

    if !converged {
        let warning = SegmentationWarning::NonConvergence {
            stage: Stage::Nmf,
            iterations,
            last_delta,
        };
        warn!("{warning}");
        warnings.push(warning);
    }

    Ok(NmfOutcome {
        labels: column_argmax(&h),
        w,
        h,
        rmse: rmse_trace,
        iterations,
        converged,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::histogram::{local_histograms, HistogramOptions};
    use crate::image::{ImageF32, MultiChannelImage};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn halves() -> LocalHistograms {
        let a = ImageF32::from_fn(12, 6, |x, _| if x < 6 { 0.0 } else { 1.0 });
        let b = ImageF32::from_fn(12, 6, |x, _| if x < 6 { 1.0 } else { 0.0 });
        let img = MultiChannelImage::from_planes(&[a, b]).unwrap();
        let opts = HistogramOptions {
            half_window: 1,
            bins: 2,
            ..Default::default()
        };
        local_histograms(&img, &opts).unwrap()
    }

    #[test]
    fn templates_separate_the_halves() {
        let hist = halves();
        let w0 = DMatrix::from_columns(&[
            nalgebra::DVector::from_vec(hist.pixel(0, 0).iter().map(|&v| f64::from(v)).collect()),
            nalgebra::DVector::from_vec(hist.pixel(11, 0).iter().map(|&v| f64::from(v)).collect()),
        ]);
        let out = factorize(&hist, w0, &NmfParams::default()).unwrap();
        assert!(out.converged);
        assert!(
            !out.warnings
                .iter()
                .any(|w| matches!(w, SegmentationWarning::NonConvergence { .. })),
            "{:?}",
            out.warnings
        );
        for y in 0..6 {
            for x in 0..12 {
                let label = out.labels[y * 12 + x];
                if x < 5 {
                    assert_eq!(label, 0, "x={x} y={y}");
                } else if x > 6 {
                    assert_eq!(label, 1, "x={x} y={y}");
                }
            }
        }
    }

    #[test]
    fn random_init_is_reproducible() {
        let hist = halves();
        let params = NmfParams::default();
        let w0 = random_basis(hist.dim, 2, &mut StdRng::seed_from_u64(7));
        let a = factorize(&hist, w0.clone(), &params).unwrap();
        let b = factorize(&hist, w0, &params).unwrap();
        assert_eq!(a.labels, b.labels);
        assert_eq!(a.rmse, b.rmse);
    }

    #[test]
    fn cap_reports_non_convergence() {
        let hist = halves();
        let params = NmfParams {
            max_iterations: 1,
            ..Default::default()
        };
        let w0 = random_basis(hist.dim, 2, &mut StdRng::seed_from_u64(1));
        let out = factorize(&hist, w0, &params).unwrap();
        assert!(!out.converged);
        assert!(out.warnings.iter().any(|w| matches!(
            w,
            SegmentationWarning::NonConvergence {
                stage: Stage::Nmf,
                ..
            }
        )));
    }

    #[test]
    fn rising_rmse_is_a_warning() {
        // a heavy ridge shrinks W and H further on every pass, so the
        // reconstruction drifts towards zero and the error keeps growing
        let hist = halves();
        let params = NmfParams {
            max_iterations: 3,
            tolerance: 0.0,
            ridge: 100.0,
            ..Default::default()
        };
        let w0 = DMatrix::from_element(hist.dim, 2, 1.0);
        let out = factorize(&hist, w0, &params).unwrap();
        assert_eq!(out.rmse.len(), 3);
        assert!(out.rmse[1] > out.rmse[0], "rmse trace {:?}", out.rmse);
        assert!(out
            .warnings
            .iter()
            .any(|w| matches!(w, SegmentationWarning::RmseIncreased { iteration: 2, .. })));
        assert_eq!(out.labels.len(), 12 * 6);
        assert!(out.labels.iter().all(|&l| l < 2));
    }

    #[test]
    fn unknown_init_name_is_unsupported() {
        assert_eq!("random".parse::<NmfInit>().unwrap(), NmfInit::Random { seed: 0 });
        assert!(matches!(
            "svd".parse::<NmfInit>(),
            Err(FsegError::UnsupportedOperation { .. })
        ));
    }
}
