//! Analytic LoG and Gabor kernels and reflected 2D correlation.
//!
//! Both kernels are generated in double precision on an odd-sized grid
//! centred at the origin and have their mean subtracted, which removes the DC
//! response.
//!
//! Grid conventions
//! - LoG: `size = [rows, cols]`; the grid spans `±size/2` along each axis.
//! - Gabor: square grid of radius `floor(2σ)`, frequency `1/(2σ)`, unit
//!   aspect ratio and zero phase.
use crate::error::{FsegError, Result, Stage};
use crate::image::{ImageF32, ImageView, ImageViewMut};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::str::FromStr;

/// Closed set of supported kernel families.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    Log,
    Gabor,
}

impl FromStr for FilterKind {
    type Err = FsegError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "log" => Ok(FilterKind::Log),
            "gabor" => Ok(FilterKind::Gabor),
            _ => Err(FsegError::UnsupportedOperation {
                name: s.to_string(),
                expected: "log, gabor",
            }),
        }
    }
}

/// Kernel parameters as supplied by configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FilterSpec {
    /// Laplacian of Gaussian with scale `sigma` over a `[rows, cols]` window.
    Log { sigma: f32, size: [usize; 2] },
    /// Gabor kernel with scale `sigma` and orientation `theta` (radians).
    Gabor { sigma: f32, theta: f32 },
}

impl FilterSpec {
    /// Build a spec from the `(kind, scale, extra)` triple used by filter-bank
    /// listings. `extra` is `[rows, cols]` for LoG and `[theta]` for Gabor.
    pub fn from_parts(kind: &str, scale: f32, extra: &[f32]) -> Result<Self> {
        let spec = match kind.parse::<FilterKind>()? {
            FilterKind::Log => {
                let [rows, cols] = match extra {
                    [r, c] => [*r, *c],
                    _ => {
                        return Err(FsegError::InvalidConfig(format!(
                            "log filter expects [rows, cols], got {extra:?}"
                        )))
                    }
                };
                if !(rows >= 1.0 && cols >= 1.0) || rows.fract() != 0.0 || cols.fract() != 0.0 {
                    return Err(FsegError::InvalidConfig(format!(
                        "log filter size must be positive integers, got {extra:?}"
                    )));
                }
                FilterSpec::Log {
                    sigma: scale,
                    size: [rows as usize, cols as usize],
                }
            }
            FilterKind::Gabor => match extra {
                [theta] => FilterSpec::Gabor {
                    sigma: scale,
                    theta: *theta,
                },
                _ => {
                    return Err(FsegError::InvalidConfig(format!(
                        "gabor filter expects [theta], got {extra:?}"
                    )))
                }
            },
        };
        spec.validate()?;
        Ok(spec)
    }

    pub fn kind(&self) -> FilterKind {
        match self {
            FilterSpec::Log { .. } => FilterKind::Log,
            FilterSpec::Gabor { .. } => FilterKind::Gabor,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let (sigma, ok_extra) = match self {
            FilterSpec::Log { sigma, size } => (*sigma, size[0] >= 1 && size[1] >= 1),
            FilterSpec::Gabor { sigma, theta } => (*sigma, theta.is_finite()),
        };
        if !(sigma.is_finite() && sigma > 0.0) {
            return Err(FsegError::InvalidConfig(format!(
                "{:?} filter requires a positive finite sigma, got {sigma}",
                self.kind()
            )));
        }
        if !ok_extra {
            return Err(FsegError::InvalidConfig(format!(
                "invalid extra parameters for {self:?}"
            )));
        }
        Ok(())
    }
}

/// Materialized, zero-mean correlation kernel.
#[derive(Clone, Debug)]
pub struct FilterKernel {
    pub spec: FilterSpec,
    /// Kernel width (odd)
    pub w: usize,
    /// Kernel height (odd)
    pub h: usize,
    /// Row-major coefficients
    pub coeffs: Vec<f32>,
}

impl FilterKernel {
    pub fn from_spec(spec: &FilterSpec) -> Result<Self> {
        spec.validate()?;
        let kernel = match *spec {
            FilterSpec::Log { sigma, size } => {
                let (ry, rx) = (size[0] / 2, size[1] / 2);
                let s2 = f64::from(sigma).powi(2);
                let norm = -1.0 / (PI * s2 * s2);
                build(spec, rx, ry, |x, y| {
                    let r2 = x * x + y * y;
                    norm * (1.0 - r2 / (2.0 * s2)) * (-r2 / (2.0 * s2)).exp()
                })
            }
            FilterSpec::Gabor { sigma, theta } => {
                let sigma = f64::from(sigma);
                let theta = f64::from(theta);
                let radius = (2.0 * sigma).floor() as usize;
                let freq = 1.0 / (2.0 * sigma);
                let (sin_t, cos_t) = theta.sin_cos();
                let amp = 1.0 / (2.0 * PI * sigma * sigma);
                build(spec, radius, radius, |x, y| {
                    let xp = x * cos_t + y * sin_t;
                    let yp = y * cos_t - x * sin_t;
                    amp * (-0.5 * (xp * xp + yp * yp) / (sigma * sigma)).exp()
                        * (2.0 * PI * freq * xp).cos()
                })
            }
        };
        Ok(kernel)
    }

    #[inline]
    pub fn get(&self, kx: usize, ky: usize) -> f32 {
        self.coeffs[ky * self.w + kx]
    }
}

fn build(spec: &FilterSpec, rx: usize, ry: usize, f: impl Fn(f64, f64) -> f64) -> FilterKernel {
    let w = 2 * rx + 1;
    let h = 2 * ry + 1;
    let mut values = Vec::with_capacity(w * h);
    for ky in 0..h {
        let y = ky as f64 - ry as f64;
        for kx in 0..w {
            let x = kx as f64 - rx as f64;
            values.push(f(x, y));
        }
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    FilterKernel {
        spec: spec.clone(),
        w,
        h,
        coeffs: values.into_iter().map(|v| (v - mean) as f32).collect(),
    }
}

/// Half-sample symmetric reflection: `d c b a | a b c d | d c b a`.
#[inline]
pub(crate) fn reflect_index(i: isize, n: usize) -> usize {
    let n = n as isize;
    let period = 2 * n;
    let m = i.rem_euclid(period);
    (if m < n { m } else { period - 1 - m }) as usize
}

/// Correlate `plane` with `kernel`, reflecting samples across the border.
pub fn correlate_reflect(plane: &ImageF32, kernel: &FilterKernel) -> Result<ImageF32> {
    let (w, h) = (plane.w, plane.h);
    if w == 0 || h == 0 {
        return Err(FsegError::invalid(
            Stage::Filtering,
            format!("cannot filter an empty {}x{} plane", w, h),
        ));
    }
    let rx = (kernel.w / 2) as isize;
    let ry = (kernel.h / 2) as isize;

    // Column lookup per kernel tap, shared by every row.
    let col_index: Vec<Vec<usize>> = (0..kernel.w)
        .map(|kx| {
            (0..w)
                .map(|x| reflect_index(x as isize + kx as isize - rx, w))
                .collect()
        })
        .collect();

    let mut out = ImageF32::new(w, h);
    for y in 0..h {
        let dst = out.row_mut(y);
        for ky in 0..kernel.h {
            let sy = reflect_index(y as isize + ky as isize - ry, h);
            let src = plane.row(sy);
            for (kx, cols) in col_index.iter().enumerate() {
                let tap = kernel.get(kx, ky);
                if tap == 0.0 {
                    continue;
                }
                for (d, &sx) in dst.iter_mut().zip(cols.iter()) {
                    *d += tap * src[sx];
                }
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sum(k: &FilterKernel) -> f32 {
        k.coeffs.iter().sum()
    }

    #[test]
    fn log_kernel_is_zero_mean_and_symmetric() {
        let k = FilterKernel::from_spec(&FilterSpec::Log {
            sigma: 1.0,
            size: [5, 5],
        })
        .unwrap();
        assert_eq!((k.w, k.h), (5, 5));
        assert!(sum(&k).abs() < 1e-5, "sum={}", sum(&k));
        assert!((k.get(0, 2) - k.get(4, 2)).abs() < 1e-7);
        assert!((k.get(2, 0) - k.get(2, 4)).abs() < 1e-7);
        // centre of a LoG is its most negative tap
        let min = k.coeffs.iter().cloned().fold(f32::INFINITY, f32::min);
        assert_eq!(min, k.get(2, 2));
    }

    #[test]
    fn gabor_radius_follows_sigma() {
        let k = FilterKernel::from_spec(&FilterSpec::Gabor {
            sigma: 1.5,
            theta: 0.0,
        })
        .unwrap();
        assert_eq!((k.w, k.h), (7, 7));
        assert!(sum(&k).abs() < 1e-5);
        let k = FilterKernel::from_spec(&FilterSpec::Gabor {
            sigma: 2.5,
            theta: std::f32::consts::FRAC_PI_4,
        })
        .unwrap();
        assert_eq!((k.w, k.h), (11, 11));
    }

    #[test]
    fn reflect_index_mirrors_half_sample() {
        let got: Vec<usize> = (-4..8).map(|i| reflect_index(i, 4)).collect();
        assert_eq!(got, vec![3, 2, 1, 0, 0, 1, 2, 3, 3, 2, 1, 0]);
        assert_eq!(reflect_index(-3, 1), 0);
    }

    #[test]
    fn flat_plane_has_no_response() {
        let plane = ImageF32::from_fn(9, 6, |_, _| 42.0);
        let k = FilterKernel::from_spec(&FilterSpec::Gabor {
            sigma: 2.5,
            theta: 0.3,
        })
        .unwrap();
        let out = correlate_reflect(&plane, &k).unwrap();
        assert!(out.data.iter().all(|v| v.abs() < 1e-3), "{:?}", out.data);
    }

    #[test]
    fn parts_parsing_validates_kind_and_extra() {
        let spec = FilterSpec::from_parts("LoG", 0.5, &[3.0, 3.0]).unwrap();
        assert_eq!(
            spec,
            FilterSpec::Log {
                sigma: 0.5,
                size: [3, 3]
            }
        );
        assert!(matches!(
            FilterSpec::from_parts("sobel", 1.0, &[0.0]),
            Err(FsegError::UnsupportedOperation { .. })
        ));
        assert!(matches!(
            FilterSpec::from_parts("gabor", -1.0, &[0.0]),
            Err(FsegError::InvalidConfig(_))
        ));
        assert!(matches!(
            FilterSpec::from_parts("log", 1.0, &[3.0]),
            Err(FsegError::InvalidConfig(_))
        ));
    }

    #[test]
    fn unknown_kind_fails_deserialization() {
        let ok: FilterSpec =
            serde_json::from_str(r#"{"kind":"gabor","sigma":1.5,"theta":0.0}"#).unwrap();
        assert_eq!(ok.kind(), FilterKind::Gabor);
        assert!(serde_json::from_str::<FilterSpec>(r#"{"kind":"dog","sigma":1.0}"#).is_err());
    }
}
