//! Local spectral histograms computed with an integral histogram.
//!
//! Overview
//! - [`quantize`] maps each channel onto `bins` uniform bins over its own
//!   value range.
//! - [`integral`] accumulates the one-hot encoded bins into a cumulative
//!   volume so that any rectangular window sum costs four lookups.
//! - [`local_histograms`] evaluates the `(2·ws + 1)²` window around every
//!   pixel and normalizes it, producing the feature vector used by every
//!   clustering stage.
//!
//! Cost is `O(W·H·bins·channels)` independent of the window size.
//!
//! Normalization comes in two flavours (see [`HistogramNormalization`]): the
//! relative frequency used for clustering, and a density over the nominal
//! window area.

pub mod integral;
pub mod quantize;

pub use integral::IntegralHistogram;
pub use quantize::{quantize, quantize_into, QuantizedVolume};

use crate::error::{FsegError, Result, Stage};
use crate::image::MultiChannelImage;
use crate::types::FeatureMatrix;
use log::debug;
use nalgebra::DMatrixView;
use serde::{Deserialize, Serialize};

/// Default number of bins per channel.
pub const DEFAULT_BINS: usize = 11;

/// How window counts are turned into a feature vector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HistogramNormalization {
    /// Divide by the number of in-image pixels in the window (the window sum
    /// over all bins divided by the channel count). Every channel block sums
    /// to one, including border-truncated windows.
    #[default]
    Frequency,
    /// Divide by the nominal window area `(2·ws + 1)²`. Border-truncated
    /// windows sum to less than one per channel.
    Density,
}

/// Parameters of the local histogram engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HistogramOptions {
    /// Half window size `ws`; the window is `(2·ws + 1)` pixels wide.
    pub half_window: usize,
    /// Bins per channel.
    pub bins: usize,
    pub normalization: HistogramNormalization,
}

impl Default for HistogramOptions {
    fn default() -> Self {
        Self {
            half_window: 12,
            bins: DEFAULT_BINS,
            normalization: HistogramNormalization::Frequency,
        }
    }
}

impl HistogramOptions {
    /// Pixel count of the full `(2·ws + 1)²` window, `None` when it does not
    /// fit in pixel coordinates.
    pub fn window_area(&self) -> Option<usize> {
        let side = self.half_window.checked_mul(2)?.checked_add(1)?;
        if side > isize::MAX as usize / 2 {
            return None;
        }
        side.checked_mul(side)
    }

    pub fn validate(&self, image: &MultiChannelImage) -> Result<()> {
        if image.is_empty() {
            return Err(FsegError::invalid(Stage::Quantization, "image is empty"));
        }
        if image.channels() < 2 {
            return Err(FsegError::invalid(
                Stage::Quantization,
                format!(
                    "at least 2 channels are required, got {}",
                    image.channels()
                ),
            ));
        }
        if self.half_window == 0 {
            return Err(FsegError::invalid(
                Stage::IntegralHistogram,
                "half window size must be positive",
            ));
        }
        if self.window_area().is_none() {
            return Err(FsegError::invalid(
                Stage::IntegralHistogram,
                format!("half window size {} is too large", self.half_window),
            ));
        }
        if self.bins < 2 {
            return Err(FsegError::invalid(
                Stage::Quantization,
                format!("bin count must be at least 2, got {}", self.bins),
            ));
        }
        Ok(())
    }
}

/// Per-pixel normalized local histograms, pixel-major: the `dim` values of
/// pixel `y * w + x` are contiguous.
#[derive(Clone, Debug)]
pub struct LocalHistograms {
    pub w: usize,
    pub h: usize,
    pub channels: usize,
    pub bins: usize,
    /// Features per pixel (`bins × channels`)
    pub dim: usize,
    data: Vec<f32>,
}

impl LocalHistograms {
    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> &[f32] {
        self.feature(y * self.w + x)
    }

    /// Feature vector of the pixel with linear index `idx`.
    #[inline]
    pub fn feature(&self, idx: usize) -> &[f32] {
        let start = idx * self.dim;
        &self.data[start..start + self.dim]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// View as a `dim × pixels` matrix (one column per pixel).
    pub fn as_matrix(&self) -> DMatrixView<'_, f32> {
        DMatrixView::from_slice(&self.data, self.dim, self.w * self.h)
    }
}

impl FeatureMatrix for LocalHistograms {
    fn dim(&self) -> usize {
        self.dim
    }

    fn len(&self) -> usize {
        self.w * self.h
    }

    fn column_into(&self, idx: usize, out: &mut [f64]) {
        for (o, &v) in out.iter_mut().zip(self.feature(idx)) {
            *o = f64::from(v);
        }
    }
}

/// Compute normalized local histograms for every pixel of `image`.
pub fn local_histograms(
    image: &MultiChannelImage,
    options: &HistogramOptions,
) -> Result<LocalHistograms> {
    let mut quantized = Vec::new();
    let mut integral = Vec::new();
    local_histograms_with_scratch(image, options, &mut quantized, &mut integral)
}

/// [`local_histograms`] with caller-owned scratch buffers for the quantized
/// and integral volumes. The buffers are left holding their allocations.
pub fn local_histograms_with_scratch(
    image: &MultiChannelImage,
    options: &HistogramOptions,
    quantized_buf: &mut Vec<u16>,
    integral_buf: &mut Vec<u32>,
) -> Result<LocalHistograms> {
    options.validate(image)?;
    let q = quantize_into(image, options.bins, std::mem::take(quantized_buf))?;
    let integral = IntegralHistogram::from_quantized_with_buffer(&q, std::mem::take(integral_buf));
    *quantized_buf = q.data;
    let integral = integral?;

    let (w, h) = (image.width(), image.height());
    let channels = image.channels();
    let dim = integral.dim;
    let ws = options.half_window;
    let area = options.window_area().unwrap_or(usize::MAX) as f32;
    let normalization = options.normalization;
    debug!(
        "local_histograms {}x{} ws={} dim={} normalization={:?}",
        w, h, ws, dim, normalization
    );

    let mut data = vec![0.0f32; w * h * dim];
    let fill_row = |y: usize, row: &mut [f32]| {
        let mut counts = vec![0u32; dim];
        for x in 0..w {
            integral.window_counts(x, y, ws, &mut counts);
            let denom = match normalization {
                HistogramNormalization::Frequency => {
                    counts.iter().map(|&c| c as f32).sum::<f32>() / channels as f32
                }
                HistogramNormalization::Density => area,
            };
            let dst = &mut row[x * dim..(x + 1) * dim];
            for (d, &c) in dst.iter_mut().zip(&counts) {
                *d = c as f32 / denom;
            }
        }
    };
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        data.par_chunks_mut(w * dim)
            .enumerate()
            .for_each(|(y, row)| fill_row(y, row));
    }
    #[cfg(not(feature = "parallel"))]
    {
        for (y, row) in data.chunks_mut(w * dim).enumerate() {
            fill_row(y, row);
        }
    }
    *integral_buf = integral.into_buffer();

    Ok(LocalHistograms {
        w,
        h,
        channels,
        bins: options.bins,
        dim,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::ImageF32;

    fn two_band(w: usize, h: usize) -> MultiChannelImage {
        let a = ImageF32::from_fn(w, h, |x, y| ((x * 5 + y * 3) % 7) as f32);
        let b = ImageF32::from_fn(w, h, |x, y| (x * y) as f32 * 0.5);
        MultiChannelImage::from_planes(&[a, b]).unwrap()
    }

    #[test]
    fn density_matches_frequency_away_from_the_border() {
        let img = two_band(9, 9);
        let mut opts = HistogramOptions {
            half_window: 1,
            bins: 5,
            normalization: HistogramNormalization::Frequency,
        };
        let freq = local_histograms(&img, &opts).unwrap();
        opts.normalization = HistogramNormalization::Density;
        let dens = local_histograms(&img, &opts).unwrap();
        for (a, b) in freq.pixel(4, 4).iter().zip(dens.pixel(4, 4)) {
            assert!((a - b).abs() < 1e-6);
        }
        // corner window holds 4 of 9 pixels
        let corner: f32 = dens.pixel(0, 0)[..5].iter().sum();
        assert!((corner - 4.0 / 9.0).abs() < 1e-6, "corner={corner}");
    }

    #[test]
    fn scratch_buffers_are_reusable() {
        let img = two_band(6, 4);
        let opts = HistogramOptions {
            half_window: 2,
            bins: 3,
            ..Default::default()
        };
        let mut qbuf = Vec::new();
        let mut ibuf = Vec::new();
        let first = local_histograms_with_scratch(&img, &opts, &mut qbuf, &mut ibuf).unwrap();
        assert_eq!(qbuf.len(), 6 * 4 * 2);
        assert_eq!(ibuf.len(), 6 * 4 * 6);
        let second = local_histograms_with_scratch(&img, &opts, &mut qbuf, &mut ibuf).unwrap();
        assert_eq!(first.as_slice(), second.as_slice());
    }

    #[test]
    fn invalid_options_are_rejected() {
        let img = two_band(4, 4);
        let bad_window = HistogramOptions {
            half_window: 0,
            ..Default::default()
        };
        assert!(matches!(
            local_histograms(&img, &bad_window),
            Err(FsegError::InvalidInput { .. })
        ));
        let huge_window = HistogramOptions {
            half_window: usize::MAX / 2,
            ..Default::default()
        };
        assert!(matches!(
            local_histograms(&img, &huge_window),
            Err(FsegError::InvalidInput {
                stage: Stage::IntegralHistogram,
                ..
            })
        ));
        let single = MultiChannelImage::from_planes(&[img.plane(0)]).unwrap();
        assert!(matches!(
            local_histograms(&single, &HistogramOptions::default()),
            Err(FsegError::InvalidInput { .. })
        ));
    }
}
