//! Integral histogram over a one-hot encoded quantized volume.
//!
//! `I(r, c, k)` counts the pixels in rows `0..=r` and columns `0..=c` whose
//! channel `k / bins` falls into bin `k % bins`. The volume is built with two
//! cumulative passes (along columns, then along rows) and never stores the
//! one-hot volume itself.
//!
//! Window queries use a virtually padded volume: indices before the image
//! read as zero (the `ws + 1` leading pad), indices past the image replicate
//! the last row/column (the `ws` trailing pad). A window that is truncated by
//! the border therefore counts only in-image pixels.
use super::quantize::QuantizedVolume;
use crate::error::{FsegError, Result, Stage};
use log::debug;

#[derive(Clone, Debug)]
pub struct IntegralHistogram {
    pub w: usize,
    pub h: usize,
    /// Features per pixel (`bins × channels`)
    pub dim: usize,
    data: Vec<u32>,
}

impl IntegralHistogram {
    pub fn from_quantized(q: &QuantizedVolume) -> Result<Self> {
        Self::from_quantized_with_buffer(q, Vec::new())
    }

    /// Build the volume into `buffer`, which is cleared and resized.
    pub fn from_quantized_with_buffer(q: &QuantizedVolume, mut buffer: Vec<u32>) -> Result<Self> {
        let dim = q.dim();
        let row_len = q.w * dim;
        if q.w == 0 || q.h == 0 || dim == 0 {
            return Err(FsegError::invalid(
                Stage::IntegralHistogram,
                "quantized volume is empty",
            ));
        }
        if q.w.checked_mul(q.h).map_or(true, |n| n > u32::MAX as usize) {
            return Err(FsegError::invalid(
                Stage::IntegralHistogram,
                format!("{}x{} exceeds the u32 counter range", q.w, q.h),
            ));
        }
        debug!(
            "IntegralHistogram::build {}x{} dim={} ({} counters)",
            q.w,
            q.h,
            dim,
            row_len * q.h
        );

        buffer.clear();
        buffer.resize(row_len * q.h, 0);

        // Pass 1: one-hot + cumulative sum along each row (rows independent).
        let fill_row = |y: usize, row: &mut [u32]| {
            for x in 0..q.w {
                let (prev, cur) = row.split_at_mut(x * dim);
                let cur = &mut cur[..dim];
                if x > 0 {
                    cur.copy_from_slice(&prev[(x - 1) * dim..]);
                }
                for c in 0..q.channels {
                    let bin = q.get(x, y, c) as usize;
                    cur[c * q.bins + bin] += 1;
                }
            }
        };
        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            buffer
                .par_chunks_mut(row_len)
                .enumerate()
                .for_each(|(y, row)| fill_row(y, row));
        }
        #[cfg(not(feature = "parallel"))]
        {
            for (y, row) in buffer.chunks_mut(row_len).enumerate() {
                fill_row(y, row);
            }
        }

        // Pass 2: cumulative sum along columns.
        for y in 1..q.h {
            let (above, rest) = buffer.split_at_mut(y * row_len);
            let prev = &above[(y - 1) * row_len..];
            for (dst, &src) in rest[..row_len].iter_mut().zip(prev) {
                *dst += src;
            }
        }

        Ok(Self {
            w: q.w,
            h: q.h,
            dim,
            data: buffer,
        })
    }

    /// Hand the storage back for reuse.
    pub fn into_buffer(self) -> Vec<u32> {
        self.data
    }

    /// Cumulative counts at (x, y).
    #[inline]
    pub fn at(&self, x: usize, y: usize) -> &[u32] {
        let start = (y * self.w + x) * self.dim;
        &self.data[start..start + self.dim]
    }

    /// Counts at a position of the virtually padded volume, `None` for the
    /// zero prefix.
    #[inline]
    fn padded(&self, x: isize, y: isize) -> Option<&[u32]> {
        if x < 0 || y < 0 {
            return None;
        }
        let x = (x as usize).min(self.w - 1);
        let y = (y as usize).min(self.h - 1);
        Some(self.at(x, y))
    }

    /// Histogram counts of the `(2·half_window + 1)²` window centred at
    /// (x, y), written into `out` (length `dim`).
    ///
    /// `H = I(y+ws, x+ws) + I(y-ws-1, x-ws-1) - I(y+ws, x-ws-1) - I(y-ws-1, x+ws)`
    pub fn window_counts(&self, x: usize, y: usize, half_window: usize, out: &mut [u32]) {
        let ws = half_window as isize;
        let (x, y) = (x as isize, y as isize);
        let (x0, x1) = (x - ws - 1, x + ws);
        let (y0, y1) = (y - ws - 1, y + ws);

        match self.padded(x1, y1) {
            Some(br) => out.copy_from_slice(br),
            None => out.fill(0),
        }
        if let Some(tl) = self.padded(x0, y0) {
            for (o, &v) in out.iter_mut().zip(tl) {
                *o += v;
            }
        }
        if let Some(bl) = self.padded(x0, y1) {
            for (o, &v) in out.iter_mut().zip(bl) {
                *o -= v;
            }
        }
        if let Some(tr) = self.padded(x1, y0) {
            for (o, &v) in out.iter_mut().zip(tr) {
                *o -= v;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::histogram::quantize::quantize;
    use crate::image::{ImageF32, MultiChannelImage};

    fn volume() -> QuantizedVolume {
        let a = ImageF32::from_fn(6, 5, |x, y| ((x * 7 + y * 3) % 10) as f32);
        let b = ImageF32::from_fn(6, 5, |x, y| (x as f32 - y as f32).abs());
        let img = MultiChannelImage::from_planes(&[a, b]).unwrap();
        quantize(&img, 4).unwrap()
    }

    #[test]
    fn integral_is_monotonic_and_totals_match() {
        let q = volume();
        let ih = IntegralHistogram::from_quantized(&q).unwrap();
        for y in 0..q.h {
            for x in 0..q.w {
                for k in 0..ih.dim {
                    let v = ih.at(x, y)[k];
                    if x > 0 {
                        assert!(v >= ih.at(x - 1, y)[k]);
                    }
                    if y > 0 {
                        assert!(v >= ih.at(x, y - 1)[k]);
                    }
                }
            }
        }
        let total: u32 = ih.at(q.w - 1, q.h - 1).iter().sum();
        assert_eq!(total as usize, q.w * q.h * q.channels);
    }

    #[test]
    fn oversized_window_covers_the_whole_image() {
        let q = volume();
        let ih = IntegralHistogram::from_quantized(&q).unwrap();
        let mut out = vec![0u32; ih.dim];
        ih.window_counts(2, 2, 50, &mut out);
        assert_eq!(out, ih.at(q.w - 1, q.h - 1).to_vec());
    }
}
