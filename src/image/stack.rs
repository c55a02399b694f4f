//! Interleaved multi-channel image, shape (height, width, channels).
//!
//! Each pixel stores its channels contiguously, so `pixel(x, y)` is a slice of
//! length `channels`. Planes can be extracted for per-channel work such as
//! filtering, and re-interleaved with [`MultiChannelImage::from_planes`].
use super::ImageF32;
use crate::error::{FsegError, Result, Stage};

#[derive(Clone, Debug, PartialEq)]
pub struct MultiChannelImage {
    w: usize,
    h: usize,
    channels: usize,
    data: Vec<f32>,
}

impl MultiChannelImage {
    /// Wrap a (height, width, channels) row-major buffer.
    pub fn from_interleaved(w: usize, h: usize, channels: usize, data: Vec<f32>) -> Result<Self> {
        if data.len() != w * h * channels {
            return Err(FsegError::invalid(
                Stage::FeatureStack,
                format!(
                    "buffer holds {} values, expected {}x{}x{}",
                    data.len(),
                    h,
                    w,
                    channels
                ),
            ));
        }
        Ok(Self {
            w,
            h,
            channels,
            data,
        })
    }

    /// Convert a band-major (bands, height, width) buffer, the layout handed
    /// over by raster sources.
    pub fn from_band_major(bands: usize, h: usize, w: usize, data: &[f32]) -> Result<Self> {
        let plane = w * h;
        if data.len() != bands * plane {
            return Err(FsegError::invalid(
                Stage::FeatureStack,
                format!(
                    "band-major buffer holds {} values, expected {}x{}x{}",
                    data.len(),
                    bands,
                    h,
                    w
                ),
            ));
        }
        let mut out = vec![0.0f32; bands * plane];
        for b in 0..bands {
            let src = &data[b * plane..(b + 1) * plane];
            for (p, &v) in src.iter().enumerate() {
                out[p * bands + b] = v;
            }
        }
        Self::from_interleaved(w, h, bands, out)
    }

    /// Interleave equally sized planes into a stack.
    pub fn from_planes(planes: &[ImageF32]) -> Result<Self> {
        let first = planes.first().ok_or_else(|| {
            FsegError::invalid(Stage::FeatureStack, "cannot build a stack from zero planes")
        })?;
        let (w, h) = (first.w, first.h);
        if let Some((idx, p)) = planes
            .iter()
            .enumerate()
            .find(|(_, p)| p.w != w || p.h != h)
        {
            return Err(FsegError::invalid(
                Stage::FeatureStack,
                format!(
                    "plane {idx} is {}x{}, expected {}x{}",
                    p.w, p.h, w, h
                ),
            ));
        }
        let channels = planes.len();
        let mut data = vec![0.0f32; w * h * channels];
        for (c, plane) in planes.iter().enumerate() {
            for (p, &v) in plane.data.iter().enumerate() {
                data[p * channels + c] = v;
            }
        }
        Self::from_interleaved(w, h, channels, data)
    }

    pub fn width(&self) -> usize {
        self.w
    }

    pub fn height(&self) -> usize {
        self.h
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Number of pixels (`width × height`).
    pub fn len(&self) -> usize {
        self.w * self.h
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> &[f32] {
        let start = (y * self.w + x) * self.channels;
        &self.data[start..start + self.channels]
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize, c: usize) -> f32 {
        self.data[(y * self.w + x) * self.channels + c]
    }

    /// Raw interleaved storage.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Copy one channel out as a plane.
    pub fn plane(&self, c: usize) -> ImageF32 {
        let data = self
            .data
            .chunks_exact(self.channels)
            .map(|px| px[c])
            .collect();
        ImageF32 {
            w: self.w,
            h: self.h,
            stride: self.w,
            data,
        }
    }

    /// All channels as separate planes, in channel order.
    pub fn planes(&self) -> Vec<ImageF32> {
        (0..self.channels).map(|c| self.plane(c)).collect()
    }

    /// Minimum and maximum of channel `c`.
    pub fn channel_range(&self, c: usize) -> Option<(f32, f32)> {
        let mut iter = self.data.chunks_exact(self.channels).map(|px| px[c]);
        let first = iter.next()?;
        Some(iter.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_major_roundtrips_through_planes() {
        // two bands, 2x3 image
        let data: Vec<f32> = (0..12).map(|v| v as f32).collect();
        let img = MultiChannelImage::from_band_major(2, 2, 3, &data).unwrap();
        assert_eq!(img.channels(), 2);
        assert_eq!(img.pixel(0, 0), &[0.0, 6.0]);
        assert_eq!(img.pixel(2, 1), &[5.0, 11.0]);
        let planes = img.planes();
        assert_eq!(planes[1].data, data[6..].to_vec());
        let again = MultiChannelImage::from_planes(&planes).unwrap();
        assert_eq!(again, img);
    }

    #[test]
    fn mismatched_planes_are_rejected() {
        let a = ImageF32::new(4, 4);
        let b = ImageF32::new(4, 3);
        let err = MultiChannelImage::from_planes(&[a, b]).unwrap_err();
        assert!(matches!(
            err,
            FsegError::InvalidInput {
                stage: Stage::FeatureStack,
                ..
            }
        ));
    }
}
