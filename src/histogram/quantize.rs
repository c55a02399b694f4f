use crate::error::{FsegError, Result, Stage};
use crate::image::MultiChannelImage;
use log::debug;

/// Per-pixel, per-channel bin indices in `[0, bins)`, shape (h, w, channels).
#[derive(Clone, Debug)]
pub struct QuantizedVolume {
    pub w: usize,
    pub h: usize,
    pub channels: usize,
    pub bins: usize,
    pub data: Vec<u16>,
}

impl QuantizedVolume {
    #[inline]
    pub fn get(&self, x: usize, y: usize, c: usize) -> u16 {
        self.data[(y * self.w + x) * self.channels + c]
    }

    /// Width of the one-hot feature vector (`bins × channels`).
    pub fn dim(&self) -> usize {
        self.bins * self.channels
    }
}

/// Map every channel onto `bins` uniform bins spanning its own [min, max].
///
/// `bin = floor((v - min) / ((max - min) / bins))`, with the channel maximum
/// folded into the last bin. A constant channel has no usable bin width and is
/// rejected with [`FsegError::DegenerateChannel`].
pub fn quantize(image: &MultiChannelImage, bins: usize) -> Result<QuantizedVolume> {
    quantize_into(image, bins, Vec::new())
}

/// Same as [`quantize`], reusing `buffer` for the output storage.
pub fn quantize_into(
    image: &MultiChannelImage,
    bins: usize,
    mut buffer: Vec<u16>,
) -> Result<QuantizedVolume> {
    if bins < 2 || bins > u16::MAX as usize {
        return Err(FsegError::invalid(
            Stage::Quantization,
            format!("bin count must be in [2, {}], got {bins}", u16::MAX),
        ));
    }
    if image.is_empty() {
        return Err(FsegError::invalid(Stage::Quantization, "image is empty"));
    }
    let channels = image.channels();
    let mut scales = Vec::with_capacity(channels);
    for c in 0..channels {
        let (lo, hi) = image
            .channel_range(c)
            .ok_or_else(|| FsegError::invalid(Stage::Quantization, "image is empty"))?;
        if !(lo.is_finite() && hi.is_finite()) {
            return Err(FsegError::invalid(
                Stage::Quantization,
                format!("channel {c} contains non-finite values"),
            ));
        }
        if lo == hi {
            return Err(FsegError::DegenerateChannel {
                channel: c,
                value: lo,
            });
        }
        let interval = (f64::from(hi) - f64::from(lo)) / bins as f64;
        scales.push((f64::from(lo), interval));
    }
    debug!(
        "quantize {}x{} channels={} bins={}",
        image.width(),
        image.height(),
        channels,
        bins
    );

    let last = (bins - 1) as u16;
    let to_bin = |px: &[f32], dst: &mut [u16]| {
        for ((d, &v), &(lo, interval)) in dst.iter_mut().zip(px).zip(&scales) {
            let b = ((f64::from(v) - lo) / interval).floor();
            *d = if b >= last as f64 { last } else { b.max(0.0) as u16 };
        }
    };

    buffer.clear();
    buffer.resize(image.as_slice().len(), 0);
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        buffer
            .par_chunks_mut(channels)
            .zip(image.as_slice().par_chunks(channels))
            .for_each(|(dst, px)| to_bin(px, dst));
    }
    #[cfg(not(feature = "parallel"))]
    {
        for (dst, px) in buffer
            .chunks_mut(channels)
            .zip(image.as_slice().chunks(channels))
        {
            to_bin(px, dst);
        }
    }

    Ok(QuantizedVolume {
        w: image.width(),
        h: image.height(),
        channels,
        bins,
        data: buffer,
    })
}
