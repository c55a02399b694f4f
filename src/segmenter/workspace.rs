//! Scratch buffers reused across the runs of one segmenter.
use crate::error::Result;
use crate::histogram::{local_histograms_with_scratch, HistogramOptions, LocalHistograms};
use crate::image::MultiChannelImage;

/// Quantized and integral volumes, kept between runs so that images of the
/// same size do not reallocate them.
#[derive(Debug, Default)]
pub struct SegmenterWorkspace {
    quantized: Vec<u16>,
    integral: Vec<u32>,
}

impl SegmenterWorkspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn local_histograms(
        &mut self,
        image: &MultiChannelImage,
        options: &HistogramOptions,
    ) -> Result<LocalHistograms> {
        local_histograms_with_scratch(image, options, &mut self.quantized, &mut self.integral)
    }

    /// Bytes currently held by the scratch buffers.
    pub fn capacity_bytes(&self) -> usize {
        self.quantized.capacity() * std::mem::size_of::<u16>()
            + self.integral.capacity() * std::mem::size_of::<u32>()
    }

    /// Release the scratch allocations.
    pub fn clear(&mut self) {
        self.quantized = Vec::new();
        self.integral = Vec::new();
    }
}
