#![doc = include_str!("../README.md")]

// Public modules (stable-ish surface)
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod features;
pub mod filters;
pub mod image;
pub mod raster;
pub mod segmenter;
pub mod types;

// Stage modules – public for tooling and tests, but considered internals.
pub mod cluster;
pub mod edges;
pub mod histogram;
pub mod nmf;

// --- High-level re-exports -------------------------------------------------

// Main entry points: segmenter + results.
pub use crate::diagnostics::SegmentationReport;
pub use crate::error::{FsegError, Result, SegmentationWarning, Stage};
pub use crate::image::MultiChannelImage;
pub use crate::segmenter::{Segmenter, SegmenterParams, SegmenterWorkspace};
pub use crate::types::{Seed, SegmentLabelMap};

// Feature stack assembly.
pub use crate::features::{build_feature_stack, StackOptions};
pub use crate::filters::{FilterBank, FilterSpec};

// --- Prelude ---------------------------------------------------------------

/// Small prelude for quick experiments.
///
/// ```no_run
/// use fseg::prelude::*;
///
/// # fn main() -> fseg::Result<()> {
/// let (w, h) = (64usize, 64usize);
/// let band = ImageF32::from_fn(w, h, |x, _| if x < w / 2 { 10.0 } else { 200.0 });
/// let image = MultiChannelImage::from_planes(&[band])?;
/// let bank = FilterBank::texture_default()?;
/// let stack = build_feature_stack(&image, &StackOptions::default(), &bank)?;
///
/// let mut segmenter = Segmenter::new(SegmenterParams {
///     segments: Some(2),
///     ..Default::default()
/// });
/// let report = segmenter.segment(&stack)?;
/// println!("{}", report.summary());
/// # Ok(())
/// # }
/// ```
pub mod prelude {
    pub use crate::image::ImageF32;
    pub use crate::{
        build_feature_stack, FilterBank, MultiChannelImage, Seed, Segmenter, SegmenterParams,
        StackOptions,
    };
}
