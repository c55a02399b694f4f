//! Serializable trace of a segmentation run.
//!
//! [`SegmentationReport`] is returned by every [`Segmenter`](crate::Segmenter)
//! entry point. It carries the label map together with what each stage
//! decided (segment count, seeds, iteration counts, RMSE trace), the
//! non-fatal warnings raised on the way, and per-stage timings.

pub mod report;
pub mod stages;
pub mod timing;

pub use report::{InputDescriptor, SegmentationReport};
pub use stages::{ClusterStage, ModelOrderStage, NmfStage};
pub use timing::{StageTiming, TimingBreakdown};
