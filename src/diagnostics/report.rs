use super::{ClusterStage, ModelOrderStage, NmfStage, TimingBreakdown};
use crate::error::SegmentationWarning;
use crate::types::SegmentLabelMap;
use serde::Serialize;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputDescriptor {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
    /// Histogram features per pixel (`bins × channels`).
    pub feature_dim: usize,
}

/// Result of [`Segmenter::segment`](crate::Segmenter::segment): the label map
/// plus a trace of every stage that ran.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentationReport {
    pub labels: SegmentLabelMap,
    pub segments: usize,
    pub input: InputDescriptor,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_order: Option<ModelOrderStage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clustering: Option<ClusterStage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nmf: Option<NmfStage>,
    pub warnings: Vec<SegmentationWarning>,
    pub timing: TimingBreakdown,
}

impl SegmentationReport {
    /// One-line summary for logs and demo output.
    pub fn summary(&self) -> String {
        let counts = self.labels.histogram();
        let nmf = self
            .nmf
            .as_ref()
            .map(|n| format!("{} iters", n.iterations))
            .unwrap_or_else(|| "-".to_string());
        format!(
            "{}x{} channels={} segments={} sizes={:?} nmf={} warnings={} total={:.1}ms",
            self.input.width,
            self.input.height,
            self.input.channels,
            self.segments,
            counts,
            nmf,
            self.warnings.len(),
            self.timing.total_ms
        )
    }
}
