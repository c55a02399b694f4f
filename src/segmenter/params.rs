//! Parameters of a segmentation run.
//!
//! Defaults reproduce the reference texture setup: 11 bins, a 25-pixel
//! window, eigen-spectrum model order with `omega = 0.045`, and NMF
//! refinement initialized from the cluster centers.

use crate::cluster::{LloydParams, ModelOrderStrategy};
use crate::error::{FsegError, Result};
use crate::histogram::HistogramOptions;
use crate::nmf::NmfParams;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SegmenterParams {
    pub histogram: HistogramOptions,
    /// Fixed segment count; `None` estimates it from the spectrum.
    pub segments: Option<usize>,
    /// Residual threshold of the model-order estimate.
    pub omega: f64,
    pub model_order: ModelOrderStrategy,
    /// Seed candidates have edge strength at most this fraction of the
    /// maximum.
    pub edge_fraction: f32,
    pub lloyd: LloydParams,
    /// Non-negative refinement; `None` keeps the regression labels.
    pub nmf: Option<NmfParams>,
}

impl Default for SegmenterParams {
    fn default() -> Self {
        Self {
            histogram: HistogramOptions::default(),
            segments: None,
            omega: 0.045,
            model_order: ModelOrderStrategy::EigenSpectrum,
            edge_fraction: 0.4,
            lloyd: LloydParams::default(),
            nmf: Some(NmfParams::default()),
        }
    }
}

impl SegmenterParams {
    /// Range checks that do not depend on the image.
    pub fn validate(&self) -> Result<()> {
        if let Some(n) = self.segments {
            if n < 2 {
                return Err(FsegError::InvalidConfig(format!(
                    "segment count must be at least 2, got {n}"
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.edge_fraction) {
            return Err(FsegError::InvalidConfig(format!(
                "edge fraction must lie in [0, 1], got {}",
                self.edge_fraction
            )));
        }
        if self.omega.is_nan() || self.omega < 0.0 {
            return Err(FsegError::InvalidConfig(format!(
                "omega must be non-negative, got {}",
                self.omega
            )));
        }
        if self.lloyd.max_iterations == 0 {
            return Err(FsegError::InvalidConfig(
                "lloyd iteration cap must be positive".into(),
            ));
        }
        if let Some(nmf) = &self.nmf {
            if nmf.max_iterations == 0 {
                return Err(FsegError::InvalidConfig(
                    "nmf iteration cap must be positive".into(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let p: SegmenterParams =
            serde_json::from_str(r#"{"segments":3,"histogram":{"halfWindow":5},"nmf":null}"#)
                .unwrap();
        assert_eq!(p.segments, Some(3));
        assert_eq!(p.histogram.half_window, 5);
        assert_eq!(p.histogram.bins, 11);
        assert!(p.nmf.is_none());
        assert_eq!(p.omega, 0.045);
        p.validate().unwrap();
    }

    #[test]
    fn single_segment_is_rejected() {
        let p = SegmenterParams {
            segments: Some(1),
            ..Default::default()
        };
        assert!(matches!(p.validate(), Err(FsegError::InvalidConfig(_))));
    }
}
