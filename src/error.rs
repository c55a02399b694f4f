//! Error and warning types shared by every segmentation stage.
//!
//! Structural problems (bad shapes, degenerate channels, malformed
//! configuration) abort a run with an [`FsegError`]. Iterative stages that hit
//! their caps, or whose residual grows, keep their best estimate and report a
//! [`SegmentationWarning`] instead.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, FsegError>;

/// Pipeline stage that raised an error or warning.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Stage {
    FeatureStack,
    Filtering,
    Quantization,
    IntegralHistogram,
    EdgeMap,
    ModelOrder,
    Seeding,
    Lloyd,
    Regression,
    Nmf,
    Output,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::FeatureStack => "feature stack",
            Stage::Filtering => "filtering",
            Stage::Quantization => "quantization",
            Stage::IntegralHistogram => "integral histogram",
            Stage::EdgeMap => "edge map",
            Stage::ModelOrder => "model order",
            Stage::Seeding => "seeding",
            Stage::Lloyd => "lloyd",
            Stage::Regression => "regression",
            Stage::Nmf => "nmf",
            Stage::Output => "output",
        };
        f.write_str(name)
    }
}

/// Errors that abort a segmentation run.
#[derive(Error, Debug)]
pub enum FsegError {
    /// Input shape or parameter outside the supported domain
    #[error("Invalid input at {stage}: {reason}")]
    InvalidInput { stage: Stage, reason: String },

    /// A channel has zero dynamic range and cannot be quantized
    #[error("Channel {channel} is constant (value {value}); cannot quantize")]
    DegenerateChannel { channel: usize, value: f32 },

    /// Normal equations of the template regression are rank-deficient
    #[error("Singular matrix at {stage}: rank {rank} of {size}")]
    SingularMatrix {
        stage: Stage,
        rank: usize,
        size: usize,
    },

    /// Configuration value rejected during validation
    #[error("Configuration error: {0}")]
    InvalidConfig(String),

    /// A named operation is not part of the closed set of supported ones
    #[error("Unsupported operation '{name}', expected one of: {expected}")]
    UnsupportedOperation {
        name: String,
        expected: &'static str,
    },

    /// File access failed in one of the adapters
    #[error("I/O error for {}: {reason}", path.display())]
    Io { path: PathBuf, reason: String },
}

impl FsegError {
    pub(crate) fn invalid(stage: Stage, reason: impl Into<String>) -> Self {
        FsegError::InvalidInput {
            stage,
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        FsegError::Io {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Stage that raised the error, when it belongs to one.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            FsegError::InvalidInput { stage, .. } | FsegError::SingularMatrix { stage, .. } => {
                Some(*stage)
            }
            FsegError::DegenerateChannel { .. } => Some(Stage::Quantization),
            _ => None,
        }
    }
}

/// Non-fatal conditions reported alongside a result.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum SegmentationWarning {
    /// Iteration cap reached before the tolerance was met.
    NonConvergence {
        stage: Stage,
        iterations: usize,
        last_delta: f64,
    },
    /// NMF reconstruction error grew between two iterations.
    RmseIncreased {
        iteration: usize,
        previous: f64,
        current: f64,
    },
}

impl fmt::Display for SegmentationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentationWarning::NonConvergence {
                stage,
                iterations,
                last_delta,
            } => write!(
                f,
                "{stage} did not converge in {iterations} iterations (delta {last_delta:.3e})"
            ),
            SegmentationWarning::RmseIncreased {
                iteration,
                previous,
                current,
            } => write!(
                f,
                "nmf rmse increased at iteration {iteration}: {previous:.6} -> {current:.6}"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_name_their_stage() {
        let err = FsegError::invalid(Stage::Seeding, "no seeds");
        assert_eq!(err.stage(), Some(Stage::Seeding));
        let err = FsegError::SingularMatrix {
            stage: Stage::Regression,
            rank: 1,
            size: 2,
        };
        assert_eq!(err.stage(), Some(Stage::Regression));
        let err = FsegError::DegenerateChannel {
            channel: 0,
            value: 1.0,
        };
        assert_eq!(err.stage(), Some(Stage::Quantization));
        assert_eq!(FsegError::InvalidConfig("bad".into()).stage(), None);
        assert_eq!(FsegError::io("/tmp/x", "denied").stage(), None);
    }
}
