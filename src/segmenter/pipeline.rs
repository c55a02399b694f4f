//! Segmentation pipeline.
//!
//! Typical usage:
//! ```no_run
//! use fseg::{MultiChannelImage, Segmenter, SegmenterParams};
//!
//! # fn example(stack: MultiChannelImage) -> fseg::Result<()> {
//! let mut segmenter = Segmenter::new(SegmenterParams::default());
//! let report = segmenter.segment(&stack)?;
//! println!("{} segments", report.segments);
//! # Ok(())
//! # }
//! ```

// Stages
// - Histograms: quantize, integral volume, windowed histograms (workspace buffers).
// - Spectrum: Gram matrix and its eigen-decomposition; segment count.
// - Projection: histograms onto the leading eigenvectors.
// - Edges + seeding: low-edge candidates, farthest-point seeds.
// - Lloyd: center refinement on the candidates.
// - Regression: least-squares labels for every pixel.
// - NMF: optional non-negative refinement of the labels.

use super::params::SegmenterParams;
use super::workspace::SegmenterWorkspace;
use crate::cluster::{
    estimate_segments, farthest_point_seeds, gram_matrix, lloyd, project, regression_labels,
    Spectrum,
};
use crate::diagnostics::timing::elapsed_ms;
use crate::diagnostics::{
    ClusterStage, InputDescriptor, ModelOrderStage, NmfStage, SegmentationReport, TimingBreakdown,
};
use crate::edges::{candidates_or_all, edge_strength_map};
use crate::error::{FsegError, Result, SegmentationWarning, Stage};
use crate::histogram::LocalHistograms;
use crate::image::MultiChannelImage;
use crate::nmf::{factorize, random_basis, NmfInit, NmfParams};
use crate::types::{Seed, SegmentLabelMap};
use log::{debug, warn};
use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Instant;

/// Factorization-based texture segmenter.
///
/// Owns its parameters and a workspace whose buffers are reused across
/// calls; one segmenter serves one run at a time.
pub struct Segmenter {
    params: SegmenterParams,
    workspace: SegmenterWorkspace,
}

/// Templates entering the optional NMF stage.
struct NmfInput {
    templates: DMatrix<f64>,
    labels: Vec<u32>,
}

impl Segmenter {
    pub fn new(params: SegmenterParams) -> Self {
        Self {
            params,
            workspace: SegmenterWorkspace::new(),
        }
    }

    pub fn params(&self) -> &SegmenterParams {
        &self.params
    }

    pub fn set_params(&mut self, params: SegmenterParams) {
        self.params = params;
    }

    pub fn workspace(&self) -> &SegmenterWorkspace {
        &self.workspace
    }

    pub fn workspace_mut(&mut self) -> &mut SegmenterWorkspace {
        &mut self.workspace
    }

    /// Unsupervised segmentation. Random NMF initialization, when configured,
    /// draws from a generator seeded with the configured seed.
    pub fn segment(&mut self, image: &MultiChannelImage) -> Result<SegmentationReport> {
        let mut rng = StdRng::seed_from_u64(self.nmf_seed());
        self.segment_with_rng(image, &mut rng)
    }

    /// Unsupervised segmentation drawing any random NMF initialization from
    /// `rng`.
    pub fn segment_with_rng<R: Rng>(
        &mut self,
        image: &MultiChannelImage,
        rng: &mut R,
    ) -> Result<SegmentationReport> {
        self.params.validate()?;
        let total_start = Instant::now();
        let mut timing = TimingBreakdown::default();
        let mut warnings = Vec::new();

        let hist = self.histograms(image, &mut timing)?;
        let (w, h) = (hist.w, hist.h);
        let pixels = w * h;
        if let Some(n) = self.params.segments {
            if n > hist.dim {
                return Err(FsegError::invalid(
                    Stage::ModelOrder,
                    format!("{n} segments exceed the {} histogram features", hist.dim),
                ));
            }
        }

        let spectrum = timing.record("spectrum", || Spectrum::from_gram(gram_matrix(&hist)));
        let (segments, estimated) = match self.params.segments {
            Some(n) => (n, false),
            None => (
                estimate_segments(
                    &spectrum,
                    pixels,
                    self.params.model_order,
                    self.params.omega,
                ),
                true,
            ),
        };
        if pixels < segments {
            return Err(FsegError::invalid(
                Stage::Seeding,
                format!("{pixels} pixels cannot hold {segments} segments"),
            ));
        }
        debug!(
            "Segmenter::segment {}x{} dim={} segments={} estimated={}",
            w, h, hist.dim, segments, estimated
        );
        let model_order = ModelOrderStage {
            strategy: self.params.model_order,
            omega: self.params.omega,
            estimated,
            segments,
            spectrum: spectrum.eigenvalues.clone(),
        };

        let basis = spectrum.basis(segments);
        let projected = timing.record("projection", || project(&hist, &basis))?;

        let seed_start = Instant::now();
        let ws = self.params.histogram.half_window;
        let edges = edge_strength_map(&projected, w, h, ws)?;
        let (candidates, candidate_fallback) =
            candidates_or_all(&edges, self.params.edge_fraction, segments);
        let seeds = farthest_point_seeds(&projected, &candidates, segments)?;
        timing.push("seeding", elapsed_ms(seed_start));

        let initial = DMatrix::from_columns(
            &seeds
                .iter()
                .map(|&idx| DVector::from_column_slice(projected.column(idx)))
                .collect::<Vec<_>>(),
        );
        let lloyd_out = timing.record("lloyd", || {
            lloyd(&projected, &candidates, initial, &self.params.lloyd)
        })?;
        if !lloyd_out.converged {
            let warning = SegmentationWarning::NonConvergence {
                stage: Stage::Lloyd,
                iterations: lloyd_out.iterations,
                last_delta: lloyd_out.last_delta,
            };
            warn!("{warning}");
            warnings.push(warning);
        }

        let labels = timing.record("regression", || {
            regression_labels(&lloyd_out.centers, &projected)
        })?;

        let clustering = ClusterStage {
            seed_pixels: seeds.iter().map(|&idx| Seed::new(idx / w, idx % w)).collect(),
            candidates: candidates.len(),
            candidate_fallback,
            iterations: lloyd_out.iterations,
            converged: lloyd_out.converged,
            last_delta: lloyd_out.last_delta.is_finite().then_some(lloyd_out.last_delta),
            manual: false,
        };

        let nmf_input = NmfInput {
            templates: &basis * &lloyd_out.centers,
            labels,
        };
        let (labels, nmf) = self.refine(&hist, nmf_input, rng, &mut timing, &mut warnings)?;

        timing.total_ms = elapsed_ms(total_start);
        Ok(SegmentationReport {
            labels: SegmentLabelMap::new(w, h, segments, labels),
            segments,
            input: describe(image, &hist),
            model_order: Some(model_order),
            clustering: Some(clustering),
            nmf,
            warnings,
            timing,
        })
    }

    /// Segmentation with one texture template per manual seed. The seed
    /// count fixes the number of segments.
    pub fn segment_with_seeds(
        &mut self,
        image: &MultiChannelImage,
        seeds: &[Seed],
    ) -> Result<SegmentationReport> {
        self.params.validate()?;
        if seeds.len() < 2 {
            return Err(FsegError::invalid(
                Stage::Seeding,
                format!("at least 2 seeds are required, got {}", seeds.len()),
            ));
        }
        let (w, h) = (image.width(), image.height());
        if let Some(bad) = seeds.iter().find(|s| s.row >= h || s.col >= w) {
            return Err(FsegError::invalid(
                Stage::Seeding,
                format!(
                    "seed ({}, {}) is outside the {}x{} image",
                    bad.row, bad.col, w, h
                ),
            ));
        }
        let total_start = Instant::now();
        let mut timing = TimingBreakdown::default();
        let mut warnings = Vec::new();

        let hist = self.histograms(image, &mut timing)?;
        let segments = seeds.len();
        let z = DMatrix::from_columns(
            &seeds
                .iter()
                .map(|s| {
                    let feature = hist.pixel(s.col, s.row);
                    DVector::from_iterator(hist.dim, feature.iter().map(|&v| f64::from(v)))
                })
                .collect::<Vec<_>>(),
        );
        debug!(
            "Segmenter::segment_with_seeds {}x{} dim={} seeds={}",
            w, h, hist.dim, segments
        );
        let labels = timing.record("regression", || regression_labels(&z, &hist))?;
        let clustering = ClusterStage {
            seed_pixels: seeds.to_vec(),
            candidates: 0,
            candidate_fallback: false,
            iterations: 0,
            converged: true,
            last_delta: None,
            manual: true,
        };

        let mut rng = StdRng::seed_from_u64(self.nmf_seed());
        let nmf_input = NmfInput { templates: z, labels };
        let (labels, nmf) =
            self.refine(&hist, nmf_input, &mut rng, &mut timing, &mut warnings)?;

        timing.total_ms = elapsed_ms(total_start);
        Ok(SegmentationReport {
            labels: SegmentLabelMap::new(w, h, segments, labels),
            segments,
            input: describe(image, &hist),
            model_order: None,
            clustering: Some(clustering),
            nmf,
            warnings,
            timing,
        })
    }

    fn nmf_seed(&self) -> u64 {
        match self.params.nmf.as_ref().map(|n| n.init) {
            Some(NmfInit::Random { seed }) => seed,
            _ => 0,
        }
    }

    fn histograms(
        &mut self,
        image: &MultiChannelImage,
        timing: &mut TimingBreakdown,
    ) -> Result<LocalHistograms> {
        let workspace = &mut self.workspace;
        let options = &self.params.histogram;
        timing.record("histograms", || workspace.local_histograms(image, options))
    }

    /// Run the NMF stage when enabled; otherwise pass the labels through.
    fn refine<R: Rng>(
        &self,
        hist: &LocalHistograms,
        input: NmfInput,
        rng: &mut R,
        timing: &mut TimingBreakdown,
        warnings: &mut Vec<SegmentationWarning>,
    ) -> Result<(Vec<u32>, Option<NmfStage>)> {
        let Some(params) = self.params.nmf.as_ref() else {
            return Ok((input.labels, None));
        };
        let w0 = initial_basis(params, input.templates, rng);
        let out = timing.record("nmf", || factorize(hist, w0, params))?;
        warnings.extend(out.warnings);
        let stage = NmfStage {
            init: params.init,
            iterations: out.iterations,
            converged: out.converged,
            rmse: out.rmse,
        };
        Ok((out.labels, Some(stage)))
    }
}

fn initial_basis<R: Rng>(params: &NmfParams, templates: DMatrix<f64>, rng: &mut R) -> DMatrix<f64> {
    match params.init {
        NmfInit::FromTemplates => templates,
        NmfInit::Random { .. } => random_basis(templates.nrows(), templates.ncols(), rng),
    }
}

fn describe(image: &MultiChannelImage, hist: &LocalHistograms) -> InputDescriptor {
    InputDescriptor {
        width: image.width(),
        height: image.height(),
        channels: image.channels(),
        feature_dim: hist.dim,
    }
}
