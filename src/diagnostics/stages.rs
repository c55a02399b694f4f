use crate::cluster::ModelOrderStrategy;
use crate::nmf::NmfInit;
use crate::types::Seed;
use serde::Serialize;

/// How the number of segments was chosen.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelOrderStage {
    pub strategy: ModelOrderStrategy,
    pub omega: f64,
    /// `false` when the segment count was supplied by the caller.
    pub estimated: bool,
    pub segments: usize,
    /// Gram eigenvalues, largest first.
    pub spectrum: Vec<f64>,
}

/// Seeding and Lloyd refinement trace.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStage {
    /// Seed pixels in selection order (or the manual seeds).
    pub seed_pixels: Vec<Seed>,
    /// Low-edge pixels eligible for seeding.
    pub candidates: usize,
    /// Seeding fell back to every pixel.
    pub candidate_fallback: bool,
    pub iterations: usize,
    pub converged: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_delta: Option<f64>,
    /// Templates came from manual seeds.
    pub manual: bool,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NmfStage {
    pub init: NmfInit,
    pub iterations: usize,
    pub converged: bool,
    /// RMSE after every iteration.
    pub rmse: Vec<f64>,
}
