//! Segmenter orchestrating the factorization-based pipeline.
//!
//! Overview
//! - Builds local spectral histograms of the (already stacked) feature image.
//! - Estimates the number of segments from the Gram spectrum unless one is
//!   supplied, and projects every histogram onto the dominant eigenvectors.
//! - Computes the texture edge map in the projected space and draws
//!   farthest-point seeds from low-edge pixels.
//! - Refines the centers with Lloyd iteration restricted to those pixels,
//!   then labels every pixel by least-squares regression on the centers.
//! - Optionally sharpens the labels with non-negative factorization.
//!
//! The manual-seed variant replaces estimation, seeding and Lloyd with the
//! histograms at user-supplied pixels.
//!
//! Modules
//! - [`params`] – configuration of every stage.
//! - `pipeline` – the [`Segmenter`] implementation.
//! - `workspace` – scratch buffers reused across runs.

pub mod params;
mod pipeline;
mod workspace;

pub use params::SegmenterParams;
pub use pipeline::Segmenter;
pub use workspace::SegmenterWorkspace;
