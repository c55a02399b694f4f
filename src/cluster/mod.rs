//! Model-order estimation, seeding and cluster refinement.
//!
//! Overview
//! - [`order`] forms the Gram matrix of the local histograms, picks the number
//!   of segments from its spectrum and projects every pixel onto the dominant
//!   eigenvectors.
//! - [`seeding`] chooses well separated initial centers by farthest-point
//!   traversal over pixels that are not dominated by texture edges.
//! - [`lloyd`] refines the centers by alternating assignment and mean update.
//! - [`regression`] labels every pixel by regressing its features on the
//!   final centers (or manual templates) and taking the largest coefficient.
//!
//! All stages are deterministic for a fixed input: ties resolve to the lowest
//! pixel or center index.

pub mod lloyd;
pub mod order;
pub mod regression;
pub mod seeding;

pub use lloyd::{assign, lloyd, LloydOutcome, LloydParams};
pub use order::{
    estimate_segments, gram_matrix, project, ModelOrderStrategy, ProjectedFeatures, Spectrum,
};
pub use regression::{regression_labels, template_coefficients};
pub use seeding::farthest_point_seeds;
