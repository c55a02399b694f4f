//! Texture filter bank: Laplacian-of-Gaussian and Gabor kernels.
//!
//! Kernels are materialized once from a [`FilterSpec`] and are zero-mean by
//! construction. Application is a dense correlation with half-sample
//! symmetric ("reflect") border handling, so flat regions respond with zero
//! regardless of how close they are to the image border.
//!
//! - [`kernel`]: analytic kernel generation and single-plane correlation.
//! - [`bank`]: ordered kernel lists applied to planes and channel stacks.

pub mod bank;
pub mod kernel;

pub use bank::FilterBank;
pub use kernel::{correlate_reflect, FilterKernel, FilterKind, FilterSpec};
