use super::kernel::{correlate_reflect, FilterKernel, FilterSpec};
use crate::error::Result;
use crate::image::{ImageF32, MultiChannelImage};
use log::debug;

/// Ordered list of materialized kernels.
///
/// Responses are always produced in kernel order; for stacks the layout is
/// channel-major (all kernels of channel 0, then all kernels of channel 1, …).
#[derive(Clone, Debug, Default)]
pub struct FilterBank {
    kernels: Vec<FilterKernel>,
}

impl FilterBank {
    /// Validate and materialize every spec. Fails on the first invalid entry.
    pub fn new(specs: &[FilterSpec]) -> Result<Self> {
        let kernels = specs
            .iter()
            .map(FilterKernel::from_spec)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { kernels })
    }

    /// The LoG/Gabor bank used for the satellite and photo experiments:
    /// two LoG scales plus Gabor filters at two scales and four orientations.
    pub fn texture_default() -> Result<Self> {
        use std::f32::consts::{FRAC_PI_2, FRAC_PI_4};
        let mut specs = vec![
            FilterSpec::Log {
                sigma: 0.5,
                size: [3, 3],
            },
            FilterSpec::Log {
                sigma: 1.0,
                size: [5, 5],
            },
        ];
        for sigma in [1.5f32, 2.5] {
            for theta in [0.0, FRAC_PI_2, FRAC_PI_4, -FRAC_PI_4] {
                specs.push(FilterSpec::Gabor { sigma, theta });
            }
        }
        Self::new(&specs)
    }

    pub fn kernels(&self) -> &[FilterKernel] {
        &self.kernels
    }

    pub fn len(&self) -> usize {
        self.kernels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kernels.is_empty()
    }

    /// Filter one plane with every kernel.
    pub fn apply(&self, plane: &ImageF32) -> Result<Vec<ImageF32>> {
        debug!(
            "FilterBank::apply {}x{} kernels={}",
            plane.w,
            plane.h,
            self.kernels.len()
        );
        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            self.kernels
                .par_iter()
                .map(|k| correlate_reflect(plane, k))
                .collect()
        }
        #[cfg(not(feature = "parallel"))]
        {
            self.kernels
                .iter()
                .map(|k| correlate_reflect(plane, k))
                .collect()
        }
    }

    /// Filter every channel of `image` independently and stack the responses.
    pub fn apply_stack(&self, image: &MultiChannelImage) -> Result<MultiChannelImage> {
        let mut responses = Vec::with_capacity(image.channels() * self.kernels.len());
        for plane in image.planes() {
            responses.extend(self.apply(&plane)?);
        }
        MultiChannelImage::from_planes(&responses)
    }
}
