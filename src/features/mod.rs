//! Assembly of the feature stack fed to the segmenter.
//!
//! A stack is built from, in order:
//! - the selected raw bands,
//! - a greyscale band derived from an RGB triple (skipped for single-band
//!   input, whose only band already plays that role),
//! - filter-bank responses of the greyscale band and/or of every raw band,
//! - spectral-index bands.
//!
//! Greyscale conversion divides the RGB triple by its global maximum and
//! applies the luminance weights `0.2125 R + 0.7154 G + 0.0721 B`.

pub mod indices;

pub use indices::{BandMapping, SpectralIndex};

use crate::error::{FsegError, Result, Stage};
use crate::filters::FilterBank;
use crate::image::{ImageF32, MultiChannelImage};
use log::debug;
use serde::{Deserialize, Serialize};

const LUMA: [f32; 3] = [0.2125, 0.7154, 0.0721];

/// Planes passed through the filter bank.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterSource {
    /// Only the greyscale band (or the single band of a one-band image).
    #[default]
    Greyscale,
    /// Every selected raw band.
    EachBand,
    /// Greyscale band first, then every raw band.
    Both,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StackOptions {
    /// Raw bands to keep, in order; `None` keeps all of them.
    pub bands: Option<Vec<usize>>,
    /// Channels holding red, green and blue. Defaults to the first three
    /// channels of an image with at least three.
    pub rgb: Option<[usize; 3]>,
    pub filter_source: FilterSource,
    pub indices: Vec<SpectralIndex>,
    pub band_mapping: BandMapping,
}

/// Greyscale plane of `image`, `None` for two-band input without an RGB
/// mapping.
pub fn greyscale(image: &MultiChannelImage, rgb: Option<[usize; 3]>) -> Result<Option<ImageF32>> {
    let channels = image.channels();
    let rgb = match rgb {
        Some(rgb) => rgb,
        None if channels == 1 => return Ok(Some(image.plane(0))),
        None if channels >= 3 => [0, 1, 2],
        None => return Ok(None),
    };
    if let Some(&bad) = rgb.iter().find(|&&c| c >= channels) {
        return Err(FsegError::InvalidConfig(format!(
            "rgb channel {bad} is outside the {channels}-band image"
        )));
    }
    let max = rgb
        .iter()
        .filter_map(|&c| image.channel_range(c).map(|(_, hi)| hi))
        .fold(f32::NEG_INFINITY, f32::max);
    let scale = if max > 0.0 && max.is_finite() { 1.0 / max } else { 1.0 };
    Ok(Some(ImageF32::from_fn(image.width(), image.height(), |x, y| {
        rgb.iter()
            .zip(LUMA)
            .map(|(&c, weight)| weight * image.get(x, y, c) * scale)
            .sum()
    })))
}

/// Build the segmentation input from a raw image.
pub fn build_feature_stack(
    image: &MultiChannelImage,
    options: &StackOptions,
    bank: &FilterBank,
) -> Result<MultiChannelImage> {
    if image.is_empty() {
        return Err(FsegError::invalid(Stage::FeatureStack, "image is empty"));
    }
    let selected: Vec<usize> = match &options.bands {
        Some(bands) => bands.clone(),
        None => (0..image.channels()).collect(),
    };
    if let Some(&bad) = selected.iter().find(|&&c| c >= image.channels()) {
        return Err(FsegError::InvalidConfig(format!(
            "band {bad} is outside the {}-band image",
            image.channels()
        )));
    }

    let mut planes: Vec<ImageF32> = selected.iter().map(|&c| image.plane(c)).collect();
    let grey = greyscale(image, options.rgb)?;
    if image.channels() > 1 {
        if let Some(g) = &grey {
            planes.push(g.clone());
        }
    }

    if !bank.is_empty() {
        if matches!(options.filter_source, FilterSource::Greyscale | FilterSource::Both) {
            let g = grey.as_ref().ok_or_else(|| {
                FsegError::InvalidConfig(
                    "filtering the greyscale band needs an rgb mapping for two-band input".into(),
                )
            })?;
            planes.extend(bank.apply(g)?);
        }
        if matches!(options.filter_source, FilterSource::EachBand | FilterSource::Both) {
            for &c in &selected {
                planes.extend(bank.apply(&image.plane(c))?);
            }
        }
    }

    for index in &options.indices {
        planes.push(index.compute(image, &options.band_mapping)?);
    }
    debug!(
        "build_feature_stack {}x{} bands={} filters={} indices={} -> {} channels",
        image.width(),
        image.height(),
        selected.len(),
        bank.len(),
        options.indices.len(),
        planes.len()
    );
    MultiChannelImage::from_planes(&planes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::FilterSpec;

    fn rgb_image() -> MultiChannelImage {
        let r = ImageF32::from_fn(4, 4, |x, _| x as f32);
        let g = ImageF32::from_fn(4, 4, |_, y| y as f32);
        let b = ImageF32::from_fn(4, 4, |_, _| 2.0);
        MultiChannelImage::from_planes(&[r, g, b]).unwrap()
    }

    fn log_bank() -> FilterBank {
        FilterBank::new(&[FilterSpec::Log {
            sigma: 0.5,
            size: [3, 3],
        }])
        .unwrap()
    }

    #[test]
    fn greyscale_uses_luminance_weights() {
        let img = rgb_image();
        let g = greyscale(&img, None).unwrap().unwrap();
        // max over the triple is 3
        let want = (0.2125 * 3.0 + 0.7154 * 1.0 + 0.0721 * 2.0) / 3.0;
        assert!((g.get(3, 1) - want).abs() < 1e-6);
    }

    #[test]
    fn stack_layout_follows_the_options() {
        let img = rgb_image();
        let bank = log_bank();
        let grey_only = build_feature_stack(&img, &StackOptions::default(), &bank).unwrap();
        // 3 raw + grey + 1 response
        assert_eq!(grey_only.channels(), 5);
        let both = StackOptions {
            filter_source: FilterSource::Both,
            ..Default::default()
        };
        assert_eq!(build_feature_stack(&img, &both, &bank).unwrap().channels(), 8);
        let subset = StackOptions {
            bands: Some(vec![2]),
            filter_source: FilterSource::EachBand,
            ..Default::default()
        };
        assert_eq!(build_feature_stack(&img, &subset, &bank).unwrap().channels(), 3);
    }

    #[test]
    fn single_band_input_is_its_own_greyscale() {
        let img = MultiChannelImage::from_planes(&[ImageF32::from_fn(5, 5, |x, y| (x * y) as f32)])
            .unwrap();
        let stack = build_feature_stack(&img, &StackOptions::default(), &log_bank()).unwrap();
        assert_eq!(stack.channels(), 2);
        assert_eq!(stack.plane(0), img.plane(0));
    }

    #[test]
    fn out_of_range_band_is_a_config_error() {
        let opts = StackOptions {
            bands: Some(vec![7]),
            ..Default::default()
        };
        assert!(matches!(
            build_feature_stack(&rgb_image(), &opts, &log_bank()),
            Err(FsegError::InvalidConfig(_))
        ));
    }
}
