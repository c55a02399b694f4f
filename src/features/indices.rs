//! Normalized-difference spectral indices.
//!
//! Bands are looked up through a [`BandMapping`] so the same index works for
//! any sensor layout. A zero denominator yields 0 instead of NaN, which the
//! quantizer would reject.
use crate::error::{FsegError, Result};
use crate::image::{ImageF32, MultiChannelImage};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpectralIndex {
    /// `(nir − red) / (nir + red)`
    Ndvi,
    /// `(green − swir1) / (green + swir1)`
    Ndwi,
    /// `(swir1 − nir) / (swir1 + nir)`
    Ndbi,
    /// `(swir1 − green) / (swir1 + green) − NDVI`
    Dbi,
}

impl FromStr for SpectralIndex {
    type Err = FsegError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ndvi" => Ok(SpectralIndex::Ndvi),
            "ndwi" => Ok(SpectralIndex::Ndwi),
            "ndbi" => Ok(SpectralIndex::Ndbi),
            "dbi" => Ok(SpectralIndex::Dbi),
            _ => Err(FsegError::UnsupportedOperation {
                name: s.to_string(),
                expected: "ndvi, ndwi, ndbi, dbi",
            }),
        }
    }
}

/// Channel index of each named band, when the image has it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BandMapping {
    pub red: Option<usize>,
    pub green: Option<usize>,
    pub blue: Option<usize>,
    pub nir: Option<usize>,
    pub swir1: Option<usize>,
}

impl BandMapping {
    /// Sentinel-2 band stack ordered B2, B3, B4, B5, B6, B7, B8, B8A, B11, B12.
    pub fn sentinel2() -> Self {
        Self {
            blue: Some(0),
            green: Some(1),
            red: Some(2),
            nir: Some(6),
            swir1: Some(8),
        }
    }
}

#[inline]
fn normalized_difference(a: f32, b: f32) -> f32 {
    let sum = a + b;
    if sum == 0.0 {
        0.0
    } else {
        (a - b) / sum
    }
}

fn band(image: &MultiChannelImage, index: Option<usize>, name: &str) -> Result<usize> {
    match index {
        Some(c) if c < image.channels() => Ok(c),
        Some(c) => Err(FsegError::InvalidConfig(format!(
            "{name} band {c} is outside the {}-band image",
            image.channels()
        ))),
        None => Err(FsegError::InvalidConfig(format!(
            "{name} band is not mapped"
        ))),
    }
}

impl SpectralIndex {
    pub fn name(self) -> &'static str {
        match self {
            SpectralIndex::Ndvi => "ndvi",
            SpectralIndex::Ndwi => "ndwi",
            SpectralIndex::Ndbi => "ndbi",
            SpectralIndex::Dbi => "dbi",
        }
    }

    /// Evaluate the index for every pixel of `image`.
    pub fn compute(self, image: &MultiChannelImage, mapping: &BandMapping) -> Result<ImageF32> {
        let (w, h) = (image.width(), image.height());
        let plane = match self {
            SpectralIndex::Ndvi => {
                let nir = band(image, mapping.nir, "nir")?;
                let red = band(image, mapping.red, "red")?;
                ImageF32::from_fn(w, h, |x, y| {
                    normalized_difference(image.get(x, y, nir), image.get(x, y, red))
                })
            }
            SpectralIndex::Ndwi => {
                let green = band(image, mapping.green, "green")?;
                let swir = band(image, mapping.swir1, "swir1")?;
                ImageF32::from_fn(w, h, |x, y| {
                    normalized_difference(image.get(x, y, green), image.get(x, y, swir))
                })
            }
            SpectralIndex::Ndbi => {
                let swir = band(image, mapping.swir1, "swir1")?;
                let nir = band(image, mapping.nir, "nir")?;
                ImageF32::from_fn(w, h, |x, y| {
                    normalized_difference(image.get(x, y, swir), image.get(x, y, nir))
                })
            }
            SpectralIndex::Dbi => {
                let swir = band(image, mapping.swir1, "swir1")?;
                let green = band(image, mapping.green, "green")?;
                let ndvi = SpectralIndex::Ndvi.compute(image, mapping)?;
                ImageF32::from_fn(w, h, |x, y| {
                    normalized_difference(image.get(x, y, swir), image.get(x, y, green))
                        - ndvi.get(x, y)
                })
            }
        };
        Ok(plane)
    }
}
