//! Band-major rasters crossing the crate boundary.
//!
//! Georeferenced raster formats are handled outside the crate. A
//! [`RasterSource`] hands in a `(bands, height, width)` array plus opaque
//! metadata, and a [`RasterSink`] receives the label raster with that
//! metadata updated for a single `float32` band.
use crate::error::Result;
use crate::image::MultiChannelImage;
use crate::types::SegmentLabelMap;
use serde_json::Value;
use std::collections::BTreeMap;

/// Opaque raster metadata (driver profile, transform, CRS, ...).
pub type RasterMetadata = BTreeMap<String, Value>;

#[derive(Clone, Debug)]
pub struct BandRaster {
    pub bands: usize,
    pub height: usize,
    pub width: usize,
    /// Band-major samples: `data[(b * height + y) * width + x]`.
    pub data: Vec<f32>,
    pub metadata: RasterMetadata,
}

impl BandRaster {
    pub fn to_image(&self) -> Result<MultiChannelImage> {
        MultiChannelImage::from_band_major(self.bands, self.height, self.width, &self.data)
    }
}

/// Single-band label raster ready to be written.
#[derive(Clone, Debug)]
pub struct LabelRaster {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f32>,
    pub metadata: RasterMetadata,
}

/// Label raster carrying `metadata` updated for one `float32` band of the
/// label map's size.
pub fn label_raster(labels: &SegmentLabelMap, metadata: &RasterMetadata) -> LabelRaster {
    let mut metadata = metadata.clone();
    metadata.insert("count".into(), Value::from(1));
    metadata.insert("dtype".into(), Value::from("float32"));
    metadata.insert("compress".into(), Value::from("lzw"));
    metadata.insert("height".into(), Value::from(labels.h));
    metadata.insert("width".into(), Value::from(labels.w));
    LabelRaster {
        width: labels.w,
        height: labels.h,
        data: labels.to_f32(),
        metadata,
    }
}

/// Provider of input rasters.
pub trait RasterSource {
    fn read(&mut self) -> Result<BandRaster>;
}

/// Consumer of label rasters.
pub trait RasterSink {
    fn write(&mut self, raster: &LabelRaster) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_is_updated_and_preserved() {
        let labels = SegmentLabelMap::new(3, 2, 2, vec![0, 1, 1, 0, 0, 1]);
        let mut meta = RasterMetadata::new();
        meta.insert("crs".into(), Value::from("EPSG:32633"));
        meta.insert("count".into(), Value::from(4));
        meta.insert("dtype".into(), Value::from("uint16"));
        let out = label_raster(&labels, &meta);
        assert_eq!(out.metadata["count"], Value::from(1));
        assert_eq!(out.metadata["dtype"], Value::from("float32"));
        assert_eq!(out.metadata["compress"], Value::from("lzw"));
        assert_eq!(out.metadata["width"], Value::from(3));
        assert_eq!(out.metadata["height"], Value::from(2));
        assert_eq!(out.metadata["crs"], Value::from("EPSG:32633"));
        assert_eq!(out.data, vec![0.0, 1.0, 1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn band_major_raster_becomes_pixel_interleaved() {
        let raster = BandRaster {
            bands: 2,
            height: 1,
            width: 2,
            data: vec![1.0, 2.0, 10.0, 20.0],
            metadata: RasterMetadata::new(),
        };
        let img = raster.to_image().unwrap();
        assert_eq!(img.pixel(0, 0), &[1.0, 10.0]);
        assert_eq!(img.pixel(1, 0), &[2.0, 20.0]);
    }
}
