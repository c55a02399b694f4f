//! File adapters over the `image` crate for demos and tooling.
//!
//! - `load_image`: read a PNG/JPEG/TIFF into a one-band (grey) or three-band
//!   (RGB) [`MultiChannelImage`] with samples in `[0, 255]`.
//! - `save_label_png`: write a label raster as 8-bit grey, stretched over the
//!   label range.
//! - `write_json_file`: pretty-print a serializable value to disk.
//! - [`ImageFileSource`] / [`PngLabelSink`]: the raster traits backed by the
//!   functions above.
use super::MultiChannelImage;
use crate::error::{FsegError, Result};
use crate::raster::{BandRaster, LabelRaster, RasterMetadata, RasterSink, RasterSource};
use image::{GrayImage, Luma};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Load an image from disk; colour images keep their three channels.
pub fn load_image(path: &Path) -> Result<MultiChannelImage> {
    let img = image::open(path).map_err(|e| FsegError::io(path, e))?;
    let (w, h) = (img.width() as usize, img.height() as usize);
    if img.color().has_color() {
        let data = img.into_rgb8().into_raw();
        MultiChannelImage::from_interleaved(w, h, 3, data.into_iter().map(f32::from).collect())
    } else {
        let data = img.into_luma8().into_raw();
        MultiChannelImage::from_interleaved(w, h, 1, data.into_iter().map(f32::from).collect())
    }
}

/// Save a label raster as an 8-bit PNG, mapping the smallest label to 0 and
/// the largest to 255.
pub fn save_label_png(raster: &LabelRaster, path: &Path) -> Result<()> {
    ensure_parent_dir(path)?;
    let (lo, hi) = raster
        .data
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let span = if hi > lo { hi - lo } else { 1.0 };
    let mut out = GrayImage::new(raster.width as u32, raster.height as u32);
    for (i, &v) in raster.data.iter().enumerate() {
        let x = (i % raster.width) as u32;
        let y = (i / raster.width) as u32;
        let g = ((v - lo) / span * 255.0).round().clamp(0.0, 255.0);
        out.put_pixel(x, y, Luma([g as u8]));
    }
    out.save(path).map_err(|e| FsegError::io(path, e))
}

/// Serialize a value as pretty JSON to `path`, creating parent directories.
pub fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    ensure_parent_dir(path)?;
    let json = serde_json::to_string_pretty(value).map_err(|e| FsegError::io(path, e))?;
    fs::write(path, json).map_err(|e| FsegError::io(path, e))
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| FsegError::io(parent, e))?;
        }
    }
    Ok(())
}

/// [`RasterSource`] reading an ordinary image file.
#[derive(Clone, Debug)]
pub struct ImageFileSource {
    path: PathBuf,
}

impl ImageFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RasterSource for ImageFileSource {
    fn read(&mut self) -> Result<BandRaster> {
        let image = load_image(&self.path)?;
        let (w, h, bands) = (image.width(), image.height(), image.channels());
        let mut data = Vec::with_capacity(image.len());
        for plane in image.planes() {
            data.extend_from_slice(&plane.data);
        }
        let mut metadata = RasterMetadata::new();
        metadata.insert("driver".into(), Value::from("image"));
        metadata.insert(
            "path".into(),
            Value::from(self.path.to_string_lossy().into_owned()),
        );
        metadata.insert("count".into(), Value::from(bands));
        metadata.insert("height".into(), Value::from(h));
        metadata.insert("width".into(), Value::from(w));
        Ok(BandRaster {
            bands,
            height: h,
            width: w,
            data,
            metadata,
        })
    }
}

/// [`RasterSink`] writing a stretched PNG plus, optionally, the raster
/// metadata as a JSON sidecar.
#[derive(Clone, Debug)]
pub struct PngLabelSink {
    path: PathBuf,
    metadata_path: Option<PathBuf>,
}

impl PngLabelSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            metadata_path: None,
        }
    }

    pub fn with_metadata(mut self, path: impl Into<PathBuf>) -> Self {
        self.metadata_path = Some(path.into());
        self
    }
}

impl RasterSink for PngLabelSink {
    fn write(&mut self, raster: &LabelRaster) -> Result<()> {
        save_label_png(raster, &self.path)?;
        if let Some(meta) = &self.metadata_path {
            write_json_file(meta, &raster.metadata)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::label_raster;
    use crate::types::SegmentLabelMap;

    #[test]
    fn label_png_is_stretched_and_readable() {
        let dir = std::env::temp_dir().join(format!("fseg_io_{}", std::process::id()));
        let png = dir.join("labels.png");
        let meta = dir.join("labels.json");
        let labels = SegmentLabelMap::new(3, 1, 3, vec![0, 1, 2]);
        let raster = label_raster(&labels, &RasterMetadata::new());
        PngLabelSink::new(&png)
            .with_metadata(&meta)
            .write(&raster)
            .unwrap();

        let raster = ImageFileSource::new(&png).read().unwrap();
        assert_eq!(raster.bands, 1);
        assert_eq!(raster.data, vec![0.0, 128.0, 255.0]);
        let sidecar: RasterMetadata =
            serde_json::from_str(&fs::read_to_string(&meta).unwrap()).unwrap();
        assert_eq!(sidecar["dtype"], Value::from("float32"));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_image(Path::new("/nonexistent/fseg.png")).unwrap_err();
        assert!(matches!(err, FsegError::Io { .. }));
    }
}
