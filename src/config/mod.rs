//! JSON configuration of the demo binary.
//!
//! ```json
//! {
//!   "input": "scene.png",
//!   "filters": [{"kind": "log", "sigma": 0.5, "size": [3, 3]}],
//!   "stack": {"filterSource": "greyscale"},
//!   "segmenter": {"histogram": {"halfWindow": 12}, "segments": null},
//!   "seeds": [{"row": 60, "col": 238}, {"row": 160, "col": 160}],
//!   "output": {"labels_png": "out/labels.png", "report_json": "out/report.json"}
//! }
//! ```
//! Omitted sections take their defaults; omitting `filters` selects the
//! ten-kernel texture bank.
use crate::error::{FsegError, Result};
use crate::features::StackOptions;
use crate::filters::{FilterBank, FilterSpec};
use crate::segmenter::SegmenterParams;
use crate::types::Seed;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
pub struct RunConfig {
    pub input: PathBuf,
    #[serde(default)]
    pub filters: Option<Vec<FilterSpec>>,
    #[serde(default)]
    pub stack: StackOptions,
    #[serde(default)]
    pub segmenter: SegmenterParams,
    /// Manual templates; switches to seed-driven segmentation.
    #[serde(default)]
    pub seeds: Option<Vec<Seed>>,
    pub output: RunOutputConfig,
}

#[derive(Debug, Deserialize)]
pub struct RunOutputConfig {
    #[serde(rename = "labels_png")]
    pub labels_png: PathBuf,
    #[serde(rename = "report_json", default)]
    pub report_json: Option<PathBuf>,
    /// Sidecar JSON receiving the label raster metadata.
    #[serde(rename = "metadata_json", default)]
    pub metadata_json: Option<PathBuf>,
}

impl RunConfig {
    /// Materialize the configured filter bank.
    pub fn filter_bank(&self) -> Result<FilterBank> {
        match &self.filters {
            Some(specs) => FilterBank::new(specs),
            None => FilterBank::texture_default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<RunConfig> {
    let data = fs::read_to_string(path).map_err(|e| FsegError::io(path, e))?;
    parse_config(&data).map_err(|e| match e {
        FsegError::InvalidConfig(reason) => {
            FsegError::InvalidConfig(format!("{}: {reason}", path.display()))
        }
        other => other,
    })
}

pub fn parse_config(data: &str) -> Result<RunConfig> {
    let config: RunConfig =
        serde_json::from_str(data).map_err(|e| FsegError::InvalidConfig(e.to_string()))?;
    config.segmenter.validate()?;
    if let Some(filters) = &config.filters {
        for spec in filters {
            spec.validate()?;
        }
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FilterSource;

    #[test]
    fn minimal_config_uses_defaults() {
        let cfg = parse_config(r#"{"input":"a.png","output":{"labels_png":"l.png"}}"#).unwrap();
        assert!(cfg.seeds.is_none());
        assert_eq!(cfg.stack.filter_source, FilterSource::Greyscale);
        assert_eq!(cfg.filter_bank().unwrap().len(), 10);
        assert!(cfg.output.report_json.is_none());
    }

    #[test]
    fn full_config_round_trips_through_serde() {
        let cfg = parse_config(
            r#"{
                "input": "s2.png",
                "filters": [{"kind": "gabor", "sigma": 1.5, "theta": 0.0}],
                "stack": {"bands": [0, 1], "filterSource": "eachBand", "indices": ["ndvi"],
                          "bandMapping": {"red": 0, "nir": 1}},
                "segmenter": {"segments": 3, "nmf": {"init": {"kind": "random", "seed": 9}}},
                "seeds": [{"row": 1, "col": 2}, {"row": 3, "col": 4}],
                "output": {"labels_png": "l.png", "report_json": "r.json"}
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.filter_bank().unwrap().len(), 1);
        assert_eq!(cfg.stack.bands, Some(vec![0, 1]));
        assert_eq!(cfg.segmenter.segments, Some(3));
        assert_eq!(
            cfg.segmenter.nmf.map(|n| n.init),
            Some(crate::nmf::NmfInit::Random { seed: 9 })
        );
        assert_eq!(cfg.seeds.map(|s| s.len()), Some(2));
    }

    #[test]
    fn unknown_filter_kind_is_rejected() {
        let err = parse_config(
            r#"{"input":"a.png","filters":[{"kind":"sobel"}],"output":{"labels_png":"l.png"}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, FsegError::InvalidConfig(_)));
    }
}
