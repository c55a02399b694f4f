use serde::{Deserialize, Serialize};

/// Column-oriented access to a `dim × len` feature matrix (one column per
/// pixel). Implemented by the full local histograms and by their projection
/// onto the dominant eigen-subspace.
pub trait FeatureMatrix: Sync {
    /// Features per pixel.
    fn dim(&self) -> usize;
    /// Number of pixels.
    fn len(&self) -> usize;
    /// Copy the feature vector of pixel `idx` into `out` (length `dim`).
    fn column_into(&self, idx: usize, out: &mut [f64]);

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Manually selected texture template, in (row, column) pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seed {
    pub row: usize,
    pub col: usize,
}

impl Seed {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl From<(usize, usize)> for Seed {
    fn from((row, col): (usize, usize)) -> Self {
        Self { row, col }
    }
}

/// Per-pixel segment labels in `[0, segments)`, row-major.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentLabelMap {
    pub w: usize,
    pub h: usize,
    pub segments: usize,
    #[serde(skip)]
    pub data: Vec<u32>,
}

impl SegmentLabelMap {
    pub fn new(w: usize, h: usize, segments: usize, data: Vec<u32>) -> Self {
        debug_assert_eq!(data.len(), w * h);
        Self {
            w,
            h,
            segments,
            data,
        }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u32 {
        self.data[y * self.w + x]
    }

    /// Pixel count per label.
    pub fn histogram(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.segments];
        for &l in &self.data {
            if let Some(c) = counts.get_mut(l as usize) {
                *c += 1;
            }
        }
        counts
    }

    /// Labels as 32-bit floats, the pixel type of the output raster.
    pub fn to_f32(&self) -> Vec<f32> {
        self.data.iter().map(|&l| l as f32).collect()
    }
}
