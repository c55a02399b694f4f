use fseg::image::{ImageF32, MultiChannelImage};

/// Single-band image with value `left` before column `split` and `right`
/// from it on.
pub fn two_region(width: usize, height: usize, split: usize, left: f32, right: f32) -> ImageF32 {
    assert!(width > 0 && height > 0, "image dimensions must be positive");
    ImageF32::from_fn(width, height, |x, _| if x < split { left } else { right })
}

/// Two-channel image with pseudo-random values, for brute-force comparisons.
pub fn noisy_two_band(width: usize, height: usize) -> MultiChannelImage {
    let a = ImageF32::from_fn(width, height, |x, y| ((x * 7 + y * 13 + x * y) % 11) as f32);
    let b = ImageF32::from_fn(width, height, |x, y| ((x * x + 3 * y) % 5) as f32 * 0.25);
    MultiChannelImage::from_planes(&[a, b]).expect("planes share a size")
}
