mod common;

use common::synthetic_image::noisy_two_band;
use fseg::histogram::{
    local_histograms, quantize, HistogramNormalization, HistogramOptions, IntegralHistogram,
};

#[test]
fn integral_windows_match_brute_force_counts() {
    let _ = env_logger::builder().is_test(true).try_init();
    let img = noisy_two_band(8, 8);
    let bins = 4;
    let ws = 1usize;
    let q = quantize(&img, bins).unwrap();
    let ih = IntegralHistogram::from_quantized(&q).unwrap();
    let mut fast = vec![0u32; ih.dim];

    for y in 0..8usize {
        for x in 0..8usize {
            ih.window_counts(x, y, ws, &mut fast);
            let mut slow = vec![0u32; bins * 2];
            for yy in y.saturating_sub(ws)..=(y + ws).min(7) {
                for xx in x.saturating_sub(ws)..=(x + ws).min(7) {
                    for c in 0..2 {
                        slow[c * bins + q.get(xx, yy, c) as usize] += 1;
                    }
                }
            }
            assert_eq!(fast, slow, "window mismatch at x={x} y={y}");
        }
    }
}

#[test]
fn frequency_blocks_sum_to_one() {
    let _ = env_logger::builder().is_test(true).try_init();
    let img = noisy_two_band(9, 7);
    let opts = HistogramOptions {
        half_window: 2,
        bins: 5,
        normalization: HistogramNormalization::Frequency,
    };
    let hist = local_histograms(&img, &opts).unwrap();
    for y in 0..7 {
        for x in 0..9 {
            let f = hist.pixel(x, y);
            assert!(f.iter().all(|&v| (0.0..=1.0).contains(&v)));
            for block in f.chunks(5) {
                let sum: f32 = block.iter().sum();
                assert!((sum - 1.0).abs() < 1e-5, "block sum {sum} at x={x} y={y}");
            }
        }
    }
}

#[test]
fn bin_indices_stay_in_range() {
    let img = noisy_two_band(8, 8);
    for bins in [2usize, 11] {
        let q = quantize(&img, bins).unwrap();
        assert!(q.data.iter().all(|&b| (b as usize) < bins));
        assert!(q.data.iter().any(|&b| b as usize == bins - 1));
    }
}
