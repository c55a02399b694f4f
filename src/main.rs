use fseg::histogram::HistogramOptions;
use fseg::prelude::*;

fn main() {
    let _ = env_logger::builder().try_init();
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run() -> fseg::Result<()> {
    // Demo: two flat regions split at the middle column
    let (w, h) = (64usize, 48usize);
    let band = ImageF32::from_fn(w, h, |x, _| if x < w / 2 { 10.0 } else { 200.0 });
    let image = MultiChannelImage::from_planes(&[band])?;
    let bank = FilterBank::texture_default()?;
    let stack = build_feature_stack(&image, &StackOptions::default(), &bank)?;

    let mut segmenter = Segmenter::new(SegmenterParams {
        histogram: HistogramOptions {
            half_window: 4,
            ..Default::default()
        },
        segments: Some(2),
        ..Default::default()
    });
    let report = segmenter.segment(&stack)?;
    println!("{}", report.summary());
    for y in (0..h).step_by(8) {
        let row: String = (0..w)
            .step_by(2)
            .map(|x| char::from(b'0' + (report.labels.get(x, y) % 10) as u8))
            .collect();
        println!("{row}");
    }
    Ok(())
}
