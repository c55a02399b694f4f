use fseg::config::load_config;
use fseg::features::build_feature_stack;
use fseg::image::io::{write_json_file, ImageFileSource, PngLabelSink};
use fseg::raster::{label_raster, RasterSink, RasterSource};
use fseg::Segmenter;
use std::env;
use std::path::Path;

fn main() {
    let _ = env_logger::builder().try_init();
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let config_path = env::args().nth(1).ok_or_else(usage)?;
    let config = load_config(Path::new(&config_path)).map_err(|e| e.to_string())?;

    let raster = ImageFileSource::new(&config.input)
        .read()
        .map_err(|e| e.to_string())?;
    let image = raster.to_image().map_err(|e| e.to_string())?;
    let bank = config.filter_bank().map_err(|e| e.to_string())?;
    let stack = build_feature_stack(&image, &config.stack, &bank).map_err(|e| e.to_string())?;
    println!(
        "Loaded {} ({}x{}, {} bands) -> {} feature channels",
        config.input.display(),
        image.width(),
        image.height(),
        image.channels(),
        stack.channels()
    );

    let mut segmenter = Segmenter::new(config.segmenter.clone());
    let report = match &config.seeds {
        Some(seeds) => segmenter.segment_with_seeds(&stack, seeds),
        None => segmenter.segment(&stack),
    }
    .map_err(|e| e.to_string())?;
    for warning in &report.warnings {
        println!("Warning: {warning}");
    }

    let labels = label_raster(&report.labels, &raster.metadata);
    let mut sink = PngLabelSink::new(&config.output.labels_png);
    if let Some(meta) = &config.output.metadata_json {
        sink = sink.with_metadata(meta);
    }
    sink.write(&labels).map_err(|e| e.to_string())?;
    println!(
        "Saved {} segments to {}",
        report.segments,
        config.output.labels_png.display()
    );

    if let Some(path) = &config.output.report_json {
        write_json_file(path, &report).map_err(|e| e.to_string())?;
        println!("Saved report to {}", path.display());
    }
    println!("{}", report.summary());
    Ok(())
}

fn usage() -> String {
    "Usage: fseg_demo <config.json>".to_string()
}
