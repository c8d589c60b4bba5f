use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use image::ImageReader;

use formalign::{
    Cli, Command, MarkerDetector, ProcessOptions, ProcessOutcome, RegionExtractor, Side,
};

const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tif", "tiff"];

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Process { input, options } => {
            let extractor = build_extractor(&options)?;
            process_file(&extractor, &input, &options)
        }
        Command::Batch {
            input_dir,
            recursive,
            options,
        } => run_batch(&input_dir, recursive, &options),
    }
}

fn build_extractor(options: &ProcessOptions) -> Result<RegionExtractor> {
    let extractor = RegionExtractor::new(
        MarkerDetector::new(options.detector_config()),
        options.resolver(),
        options.extractor_config(),
    )?;
    Ok(extractor)
}

fn process_file(extractor: &RegionExtractor, input: &Path, options: &ProcessOptions) -> Result<()> {
    let img = ImageReader::open(input)
        .with_context(|| format!("Failed to open input file: {:?}", input))?
        .decode()
        .with_context(|| format!("Failed to decode image: {:?}", input))?
        .to_rgb8();

    if options.verbose {
        eprintln!(
            "Loaded image: {:?} ({}x{})",
            input,
            img.width(),
            img.height()
        );
    }

    let outcome = extractor
        .process(&img, options.verbose)
        .with_context(|| format!("Failed to process {:?}", input))?;

    save_outputs(&outcome, input, &options.output_dir)?;

    eprintln!("Rotation: {}", outcome.rotation);
    for side in [Side::Left, Side::Right] {
        match outcome.region(side) {
            Some(region) => eprintln!(
                "{} region: ({}, {}) - ({}, {})",
                side.label(),
                region.bbox.x_min,
                region.bbox.y_min,
                region.bbox.x_max,
                region.bbox.y_max
            ),
            None => eprintln!("{} region: not found", side.label()),
        }
    }

    Ok(())
}

fn save_outputs(outcome: &ProcessOutcome, input: &Path, output_dir: &Path) -> Result<()> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory: {:?}", output_dir))?;

    let stem = input
        .file_stem()
        .unwrap_or_default()
        .to_string_lossy()
        .into_owned();

    for side in [Side::Left, Side::Right] {
        if let Some(region) = outcome.region(side) {
            let path = output_dir.join(format!("{}_{}_region.jpg", stem, side.label()));
            region
                .pixels
                .save(&path)
                .with_context(|| format!("Failed to save region: {:?}", path))?;
        }
    }

    let boxes_path = output_dir.join(format!("{}_result_with_boxes.jpg", stem));
    outcome
        .annotated
        .save(&boxes_path)
        .with_context(|| format!("Failed to save annotated image: {:?}", boxes_path))?;

    let rotated_path = output_dir.join(format!("{}_rotated_document.jpg", stem));
    outcome
        .rotated
        .save(&rotated_path)
        .with_context(|| format!("Failed to save rotated document: {:?}", rotated_path))?;

    Ok(())
}

fn run_batch(input_dir: &Path, recursive: bool, options: &ProcessOptions) -> Result<()> {
    let files = find_supported_files(input_dir, recursive)
        .with_context(|| format!("Failed to scan directory: {:?}", input_dir))?;

    if files.is_empty() {
        eprintln!("No supported files found in {:?}", input_dir);
        return Ok(());
    }

    eprintln!("Files found: {}", files.len());

    let extractor = build_extractor(options)?;
    let mut processed = 0usize;
    let mut failed = 0usize;

    for file in &files {
        eprintln!();
        eprintln!("Processing: {:?}", file);
        match process_file(&extractor, file, options) {
            Ok(()) => processed += 1,
            Err(err) => {
                eprintln!("Error: {:#}", err);
                failed += 1;
            }
        }
    }

    eprintln!();
    eprintln!("Done: {} processed, {} failed", processed, failed);
    Ok(())
}

fn find_supported_files(dir: &Path, recursive: bool) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            if recursive {
                files.extend(find_supported_files(&path, true)?);
            }
            continue;
        }

        let supported = path
            .extension()
            .map(|ext| {
                let ext = ext.to_string_lossy().to_lowercase();
                SUPPORTED_EXTENSIONS.contains(&ext.as_str())
            })
            .unwrap_or(false);

        if supported {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}
