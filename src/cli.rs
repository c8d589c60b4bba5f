use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::detection::DetectorConfig;
use crate::extraction::ExtractorConfig;
use crate::orientation::OrientationResolver;

#[derive(Parser, Debug)]
#[command(name = "formalign")]
#[command(version, about = "Orient scanned test forms by their fiducial markers and crop the marker-delimited regions")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Process a single scanned form
    Process {
        /// Input image path
        input: PathBuf,

        #[command(flatten)]
        options: ProcessOptions,
    },
    /// Process every supported image in a directory
    Batch {
        /// Directory to scan for scanned forms
        input_dir: PathBuf,

        /// Recurse into subdirectories
        #[arg(short, long)]
        recursive: bool,

        #[command(flatten)]
        options: ProcessOptions,
    },
}

#[derive(Args, Debug, Clone)]
pub struct ProcessOptions {
    /// Directory for extracted regions and debug images
    #[arg(short, long, default_value = "output")]
    pub output_dir: PathBuf,

    /// Binarization threshold (0-255); intensities at or below count as ink
    #[arg(long, default_value_t = 70)]
    pub sensitivity: u8,

    /// Minimum marker contour area in pixels
    #[arg(long, default_value_t = 200.0)]
    pub min_area: f64,

    /// Maximum marker contour area in pixels
    #[arg(long, default_value_t = 5000.0)]
    pub max_area: f64,

    /// Minimum marker side length in pixels
    #[arg(long, default_value_t = 15)]
    pub min_size: i32,

    /// Maximum marker side length in pixels
    #[arg(long, default_value_t = 100)]
    pub max_size: i32,

    /// Markers closer than this are merged as duplicates
    #[arg(long, default_value_t = 50)]
    pub min_distance: i32,

    /// Marker band grouping tolerance as a fraction of image height
    #[arg(long, default_value_t = 0.05)]
    pub y_tolerance: f64,

    /// Padding around each extracted region in pixels
    #[arg(long, default_value_t = 10)]
    pub padding: i32,

    /// Blend factor for fading the printed reference template
    #[arg(long, default_value_t = 0.4)]
    pub alpha: f32,

    /// Worker threads for per-side region processing
    #[arg(long, default_value_t = 2)]
    pub workers: usize,

    /// Apply the stricter marker profile (ink density + border margin)
    #[arg(long)]
    pub strict: bool,

    /// Show detection details
    #[arg(long)]
    pub verbose: bool,
}

impl ProcessOptions {
    pub fn detector_config(&self) -> DetectorConfig {
        DetectorConfig {
            sensitivity: self.sensitivity,
            min_area: self.min_area,
            max_area: self.max_area,
            min_size: self.min_size,
            max_size: self.max_size,
            min_distance: self.min_distance,
            strict: self.strict,
            ..DetectorConfig::default()
        }
    }

    pub fn resolver(&self) -> OrientationResolver {
        OrientationResolver::new(self.y_tolerance)
    }

    pub fn extractor_config(&self) -> ExtractorConfig {
        ExtractorConfig {
            padding: self.padding,
            template_alpha: self.alpha,
            workers: self.workers,
        }
    }
}
