pub mod cli;
pub mod detection;
pub mod error;
pub mod extraction;
pub mod geometry;
pub mod orientation;
pub mod transform;

#[cfg(test)]
pub(crate) mod testutil;

pub use cli::{Cli, Command, ProcessOptions};
pub use detection::{DetectorConfig, Marker, MarkerDetector};
pub use error::ProcessError;
pub use extraction::{
    ExtractorConfig, ProcessOutcome, Region, RegionBox, RegionExtractor, Side,
};
pub use orientation::{OrientationResolver, Rotation};
pub use transform::{lighten_template, rotate_arbitrary, rotate_exact};
