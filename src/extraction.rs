use image::RgbImage;

use crate::detection::{Marker, MarkerDetector};
use crate::error::ProcessError;
use crate::orientation::{OrientationResolver, Rotation};
use crate::transform::{crop_clamped, draw_region_box, lighten_template, rotate_exact};

/// Safety bound for region coordinates after padding
const REGION_COORD_LIMIT: i32 = 10_000;

/// Which half of the corrected form a region was cut from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn label(self) -> &'static str {
        match self {
            Side::Left => "L",
            Side::Right => "R",
        }
    }
}

/// Region bounds in rotated-image coordinates, half-open on the max edges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionBox {
    pub x_min: i32,
    pub y_min: i32,
    pub x_max: i32,
    pub y_max: i32,
}

/// One extracted region: its bounds and the post-processed pixel block
#[derive(Debug, Clone)]
pub struct Region {
    pub side: Side,
    pub bbox: RegionBox,
    pub pixels: RgbImage,
}

/// Result of one full pipeline run
#[derive(Debug)]
pub struct ProcessOutcome {
    pub rotation: Rotation,
    pub left: Option<Region>,
    pub right: Option<Region>,
    /// The orientation-corrected full image
    pub rotated: RgbImage,
    /// Corrected image with both region boxes drawn, for auditing
    pub annotated: RgbImage,
}

impl ProcessOutcome {
    pub fn region(&self, side: Side) -> Option<&Region> {
        match side {
            Side::Left => self.left.as_ref(),
            Side::Right => self.right.as_ref(),
        }
    }
}

/// Region extraction knobs
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Padding around the marker-center bounding box, in pixels
    pub padding: i32,
    /// Blend factor for template lightening
    pub template_alpha: f32,
    /// Worker threads for the per-side tasks
    pub workers: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            padding: 10,
            template_alpha: 0.4,
            workers: 2,
        }
    }
}

/// Full pipeline: detect markers, resolve the rotation, correct the image and
/// cut the left/right marker-delimited regions.
pub struct RegionExtractor {
    detector: MarkerDetector,
    resolver: OrientationResolver,
    config: ExtractorConfig,
    pool: rayon::ThreadPool,
}

impl RegionExtractor {
    pub fn new(
        detector: MarkerDetector,
        resolver: OrientationResolver,
        config: ExtractorConfig,
    ) -> Result<Self, ProcessError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers.max(1))
            .build()
            .map_err(|e| ProcessError::WorkerPool(e.to_string()))?;

        Ok(Self {
            detector,
            resolver,
            config,
            pool,
        })
    }

    pub fn with_defaults() -> Result<Self, ProcessError> {
        Self::new(
            MarkerDetector::default(),
            OrientationResolver::default(),
            ExtractorConfig::default(),
        )
    }

    pub fn detector(&self) -> &MarkerDetector {
        &self.detector
    }

    /// Run the whole pipeline on one image. A side with too few markers
    /// yields `None` for its region; only a degenerate input image is an
    /// error.
    pub fn process(&self, image: &RgbImage, verbose: bool) -> Result<ProcessOutcome, ProcessError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(ProcessError::EmptyImage { width, height });
        }

        let markers = self.detector.find_markers(image, verbose);
        if verbose {
            eprintln!("Markers found: {}", markers.len());
        }

        let rotation = self.resolver.resolve(&markers, width, height, verbose);
        if verbose {
            eprintln!("Resolved rotation: {}", rotation);
        }

        let rotated = rotate_exact(image, rotation);

        // Marker positions shift with the pixels, so detection runs again on
        // the corrected image (a cache hit when the rotation was identity)
        let rotated_markers = self.detector.find_markers(&rotated, verbose);
        let (left_markers, right_markers) =
            partition_by_side(&rotated_markers, rotated.width());

        if verbose {
            eprintln!(
                "Markers after rotation: {} (L: {}, R: {})",
                rotated_markers.len(),
                left_markers.len(),
                right_markers.len()
            );
        }

        let (left, right) = self.pool.join(
            || self.side_region(&rotated, left_markers, Side::Left),
            || self.side_region(&rotated, right_markers, Side::Right),
        );

        let mut annotated = rotated.clone();
        for region in [&left, &right].into_iter().flatten() {
            let b = region.bbox;
            draw_region_box(&mut annotated, b.x_min, b.y_min, b.x_max, b.y_max);
        }

        Ok(ProcessOutcome {
            rotation,
            left,
            right,
            rotated,
            annotated,
        })
    }

    fn side_region(&self, image: &RgbImage, markers: Vec<Marker>, side: Side) -> Option<Region> {
        let bbox = region_box(&markers, self.config.padding)?;
        let mut pixels = crop_clamped(image, bbox.x_min, bbox.y_min, bbox.x_max, bbox.y_max);
        lighten_template(&mut pixels, self.config.template_alpha);

        Some(Region { side, bbox, pixels })
    }
}

/// Split markers at the vertical midline of the image
fn partition_by_side(markers: &[Marker], width: u32) -> (Vec<Marker>, Vec<Marker>) {
    let mid = width as f64 / 2.0;
    markers
        .iter()
        .cloned()
        .partition(|marker| marker.center.0 < mid)
}

/// Bounding box over the centers of the cluster's 3 most confident markers,
/// padded and clipped to the coordinate safety bound. Fewer than 3 markers
/// give no region.
fn region_box(markers: &[Marker], padding: i32) -> Option<RegionBox> {
    if markers.len() < 3 {
        return None;
    }

    let mut ranked: Vec<&Marker> = markers.iter().collect();
    ranked.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then(a.center.0.total_cmp(&b.center.0))
            .then(a.center.1.total_cmp(&b.center.1))
    });

    let anchors: Vec<(i32, i32)> = ranked[..3]
        .iter()
        .map(|m| (m.center.0.round() as i32, m.center.1.round() as i32))
        .collect();

    let x_min = anchors.iter().map(|p| p.0).min()?;
    let x_max = anchors.iter().map(|p| p.0).max()?;
    let y_min = anchors.iter().map(|p| p.1).min()?;
    let y_max = anchors.iter().map(|p| p.1).max()?;

    Some(RegionBox {
        x_min: (x_min - padding).clamp(0, REGION_COORD_LIMIT),
        y_min: (y_min - padding).clamp(0, REGION_COORD_LIMIT),
        x_max: (x_max + padding).clamp(0, REGION_COORD_LIMIT),
        y_max: (y_max + padding).clamp(0, REGION_COORD_LIMIT),
    })
}
