use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

use image::{imageops, GrayImage, RgbImage};
use imageproc::contours::find_contours;
use imageproc::contrast::{threshold, ThresholdType};
use imageproc::distance_transform::Norm;
use imageproc::morphology::{close, open};
use imageproc::point::Point;

use crate::geometry::{BoundingBox, CandidateMeasure};

/// A detected fiducial square marker
#[derive(Debug, Clone)]
pub struct Marker {
    /// Polygon approximation of the marker outline
    pub polygon: Vec<Point<i32>>,
    /// Enclosed contour area in pixels
    pub area: f64,
    pub bbox: BoundingBox,
    /// Bounding-box center
    pub center: (f64, f64),
    /// min(fill ratio, solidity, compactness), in (0, 1]
    pub confidence: f64,
}

/// Tunable thresholds for the marker detector
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Binarization threshold: intensities at or below become ink
    pub sensitivity: u8,
    /// Contour area bounds (exclusive)
    pub min_area: f64,
    pub max_area: f64,
    /// Bounding-box side length bounds in pixels (inclusive)
    pub min_size: i32,
    pub max_size: i32,
    /// Markers with centers closer than this are considered duplicates
    pub min_distance: i32,
    /// Enable the stricter profile (ink density + border margin checks)
    pub strict: bool,
    /// Minimum distance from the image border under the strict profile
    pub border_margin: i32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            sensitivity: 70,
            min_area: 200.0,
            max_area: 5000.0,
            min_size: 15,
            max_size: 100,
            min_distance: 50,
            strict: false,
            border_margin: 20,
        }
    }
}

/// One acceptance gate over a measured candidate. Kept as an ordered list so
/// gates can be added or reordered without touching the detection loop.
struct ProfileCheck {
    name: &'static str,
    accept: fn(&CandidateMeasure, &DetectorConfig) -> bool,
}

fn check_quadrilateral(m: &CandidateMeasure, _: &DetectorConfig) -> bool {
    m.polygon.len() == 4 && m.convex
}

fn check_area(m: &CandidateMeasure, cfg: &DetectorConfig) -> bool {
    m.area > cfg.min_area && m.area < cfg.max_area
}

fn check_aspect(m: &CandidateMeasure, _: &DetectorConfig) -> bool {
    (0.85..=1.15).contains(&m.aspect_ratio)
}

fn check_fill(m: &CandidateMeasure, _: &DetectorConfig) -> bool {
    m.fill_ratio >= 0.6
}

fn check_solidity(m: &CandidateMeasure, _: &DetectorConfig) -> bool {
    m.solidity >= 0.9
}

fn check_compactness(m: &CandidateMeasure, _: &DetectorConfig) -> bool {
    m.compactness >= 0.5
}

fn check_size(m: &CandidateMeasure, cfg: &DetectorConfig) -> bool {
    m.bbox.width >= cfg.min_size
        && m.bbox.height >= cfg.min_size
        && m.bbox.width <= cfg.max_size
        && m.bbox.height <= cfg.max_size
}

static PROFILE_CHECKS: &[ProfileCheck] = &[
    ProfileCheck { name: "quadrilateral", accept: check_quadrilateral },
    ProfileCheck { name: "area", accept: check_area },
    ProfileCheck { name: "aspect", accept: check_aspect },
    ProfileCheck { name: "fill", accept: check_fill },
    ProfileCheck { name: "solidity", accept: check_solidity },
    ProfileCheck { name: "compactness", accept: check_compactness },
    ProfileCheck { name: "size", accept: check_size },
];

/// Detects solid square fiducials in a raster image.
///
/// Results for a given image are memoized by a content fingerprint; the cache
/// is unbounded and must be cleared explicitly via [`MarkerDetector::clear_cache`].
pub struct MarkerDetector {
    config: DetectorConfig,
    cache: Mutex<HashMap<u64, Vec<Marker>>>,
}

impl Default for MarkerDetector {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}

impl MarkerDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Find all square markers in the image. Returns an empty set when none
    /// qualify; degenerate contours are skipped silently.
    pub fn find_markers(&self, image: &RgbImage, verbose: bool) -> Vec<Marker> {
        let fingerprint = image_fingerprint(image);
        if let Ok(cache) = self.cache.lock() {
            if let Some(hit) = cache.get(&fingerprint) {
                if verbose {
                    eprintln!("Marker cache hit ({} markers)", hit.len());
                }
                return hit.clone();
            }
        }

        let binary = self.binarize(image);
        let contours = find_contours::<i32>(&binary);

        let mut candidates = Vec::new();
        let mut rejections: HashMap<&'static str, usize> = HashMap::new();

        for contour in &contours {
            // Cheap area prefilter before the full measurement
            let raw_area = crate::geometry::contour_area(&contour.points);
            if raw_area <= self.config.min_area || raw_area >= self.config.max_area {
                continue;
            }

            let Some(measure) = CandidateMeasure::from_contour(&contour.points) else {
                continue;
            };

            if let Some(failed) = self.first_failed_check(&measure) {
                *rejections.entry(failed).or_insert(0) += 1;
                continue;
            }

            if self.config.strict && !self.passes_strict_profile(&measure, &binary) {
                *rejections.entry("strict").or_insert(0) += 1;
                continue;
            }

            let confidence = measure
                .fill_ratio
                .min(measure.solidity)
                .min(measure.compactness)
                .min(1.0);

            candidates.push(Marker {
                center: measure.center(),
                area: measure.area,
                bbox: measure.bbox,
                confidence,
                polygon: measure.polygon,
            });
        }

        let markers = deduplicate(candidates, self.config.min_distance);

        if verbose {
            eprintln!(
                "Contours: {}, markers kept: {}",
                contours.len(),
                markers.len()
            );
            for (name, count) in &rejections {
                eprintln!("  rejected by {}: {}", name, count);
            }
        }

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(fingerprint, markers.clone());
        }

        markers
    }

    /// Drop all memoized detection results
    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }

    fn binarize(&self, image: &RgbImage) -> GrayImage {
        let gray = imageops::grayscale(image);
        let binary = threshold(&gray, self.config.sensitivity, ThresholdType::BinaryInverted);
        // 3x3 closing then opening: bridge small gaps, drop speckle
        let binary = close(&binary, Norm::LInf, 1);
        open(&binary, Norm::LInf, 1)
    }

    fn first_failed_check(&self, measure: &CandidateMeasure) -> Option<&'static str> {
        PROFILE_CHECKS
            .iter()
            .find(|check| !(check.accept)(measure, &self.config))
            .map(|check| check.name)
    }

    fn passes_strict_profile(&self, measure: &CandidateMeasure, binary: &GrayImage) -> bool {
        let margin = self.config.border_margin;
        let (width, height) = binary.dimensions();
        let bbox = measure.bbox;

        if bbox.x < margin
            || bbox.y < margin
            || bbox.x + bbox.width > width as i32 - margin
            || bbox.y + bbox.height > height as i32 - margin
        {
            return false;
        }

        let mut ink = 0u32;
        for y in bbox.y..bbox.y + bbox.height {
            for x in bbox.x..bbox.x + bbox.width {
                if binary.get_pixel(x as u32, y as u32)[0] > 0 {
                    ink += 1;
                }
            }
        }

        let density = ink as f64 / (bbox.width as f64 * bbox.height as f64);
        density >= 0.3
    }
}

/// Merge markers whose centers are within `min_distance`, keeping the
/// higher-confidence one. A grid of `min_distance`-sized cells keeps the scan
/// near-linear; the 3x3 cell neighborhood covers pairs straddling cell edges.
fn deduplicate(mut candidates: Vec<Marker>, min_distance: i32) -> Vec<Marker> {
    if candidates.len() <= 1 {
        return candidates;
    }

    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let cell = min_distance.max(1) as i64;
    let limit = min_distance as f64;
    let mut grid: HashMap<(i64, i64), Vec<usize>> = HashMap::new();
    let mut kept: Vec<Marker> = Vec::new();

    for candidate in candidates {
        let (cx, cy) = candidate.center;
        let key = ((cx as i64).div_euclid(cell), (cy as i64).div_euclid(cell));

        let mut duplicate = false;
        'probe: for dx in -1..=1 {
            for dy in -1..=1 {
                let Some(bucket) = grid.get(&(key.0 + dx, key.1 + dy)) else {
                    continue;
                };
                for &index in bucket {
                    let (ox, oy) = kept[index].center;
                    let distance = ((cx - ox).powi(2) + (cy - oy).powi(2)).sqrt();
                    if distance < limit {
                        duplicate = true;
                        break 'probe;
                    }
                }
            }
        }

        if !duplicate {
            grid.entry(key).or_default().push(kept.len());
            kept.push(candidate);
        }
    }

    kept
}

fn image_fingerprint(image: &RgbImage) -> u64 {
    let mut hasher = DefaultHasher::new();
    image.dimensions().hash(&mut hasher);
    image.as_raw().hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{blank_form, draw_block, marker_at};

    #[test]
    fn test_detects_solid_squares() {
        let mut img = blank_form(600, 600);
        draw_block(&mut img, 100, 100, 30, 30);
        draw_block(&mut img, 300, 200, 40, 40);
        draw_block(&mut img, 450, 400, 25, 25);

        let detector = MarkerDetector::default();
        let markers = detector.find_markers(&img, false);
        assert_eq!(markers.len(), 3);
        for marker in &markers {
            assert!(marker.confidence > 0.0 && marker.confidence <= 1.0);
        }
    }

    #[test]
    fn test_rejects_elongated_rectangles() {
        let mut img = blank_form(600, 600);
        draw_block(&mut img, 100, 100, 30, 60);
        draw_block(&mut img, 300, 300, 60, 30);

        let detector = MarkerDetector::default();
        assert!(detector.find_markers(&img, false).is_empty());
    }

    #[test]
    fn test_blank_image_yields_no_markers() {
        let detector = MarkerDetector::default();
        assert!(detector.find_markers(&blank_form(200, 200), false).is_empty());
    }

    #[test]
    fn test_deduplicate_keeps_higher_confidence() {
        let near = vec![marker_at(100.0, 100.0, 0.7), marker_at(120.0, 100.0, 0.9)];
        let kept = deduplicate(near, 50);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].confidence, 0.9);
    }

    #[test]
    fn test_deduplicate_keeps_distant_markers() {
        let far = vec![marker_at(100.0, 100.0, 0.7), marker_at(300.0, 100.0, 0.9)];
        assert_eq!(deduplicate(far, 50).len(), 2);
    }

    #[test]
    fn test_deduplicate_across_cell_boundary() {
        // Centers fall in neighboring grid cells but are still closer than
        // min_distance
        let near = vec![marker_at(49.0, 10.0, 0.8), marker_at(51.0, 10.0, 0.6)];
        assert_eq!(deduplicate(near, 50).len(), 1);
    }

    #[test]
    fn test_cache_roundtrip() {
        let mut img = blank_form(400, 400);
        draw_block(&mut img, 50, 50, 30, 30);

        let detector = MarkerDetector::default();
        let first = detector.find_markers(&img, false);
        let second = detector.find_markers(&img, false);
        assert_eq!(first.len(), second.len());
        assert_eq!(first[0].bbox, second[0].bbox);

        detector.clear_cache();
        let third = detector.find_markers(&img, false);
        assert_eq!(first.len(), third.len());
    }

    #[test]
    fn test_marker_center_position() {
        let mut img = blank_form(400, 400);
        draw_block(&mut img, 100, 100, 31, 31);

        let detector = MarkerDetector::default();
        let markers = detector.find_markers(&img, false);
        assert_eq!(markers.len(), 1);
        let (cx, cy) = markers[0].center;
        assert!((cx - 115.5).abs() < 2.0);
        assert!((cy - 115.5).abs() < 2.0);
    }
}
